//! Simple name/description entities managed through the CRUD tables

use serde::{Deserialize, Serialize};

/// How a list endpoint reports pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Backend pages and sends `hasNextPage` / `next`.
    Server,
    /// Backend pages but only reports `count`.
    Counted,
    /// Backend returns the full list; pages are sliced locally.
    ClientSide,
}

/// Entity kinds exposed by the portal admin tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum EntityKind {
    Skill,
    Perk,
    Designation,
    VideoCategory,
    City,
    State,
    Language,
}

impl EntityKind {
    /// Endpoint slug used in `list_<slug>/`, `create_<slug>/`, ...
    pub fn slug(&self) -> &'static str {
        match self {
            EntityKind::Skill => "skill",
            EntityKind::Perk => "perk",
            EntityKind::Designation => "designation",
            EntityKind::VideoCategory => "video_category",
            EntityKind::City => "city",
            EntityKind::State => "state",
            EntityKind::Language => "language",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Skill => "Skills",
            EntityKind::Perk => "Perks",
            EntityKind::Designation => "Designations",
            EntityKind::VideoCategory => "Video Categories",
            EntityKind::City => "Cities",
            EntityKind::State => "States",
            EntityKind::Language => "Languages",
        }
    }

    pub fn pagination(&self) -> PaginationMode {
        match self {
            EntityKind::Skill | EntityKind::City => PaginationMode::Server,
            EntityKind::Perk | EntityKind::Designation | EntityKind::Language => {
                PaginationMode::Counted
            }
            EntityKind::VideoCategory | EntityKind::State => PaginationMode::ClientSide,
        }
    }

    pub fn list_path(&self) -> String {
        format!("list_{}/", self.slug())
    }

    pub fn create_path(&self) -> String {
        format!("create_{}/", self.slug())
    }

    pub fn update_path(&self, id: &str) -> String {
        format!("update_{}/{}/", self.slug(), id)
    }

    pub fn delete_path(&self, id: &str) -> String {
        format!("delete_{}/{}/", self.slug(), id)
    }
}

/// A row in an entity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Create/update form payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntityForm {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    /// Trim fields and reject an empty name.
    pub fn validated(&self) -> Result<EntityForm, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_string());
        }
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);
        Ok(EntityForm {
            name: name.to_string(),
            description,
        })
    }
}
