//! Entity list/create/update/delete endpoints and the `entities` CLI commands

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::PortalClient;
use super::Envelope;
use super::error::ApiError;
use crate::chat::wire::WireId;
use crate::config::Config;
use crate::crud::{CrudTable, EntityBackend, EntityEditor, ListPage, ListQuery, MutationOutcome};
use crate::models::{Entity, EntityForm, EntityKind};

/// Entity row as returned by the list endpoints.
#[derive(Debug, Deserialize)]
struct EntityRecord {
    id: WireId,
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

impl From<EntityRecord> for Entity {
    fn from(r: EntityRecord) -> Self {
        Entity {
            id: r.id.to_string(),
            name: r.name.or(r.title).unwrap_or_default(),
            description: r.description.filter(|d| !d.trim().is_empty()),
        }
    }
}

/// `data` of a list response: a bare array, or a paginator object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListData {
    Rows(Vec<EntityRecord>),
    Paged {
        results: Vec<EntityRecord>,
        count: Option<u64>,
        next: Option<String>,
        previous: Option<String>,
    },
}

/// Flatten an envelope into a `ListPage`. Envelope metadata wins over the
/// paginator object nested in `data`.
fn list_page(env: Envelope<ListData>) -> ListPage {
    let (rows, count, next, previous) = match env.data {
        Some(ListData::Rows(rows)) => (rows, None, None, None),
        Some(ListData::Paged {
            results,
            count,
            next,
            previous,
        }) => (results, count, next, previous),
        None => (Vec::new(), None, None, None),
    };
    ListPage {
        items: rows.into_iter().map(Entity::from).collect(),
        count: env.count.or(count),
        has_next_page: env.has_next_page,
        next: env.next.or(next),
        previous: env.previous.or(previous),
    }
}

impl EntityBackend for PortalClient {
    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage, ApiError> {
        let params = query.params(kind.pagination());
        let env = self.get::<ListData>(&kind.list_path(), &params).await?;
        Ok(list_page(env))
    }

    async fn create(&self, kind: EntityKind, form: &EntityForm) -> Result<Option<String>, ApiError> {
        let body = form_body(form)?;
        let env = self
            .post::<serde_json::Value>(&kind.create_path(), &body)
            .await?;
        Ok(env.message_text())
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        form: &EntityForm,
    ) -> Result<Option<String>, ApiError> {
        let body = form_body(form)?;
        let env = self
            .put::<serde_json::Value>(&kind.update_path(id), &body)
            .await?;
        Ok(env.message_text())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<Option<String>, ApiError> {
        let env = self
            .delete::<serde_json::Value>(&kind.delete_path(id))
            .await?;
        Ok(env.message_text())
    }
}

fn form_body(form: &EntityForm) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(form).map_err(|e| ApiError::Decode {
        url: "form".to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// CLI commands
// ---------------------------------------------------------------------------

fn table(kind: EntityKind, per_page: Option<u32>) -> Result<CrudTable<PortalClient>> {
    let config = Config::load()?;
    let per_page = per_page.filter(|&n| n > 0).unwrap_or_else(|| config.per_page());
    Ok(CrudTable::new(PortalClient::authenticated()?, kind, per_page))
}

/// Print one page of an entity table.
pub async fn list_entities(
    kind: EntityKind,
    page: u32,
    per_page: Option<u32>,
    search: Option<&str>,
) -> Result<()> {
    let mut table = table(kind, per_page)?;
    table.set_search(search.unwrap_or_default());
    table.set_page(page);
    table
        .refresh(&CancellationToken::new())
        .await
        .with_context(|| format!("Failed to list {}", kind.label()))?;

    println!("\n{} (page {}, {} total):", kind.label(), table.page(), table.count());
    println!("{:-<60}", "");

    if table.items().is_empty() {
        println!("  (none)");
    }
    for entity in table.items() {
        match entity.description {
            Some(ref d) => println!("{:>6}  {}  ({})", entity.id, entity.name, d),
            None => println!("{:>6}  {}", entity.id, entity.name),
        }
    }

    let mut nav = Vec::new();
    if table.has_prev() {
        nav.push(format!("--page {} for previous", table.page().saturating_sub(1).max(1)));
    }
    if table.has_next() {
        nav.push(format!("--page {} for next", table.page() + 1));
    }
    if !nav.is_empty() {
        println!("\n{}", nav.join(", "));
    }
    Ok(())
}

fn report(kind: EntityKind, action: &str, outcome: MutationOutcome) -> Result<()> {
    if !outcome.ok {
        anyhow::bail!(
            "{}",
            outcome
                .message
                .unwrap_or_else(|| format!("Failed to {} {}", action, kind.slug()))
        );
    }
    match outcome.message {
        Some(msg) => println!("{}", msg),
        None => println!("{} {}d.", kind.slug(), action),
    }
    Ok(())
}

pub async fn create_entity(kind: EntityKind, name: &str, description: Option<String>) -> Result<()> {
    let mut table = table(kind, None)?;
    let mut editor = EntityEditor::default();
    editor.open_create();
    editor.form = EntityForm::new(name, description);
    let outcome = editor.submit(&mut table, &CancellationToken::new()).await;
    report(kind, "create", outcome)
}

pub async fn update_entity(
    kind: EntityKind,
    id: &str,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    let mut table = table(kind, None)?;
    let mut editor = EntityEditor::default();
    editor.open_edit(&Entity {
        id: id.to_string(),
        name: name.to_string(),
        description,
    });
    let outcome = editor.submit(&mut table, &CancellationToken::new()).await;
    report(kind, "update", outcome)
}

pub async fn delete_entity(kind: EntityKind, id: &str) -> Result<()> {
    let mut table = table(kind, None)?;
    let outcome = table.delete(id, &CancellationToken::new()).await;
    report(kind, "delete", outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_rows_with_envelope_count() {
        let env: Envelope<ListData> = serde_json::from_str(
            r#"{"statusCode":200,"data":[{"id":1,"name":"Rust","description":"Systems"},{"id":"2","title":"Go"}],"count":25,"hasNextPage":true}"#,
        )
        .unwrap();
        let page = list_page(env);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "1");
        assert_eq!(page.items[1].name, "Go");
        assert_eq!(page.count, Some(25));
        assert_eq!(page.has_next_page, Some(true));
    }

    #[test]
    fn test_paginator_object_in_data() {
        let env: Envelope<ListData> = serde_json::from_str(
            r#"{"statusCode":200,"data":{"count":12,"next":"https://api.example.com/api/list_city/?page=2","previous":null,"results":[{"id":5,"name":"Pune"}]}}"#,
        )
        .unwrap();
        let page = list_page(env);
        assert_eq!(page.items[0].name, "Pune");
        assert_eq!(page.count, Some(12));
        assert!(page.next.is_some());
        assert!(page.previous.is_none());
    }

    #[test]
    fn test_missing_data_is_empty_page() {
        let env: Envelope<ListData> = serde_json::from_str(r#"{"statusCode":200,"data":null}"#).unwrap();
        assert!(list_page(env).items.is_empty());
    }

    #[test]
    fn test_form_body_omits_empty_description() {
        let body = form_body(&EntityForm::new("React", None)).unwrap();
        assert_eq!(body, serde_json::json!({"name": "React"}));
    }
}
