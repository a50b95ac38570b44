//! Create/edit form state for an entity table

use tokio_util::sync::CancellationToken;

use super::{CrudTable, EntityBackend, MutationOutcome};
use crate::models::{Entity, EntityForm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(String),
}

/// The create/edit dialog: open flag, mode, form fields and the last error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityEditor {
    pub open: bool,
    pub mode: EditorMode,
    pub form: EntityForm,
    pub error: Option<String>,
}

impl Default for EntityEditor {
    fn default() -> Self {
        Self {
            open: false,
            mode: EditorMode::Create,
            form: EntityForm::default(),
            error: None,
        }
    }
}

impl EntityEditor {
    pub fn open_create(&mut self) {
        *self = Self {
            open: true,
            ..Self::default()
        };
    }

    pub fn open_edit(&mut self, entity: &Entity) {
        *self = Self {
            open: true,
            mode: EditorMode::Edit(entity.id.clone()),
            form: EntityForm::new(entity.name.clone(), entity.description.clone()),
            error: None,
        };
    }

    /// Close and clear the form.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Submit the form to `table`. Success resets the editor; failure keeps the
    /// form open with the error message.
    pub async fn submit<B: EntityBackend>(
        &mut self,
        table: &mut CrudTable<B>,
        cancel: &CancellationToken,
    ) -> MutationOutcome {
        let outcome = match self.mode {
            EditorMode::Create => table.create(&self.form, cancel).await,
            EditorMode::Edit(ref id) => table.update(id, &self.form, cancel).await,
        };
        if outcome.ok {
            self.reset();
        } else {
            self.error = outcome.message.clone();
        }
        outcome
    }
}
