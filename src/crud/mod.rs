//! Paginated CRUD tables over simple name/description entities

pub mod editor;
pub mod pagination;

pub use editor::EntityEditor;
pub use pagination::{ListPage, ListQuery};

use tokio_util::sync::CancellationToken;

use crate::api::{with_cancel, ApiError};
use crate::models::{Entity, EntityForm, EntityKind};

/// REST side of the entity tables. Implemented by `PortalClient`.
#[allow(async_fn_in_trait)]
pub trait EntityBackend {
    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage, ApiError>;

    /// Each mutation returns the server's message, if any.
    async fn create(&self, kind: EntityKind, form: &EntityForm) -> Result<Option<String>, ApiError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        form: &EntityForm,
    ) -> Result<Option<String>, ApiError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<Option<String>, ApiError>;
}

/// Result of a create/update/delete as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub ok: bool,
    pub message: Option<String>,
}

impl MutationOutcome {
    fn success(message: Option<String>) -> Self {
        Self { ok: true, message }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// One entity table: current page, search term, and mutations that re-fetch.
pub struct CrudTable<B> {
    backend: B,
    kind: EntityKind,
    items: Vec<Entity>,
    page: u32,
    per_page: u32,
    count: u64,
    has_next: bool,
    has_prev: bool,
    loading: bool,
    search: String,
}

impl<B: EntityBackend> CrudTable<B> {
    pub fn new(backend: B, kind: EntityKind, per_page: u32) -> Self {
        Self {
            backend,
            kind,
            items: Vec::new(),
            page: 1,
            per_page: per_page.max(1),
            count: 0,
            has_next: false,
            has_prev: false,
            loading: false,
            search: String::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_prev(&self) -> bool {
        self.has_prev
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Select a page (1-based). Takes effect on the next `refresh`.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Change the search term. A different term resets to page 1.
    pub fn set_search(&mut self, search: &str) -> bool {
        let search = search.trim();
        if search == self.search {
            return false;
        }
        self.search = search.to_string();
        self.page = 1;
        true
    }

    fn query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            per_page: self.per_page,
            search: Some(self.search.clone()).filter(|s| !s.is_empty()),
        }
    }

    /// Fetch the current page. On error or cancellation the previous rows stay.
    pub async fn refresh(&mut self, cancel: &CancellationToken) -> Result<(), ApiError> {
        let query = self.query();
        self.loading = true;
        let result = with_cancel(cancel, self.backend.list(self.kind, &query)).await;
        self.loading = false;

        let resp = result?;
        let window = pagination::resolve(self.kind.pagination(), self.page, self.per_page, resp);
        tracing::debug!(
            "{} page {}: {} rows of {}",
            self.kind.label(),
            self.page,
            window.items.len(),
            window.count
        );
        self.items = window.items;
        self.count = window.count;
        self.has_next = window.has_next;
        self.has_prev = window.has_prev;
        Ok(())
    }

    pub async fn create(&mut self, form: &EntityForm, cancel: &CancellationToken) -> MutationOutcome {
        let form = match form.validated() {
            Ok(f) => f,
            Err(msg) => return MutationOutcome::failure(msg),
        };
        let result = with_cancel(cancel, self.backend.create(self.kind, &form)).await;
        self.after_mutation(result, cancel).await
    }

    pub async fn update(
        &mut self,
        id: &str,
        form: &EntityForm,
        cancel: &CancellationToken,
    ) -> MutationOutcome {
        let form = match form.validated() {
            Ok(f) => f,
            Err(msg) => return MutationOutcome::failure(msg),
        };
        let result = with_cancel(cancel, self.backend.update(self.kind, id, &form)).await;
        self.after_mutation(result, cancel).await
    }

    pub async fn delete(&mut self, id: &str, cancel: &CancellationToken) -> MutationOutcome {
        let result = with_cancel(cancel, self.backend.delete(self.kind, id)).await;
        self.after_mutation(result, cancel).await
    }

    /// Successful mutations re-fetch the current page.
    async fn after_mutation(
        &mut self,
        result: Result<Option<String>, ApiError>,
        cancel: &CancellationToken,
    ) -> MutationOutcome {
        match result {
            Ok(message) => {
                if let Err(e) = self.refresh(cancel).await {
                    tracing::warn!("Refresh after mutation failed: {}", e);
                }
                MutationOutcome::success(message)
            }
            Err(e) => {
                tracing::debug!("{} mutation failed: {}", self.kind.label(), e);
                MutationOutcome::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory entity backend with 25 rows that counts list calls.
    pub(crate) struct MockEntities {
        rows: Mutex<Vec<Entity>>,
        list_calls: AtomicUsize,
        pub(crate) last_query: Mutex<Option<ListQuery>>,
        fail_create: bool,
    }

    impl MockEntities {
        pub(crate) fn new(n: u32) -> Self {
            Self {
                rows: Mutex::new(
                    (1..=n)
                        .map(|i| Entity {
                            id: i.to_string(),
                            name: format!("Skill {}", i),
                            description: None,
                        })
                        .collect(),
                ),
                list_calls: AtomicUsize::new(0),
                last_query: Mutex::new(None),
                fail_create: false,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail_create: true,
                ..Self::new(0)
            }
        }

        pub(crate) fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    impl EntityBackend for MockEntities {
        async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.clone());
            let rows = self.rows.lock().unwrap().clone();
            let total = rows.len() as u64;
            if kind.pagination() == crate::models::PaginationMode::ClientSide {
                return Ok(ListPage {
                    items: rows,
                    ..ListPage::default()
                });
            }
            let start = ((query.page - 1) * query.per_page) as usize;
            Ok(ListPage {
                items: rows
                    .into_iter()
                    .skip(start)
                    .take(query.per_page as usize)
                    .collect(),
                count: Some(total),
                ..ListPage::default()
            })
        }

        async fn create(&self, _kind: EntityKind, form: &EntityForm) -> Result<Option<String>, ApiError> {
            if self.fail_create {
                return Err(ApiError::Validation("Skill already exists".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = (rows.len() + 1).to_string();
            rows.push(Entity {
                id,
                name: form.name.clone(),
                description: form.description.clone(),
            });
            Ok(Some("Created successfully".to_string()))
        }

        async fn update(
            &self,
            _kind: EntityKind,
            id: &str,
            form: &EntityForm,
        ) -> Result<Option<String>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
            row.name = form.name.clone();
            Ok(None)
        }

        async fn delete(&self, _kind: EntityKind, id: &str) -> Result<Option<String>, ApiError> {
            self.rows.lock().unwrap().retain(|r| r.id != id);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_page_three_of_twenty_five() {
        let mut table = CrudTable::new(MockEntities::new(25), EntityKind::Designation, 10);
        table.set_page(3);
        table.refresh(&CancellationToken::new()).await.unwrap();

        assert_eq!(table.items().len(), 5);
        assert_eq!(table.count(), 25);
        assert!(!table.has_next());
        assert!(table.has_prev());
        assert!(!table.loading());
    }

    #[tokio::test]
    async fn test_client_side_table_pages_locally() {
        let mut table = CrudTable::new(MockEntities::new(25), EntityKind::VideoCategory, 10);
        table.set_page(2);
        table.refresh(&CancellationToken::new()).await.unwrap();

        assert_eq!(table.items()[0].id, "11");
        assert!(table.has_next());
        let q = table.backend().last_query.lock().unwrap().clone().unwrap();
        assert_eq!(q.page, 2);
    }

    #[tokio::test]
    async fn test_search_resets_page() {
        let mut table = CrudTable::new(MockEntities::new(25), EntityKind::Skill, 10);
        table.set_page(3);
        assert!(table.set_search("rea"));
        assert_eq!(table.page(), 1);
        assert!(!table.set_search(" rea "));

        table.refresh(&CancellationToken::new()).await.unwrap();
        let q = table.backend().last_query.lock().unwrap().clone().unwrap();
        assert_eq!(q.search.as_deref(), Some("rea"));
    }

    #[tokio::test]
    async fn test_create_refreshes_once() {
        let mut table = CrudTable::new(MockEntities::new(0), EntityKind::Skill, 10);
        let form = EntityForm::new("React", Some("UI library".to_string()));

        let outcome = table.create(&form, &CancellationToken::new()).await;
        assert!(outcome.ok);
        assert_eq!(outcome.message.as_deref(), Some("Created successfully"));
        assert_eq!(table.backend().list_calls(), 1);
        assert_eq!(table.items()[0].name, "React");
        assert_eq!(table.items()[0].description.as_deref(), Some("UI library"));
    }

    #[tokio::test]
    async fn test_failed_create_does_not_refresh() {
        let mut table = CrudTable::new(MockEntities::failing(), EntityKind::Skill, 10);
        let outcome = table
            .create(&EntityForm::new("React", None), &CancellationToken::new())
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message.as_deref(), Some("Skill already exists"));
        assert_eq!(table.backend().list_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_backend() {
        let mut table = CrudTable::new(MockEntities::new(0), EntityKind::Skill, 10);
        let outcome = table
            .create(&EntityForm::new("  ", None), &CancellationToken::new())
            .await;
        assert!(!outcome.ok);
        assert_eq!(table.backend().list_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_refresh() {
        let mut table = CrudTable::new(MockEntities::new(3), EntityKind::City, 10);
        let cancel = CancellationToken::new();

        let outcome = table
            .update("2", &EntityForm::new("Pune", None), &cancel)
            .await;
        assert!(outcome.ok);
        assert_eq!(table.items()[1].name, "Pune");

        let outcome = table.delete("1", &cancel).await;
        assert!(outcome.ok);
        assert_eq!(table.items().len(), 2);
        assert_eq!(table.backend().list_calls(), 2);

        let missing = table.update("99", &EntityForm::new("X", None), &cancel).await;
        assert!(!missing.ok);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_keeps_rows() {
        let mut table = CrudTable::new(MockEntities::new(25), EntityKind::Skill, 10);
        table.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(table.items().len(), 10);

        let cancel = CancellationToken::new();
        cancel.cancel();
        table.set_page(2);
        let err = table.refresh(&cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(table.items()[0].id, "1");
        assert!(!table.loading());
    }
}
