//! One place that turns the three list-endpoint shapes into a page window

use crate::models::{Entity, PaginationMode};

/// What a list endpoint returned, before pagination is resolved.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<Entity>,
    pub count: Option<u64>,
    pub has_next_page: Option<bool>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Query sent to a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
}

impl ListQuery {
    /// Query parameters. Client-side endpoints get the search term only.
    pub fn params(&self, mode: PaginationMode) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if mode != PaginationMode::ClientSide {
            params.push(("page", self.page.to_string()));
            params.push(("per_page", self.per_page.to_string()));
        }
        if let Some(ref search) = self.search {
            params.push(("search", search.clone()));
        }
        params
    }
}

/// The visible slice of a table plus its navigation flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub items: Vec<Entity>,
    pub count: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Resolve `page` of a list response.
///
/// Server-supplied `hasNextPage` wins, then a `next` link, then `count` against
/// `page * per_page`. Client-side endpoints are sliced here.
pub fn resolve(mode: PaginationMode, page: u32, per_page: u32, resp: ListPage) -> PageWindow {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let shown_through = u64::from(page) * u64::from(per_page);

    if mode == PaginationMode::ClientSide {
        let total = resp.items.len() as u64;
        let start = ((page - 1) as usize).saturating_mul(per_page as usize);
        let items = resp
            .items
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        return PageWindow {
            items,
            count: total,
            has_next: total > shown_through,
            has_prev: page > 1,
        };
    }

    let count = resp
        .count
        .unwrap_or_else(|| u64::from(page - 1) * u64::from(per_page) + resp.items.len() as u64);
    let has_next = resp
        .has_next_page
        .unwrap_or_else(|| resp.next.is_some() || count > shown_through);

    PageWindow {
        items: resp.items,
        count,
        has_next,
        has_prev: page > 1 || resp.previous.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(range: std::ops::Range<u32>) -> Vec<Entity> {
        range
            .map(|i| Entity {
                id: i.to_string(),
                name: format!("Skill {}", i),
                description: None,
            })
            .collect()
    }

    #[test]
    fn test_counted_last_page() {
        let resp = ListPage {
            items: rows(21..26),
            count: Some(25),
            ..ListPage::default()
        };
        let window = resolve(PaginationMode::Counted, 3, 10, resp);
        assert_eq!(window.items.len(), 5);
        assert!(!window.has_next);
        assert!(window.has_prev);
        assert_eq!(window.count, 25);
    }

    #[test]
    fn test_counted_middle_page() {
        let resp = ListPage {
            items: rows(11..21),
            count: Some(25),
            ..ListPage::default()
        };
        let window = resolve(PaginationMode::Counted, 2, 10, resp);
        assert!(window.has_next);
    }

    #[test]
    fn test_server_flag_wins() {
        let resp = ListPage {
            items: rows(1..11),
            count: Some(25),
            has_next_page: Some(false),
            ..ListPage::default()
        };
        assert!(!resolve(PaginationMode::Server, 1, 10, resp).has_next);

        let linked = ListPage {
            items: rows(1..11),
            next: Some("https://api.example.com/api/list_city/?page=2".to_string()),
            ..ListPage::default()
        };
        assert!(resolve(PaginationMode::Server, 1, 10, linked).has_next);
    }

    #[test]
    fn test_client_side_slicing() {
        let full = ListPage {
            items: rows(1..26),
            ..ListPage::default()
        };
        let window = resolve(PaginationMode::ClientSide, 3, 10, full.clone());
        assert_eq!(window.items.len(), 5);
        assert_eq!(window.items[0].id, "21");
        assert_eq!(window.count, 25);
        assert!(!window.has_next);

        let first = resolve(PaginationMode::ClientSide, 1, 10, full.clone());
        assert!(first.has_next);
        assert!(!first.has_prev);

        let beyond = resolve(PaginationMode::ClientSide, 9, 10, full);
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn test_params_by_mode() {
        let q = ListQuery {
            page: 2,
            per_page: 10,
            search: Some("rust".to_string()),
        };
        assert_eq!(
            q.params(PaginationMode::Server),
            vec![
                ("page", "2".to_string()),
                ("per_page", "10".to_string()),
                ("search", "rust".to_string())
            ]
        );
        assert_eq!(
            q.params(PaginationMode::ClientSide),
            vec![("search", "rust".to_string())]
        );
    }
}
