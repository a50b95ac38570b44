//! Common JSON envelope wrapping every REST response

use serde::Deserialize;

/// `{statusCode, message, data, count?, hasNextPage?, next?, previous?}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(alias = "status_code")]
    pub status_code: Option<u16>,
    /// A string in the common case, a field-error object on validation failures.
    pub message: Option<serde_json::Value>,
    pub data: Option<T>,
    pub count: Option<u64>,
    #[serde(alias = "has_next_page")]
    pub has_next_page: Option<bool>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T> Envelope<T> {
    /// Envelope for an empty response body (e.g. `204 No Content`).
    pub fn empty(status: u16) -> Self {
        Self {
            status_code: Some(status),
            message: None,
            data: None,
            count: None,
            has_next_page: None,
            next: None,
            previous: None,
        }
    }

    /// Server message when it is a plain string.
    pub fn message_text(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_envelope() {
        let body = r#"{
            "statusCode": 200,
            "message": "Skills fetched",
            "data": [{"id": 1, "name": "Rust"}],
            "count": 25,
            "hasNextPage": true,
            "next": "https://api.example.com/api/list_skill/?page=2",
            "previous": null
        }"#;
        let env: Envelope<Vec<serde_json::Value>> = serde_json::from_str(body).unwrap();
        assert_eq!(env.status_code, Some(200));
        assert_eq!(env.message_text().as_deref(), Some("Skills fetched"));
        assert_eq!(env.data.unwrap().len(), 1);
        assert_eq!(env.count, Some(25));
        assert_eq!(env.has_next_page, Some(true));
        assert!(env.previous.is_none());
    }

    #[test]
    fn test_object_message_is_not_text() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"statusCode":400,"message":{"name":["taken"]}}"#).unwrap();
        assert!(env.message_text().is_none());
        assert!(env.data.is_none());
    }
}
