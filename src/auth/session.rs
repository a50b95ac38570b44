//! Session state and storage backends

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Portal a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Company,
    University,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Company => "company",
            Role::University => "university",
            Role::Superadmin => "superadmin",
        }
    }

    /// Parse the role string the backend returns at login.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "company" | "recruiter" => Some(Role::Company),
            "university" | "college" => Some(Role::University),
            "superadmin" | "super_admin" | "admin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

/// Logged-in user as known to the client.
///
/// The token is opaque; nothing here is verified locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_image: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            role,
            user_id: None,
            user_name: None,
            user_image: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("(unknown)")
    }
}

/// Session store trait for different storage backends
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn token(&self) -> Option<String> {
        self.load().map(|s| s.token)
    }
}

/// In-process store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySessionStore {
    inner: std::sync::Mutex<Option<Session>>,
}

#[cfg(test)]
impl MemorySessionStore {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            inner: std::sync::Mutex::new(session),
        }
    }
}

#[cfg(test)]
impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.inner.lock().ok().and_then(|s| s.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(session.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Student"), Some(Role::Student));
        assert_eq!(Role::parse("super_admin"), Some(Role::Superadmin));
        assert_eq!(Role::parse("college"), Some(Role::University));
        assert_eq!(Role::parse("alien"), None);
    }

    #[test]
    fn test_memory_store_roundtrip_and_clear() {
        let store = MemorySessionStore::default();
        assert!(store.load().is_none());

        let mut session = Session::new("tok", Role::Company);
        session.user_id = Some("12".to_string());
        store.save(&session).unwrap();
        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.load().and_then(|s| s.user_id).as_deref(), Some("12"));

        store.clear().unwrap();
        assert!(store.token().is_none());
    }
}
