//! Session handling for the portal
//!
//! Authentication itself happens on the backend; the client only keeps the
//! bearer token and profile fields it was handed at login.

pub mod login;
pub mod session;

pub use login::{login, logout, status, LoginMethod};
#[cfg(test)]
pub use session::MemorySessionStore;
pub use session::{Role, Session, SessionStore};
