//! Data models for portal entities

mod contact;
mod entity;
mod message;

pub use contact::*;
pub use entity::*;
pub use message::*;
