//! Application identifier override.

pub mod app_id;

pub use app_id::{apply_app_id_override, is_valid_app_id, IdentifierStore, InMemoryIdentifierStore};
