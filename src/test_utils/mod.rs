//! In-memory collaborators for tests.

pub mod directory_fetcher;
pub mod transient_store;
