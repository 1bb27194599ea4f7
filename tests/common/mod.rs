//! Shared test utilities

use murmur_relay::{db, DbPool, PromptRegistry};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Set up a prompt registry over a throwaway directory
///
/// The TempDir must stay alive for as long as the registry is used.
#[must_use]
pub fn setup_prompts() -> (tempfile::TempDir, PromptRegistry) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let registry = PromptRegistry::new(dir.path()).expect("failed to init prompt registry");
    (dir, registry)
}
