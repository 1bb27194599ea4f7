//! Prompt registry: a directory of `.txt` system prompts
//!
//! The default prompt is created on first use. Unknown names fall back
//! to the default prompt so a stale client selection never breaks an
//! exchange.

use std::path::{Path, PathBuf};

use crate::Result;

/// Name of the prompt used when none is specified
pub const DEFAULT_PROMPT_NAME: &str = "default";

/// Body written for the auto-created default prompt
const DEFAULT_PROMPT_TEXT: &str = "You are a concise, helpful voice assistant. Keep answers \
short, factual, and follow up with a clarifying question when useful.";

/// Last-resort prompt when even the default file is unreadable
const FALLBACK_PROMPT: &str = "You are a helpful assistant.";

/// Loads system prompts from a directory of `.txt` files
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    dir: PathBuf,
}

impl PromptRegistry {
    /// Create a registry over `dir`, creating the directory and the
    /// default prompt file if they don't exist
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let registry = Self { dir };
        registry.ensure_default();
        Ok(registry)
    }

    /// Write the default prompt file if missing
    fn ensure_default(&self) {
        let path = self.prompt_path(DEFAULT_PROMPT_NAME);
        if !path.exists() {
            if let Err(e) = std::fs::write(&path, DEFAULT_PROMPT_TEXT) {
                tracing::warn!(path = %path.display(), error = %e, "failed to write default prompt");
            }
        }
    }

    /// List available prompt names, sorted
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "txt") {
                    path.file_stem().map(|s| s.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();

        names.sort();
        names
    }

    /// Load a prompt by name, falling back to the default prompt for
    /// unknown names
    #[must_use]
    pub fn load(&self, name: &str) -> String {
        self.ensure_default();

        if let Ok(text) = std::fs::read_to_string(self.prompt_path(name)) {
            return text;
        }

        if name != DEFAULT_PROMPT_NAME {
            tracing::debug!(name, "prompt not found, falling back to default");
        }

        std::fs::read_to_string(self.prompt_path(DEFAULT_PROMPT_NAME))
            .unwrap_or_else(|_| FALLBACK_PROMPT.to_string())
    }

    fn prompt_path(&self, name: &str) -> PathBuf {
        // Names come from the network; keep lookups inside the registry dir
        let stem = Path::new(name)
            .file_stem()
            .map_or_else(|| DEFAULT_PROMPT_NAME.to_string(), |s| s.to_string_lossy().into_owned());
        self.dir.join(format!("{stem}.txt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PromptRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = PromptRegistry::new(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_default_is_created() {
        let (_dir, registry) = setup();
        assert_eq!(registry.list(), vec!["default".to_string()]);
        assert_eq!(registry.load(DEFAULT_PROMPT_NAME), DEFAULT_PROMPT_TEXT);
    }

    #[test]
    fn test_list_sorted() {
        let (dir, registry) = setup();
        std::fs::write(dir.path().join("support.txt"), "support prompt").unwrap();
        std::fs::write(dir.path().join("concierge.txt"), "concierge prompt").unwrap();
        std::fs::write(dir.path().join("notes.md"), "not a prompt").unwrap();

        assert_eq!(registry.list(), vec!["concierge", "default", "support"]);
    }

    #[test]
    fn test_unknown_name_falls_back() {
        let (_dir, registry) = setup();
        assert_eq!(registry.load("no-such-prompt"), DEFAULT_PROMPT_TEXT);
    }

    #[test]
    fn test_traversal_stays_in_dir() {
        let (_dir, registry) = setup();
        // A path-ish name resolves to its stem inside the registry dir
        assert_eq!(registry.load("../../etc/passwd"), DEFAULT_PROMPT_TEXT);
    }
}
