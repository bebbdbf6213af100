use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{BracketError, Result};
use crate::types::{AppConfig, Entry};

/// Predicate applied to every `source_ref` before it is accepted.
pub type SourceValidator = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// CompetitorRegistry holds the ordered entries of a tournament before
/// the bracket is built. Insertion order is kept because seeding pairs
/// adjacent entries.
pub struct CompetitorRegistry {
    entries: Vec<Entry>,
    /// Registered source references for duplicate detection
    source_index: HashSet<String>,
    validator: Option<SourceValidator>,
}

impl Default for CompetitorRegistry {
    fn default() -> Self {
        CompetitorRegistry::new()
    }
}

impl fmt::Debug for CompetitorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompetitorRegistry")
            .field("entries", &self.entries)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl CompetitorRegistry {
    /// Registry that accepts any non-empty source reference.
    pub fn new() -> Self {
        CompetitorRegistry {
            entries: Vec::new(),
            source_index: HashSet::new(),
            validator: None,
        }
    }

    pub fn with_validator<F>(validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        CompetitorRegistry {
            validator: Some(Box::new(validator)),
            ..CompetitorRegistry::new()
        }
    }

    /// Registry restricted to the extensions listed in the config.
    pub fn for_config(config: &AppConfig) -> Self {
        if config.allowed_extensions.is_empty() {
            return CompetitorRegistry::new();
        }
        CompetitorRegistry::with_validator(extension_validator(&config.allowed_extensions))
    }

    /// Validate and append an entry.
    pub fn add(&mut self, name: &str, source_ref: &str) -> Result<&Entry> {
        let name = name.trim();
        if name.is_empty() {
            warn!("Rejected entry with empty name ({source_ref})");
            return Err(BracketError::invalid_entry("name must not be empty"));
        }
        let source_ref = source_ref.trim();
        if source_ref.is_empty() {
            warn!("Rejected entry '{name}' with empty source");
            return Err(BracketError::invalid_entry(format!("'{name}' has no source reference")));
        }
        if let Some(validator) = &self.validator {
            if !validator(source_ref) {
                warn!("Rejected entry '{name}': {source_ref} failed validation");
                return Err(BracketError::invalid_entry(format!(
                    "{source_ref} is not an accepted source"
                )));
            }
        }
        if self.source_index.contains(source_ref) {
            warn!("Rejected duplicate entry {source_ref}");
            return Err(BracketError::DuplicateEntry {
                source_ref: source_ref.to_string(),
            });
        }

        self.source_index.insert(source_ref.to_string());
        self.entries.push(Entry::new(name, source_ref));
        debug!("Registered '{name}' ({source_ref}), {} entries", self.entries.len());
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Register a file path, using its file name as the display name.
    pub fn add_path(&mut self, path: &Path) -> Result<&Entry> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                BracketError::invalid_entry(format!("{} has no file name", path.display()))
            })?
            .to_string();
        self.add(&name, &path.to_string_lossy())
    }

    pub fn list(&self) -> &[Entry] {
        &self.entries
    }

    /// Display names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_source(&self, source_ref: &str) -> bool {
        self.source_index.contains(source_ref.trim())
    }

    /// Clear all entries, keeping the validator (used when starting over)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.source_index.clear();
    }
}

/// Build a validator accepting paths whose extension is one of `extensions`.
/// Comparison ignores case and a leading dot; an empty list accepts anything.
pub fn extension_validator(extensions: &[String]) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let allowed: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    move |source_ref: &str| {
        if allowed.is_empty() {
            return true;
        }
        Path::new(source_ref)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                allowed.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3_registry() -> CompetitorRegistry {
        CompetitorRegistry::with_validator(extension_validator(&["mp3".to_string()]))
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut registry = CompetitorRegistry::new();
        registry.add("Song C", "c.mp3").unwrap();
        registry.add("Song A", "a.mp3").unwrap();
        registry.add("Song B", "b.mp3").unwrap();

        assert_eq!(registry.count(), 3);
        assert_eq!(registry.names(), vec!["Song C", "Song A", "Song B"]);
        assert_eq!(registry.list()[1], Entry::new("Song A", "a.mp3"));
    }

    #[test]
    fn test_duplicate_source_is_rejected() {
        let mut registry = CompetitorRegistry::new();
        registry.add("First", "song.mp3").unwrap();

        let err = registry.add("Second", "song.mp3").unwrap_err();
        assert_eq!(
            err,
            BracketError::DuplicateEntry {
                source_ref: "song.mp3".to_string()
            }
        );
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.list()[0].name, "First");
    }

    #[test]
    fn test_same_name_different_source_is_allowed() {
        let mut registry = CompetitorRegistry::new();
        registry.add("Intro", "album1/intro.mp3").unwrap();
        registry.add("Intro", "album2/intro.mp3").unwrap();
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let mut registry = CompetitorRegistry::new();
        let err = registry.add("   ", "song.mp3").unwrap_err();
        assert!(matches!(err, BracketError::InvalidEntry { .. }));
        assert!(registry.is_empty());
        // Rejected entries do not reserve their source
        assert!(!registry.contains_source("song.mp3"));
    }

    #[test]
    fn test_validator_rejects_other_formats() {
        let mut registry = mp3_registry();
        registry.add("Good", "music/good.MP3").unwrap();

        let err = registry.add("Bad", "music/bad.wav").unwrap_err();
        assert!(matches!(err, BracketError::InvalidEntry { .. }));
        let err = registry.add("None", "music/no_extension").unwrap_err();
        assert!(matches!(err, BracketError::InvalidEntry { .. }));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_extension_validator_normalizes_config_values() {
        let validator = extension_validator(&[".FLAC".to_string(), " ogg ".to_string()]);
        assert!(validator("a.flac"));
        assert!(validator("b.OGG"));
        assert!(!validator("c.mp3"));

        let any = extension_validator(&[]);
        assert!(any("whatever"));
    }

    #[test]
    fn test_add_path_uses_file_name() {
        let mut registry = mp3_registry();
        let entry = registry.add_path(Path::new("/music/Artist - Track.mp3")).unwrap();
        assert_eq!(entry.name, "Artist - Track.mp3");
        assert_eq!(entry.source_ref, "/music/Artist - Track.mp3");

        let err = registry.add_path(Path::new("/")).unwrap_err();
        assert!(matches!(err, BracketError::InvalidEntry { .. }));
    }

    #[test]
    fn test_for_config_follows_allowed_extensions() {
        let mut config = AppConfig::default();
        let mut registry = CompetitorRegistry::for_config(&config);
        assert!(registry.add("Wave", "x.wav").is_err());

        config.allowed_extensions.clear();
        registry = CompetitorRegistry::for_config(&config);
        assert!(registry.add("Wave", "x.wav").is_ok());
    }

    #[test]
    fn test_clear_keeps_validator() {
        let mut registry = mp3_registry();
        registry.add("One", "one.mp3").unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.add("One", "one.mp3").is_ok());
        assert!(registry.add("Two", "two.txt").is_err());
    }
}
