//! Pipeline configuration values and fingerprinting.
//!
//! A [`PipelineConfig`] is an immutable description of a pipeline: its
//! identifier, its source text, and its settings. Configurations are
//! content-addressed through a [`Fingerprint`] so the host can tell whether
//! a reload actually changes behavior.

mod compiler;

pub use compiler::{PipelineCompiler, StandardCompiler};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The settings key controlling whether a pipeline may be hot-swapped.
pub const RELOADABLE_KEY: &str = "pipeline.reloadable";

/// An opaque, comparable pipeline identifier, unique within a host process.
///
/// Cheap to clone; used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineId(Arc<str>);

impl PipelineId {
    /// Creates a new pipeline identifier.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipelineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PipelineId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// A content-derived identity for a configuration.
///
/// Derived from the whitespace-normalized source text, so semantically
/// identical configurations compare equal regardless of formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a configuration source.
    #[must_use]
    pub fn of_source(source: &str) -> Self {
        let normalized: Vec<&str> = source.split_whitespace().collect();
        let mut hasher = Sha256::new();
        hasher.update(normalized.join(" ").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the fingerprint as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline settings: the typed `pipeline.reloadable` flag plus arbitrary
/// additional key/value entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Whether the configuration permits hot-swapping.
    pub reloadable: bool,
    /// Additional free-form settings.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reloadable: true,
            extra: BTreeMap::new(),
        }
    }
}

impl PipelineSettings {
    /// Creates default settings (reloadable).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reloadable flag.
    #[must_use]
    pub const fn with_reloadable(mut self, reloadable: bool) -> Self {
        self.reloadable = reloadable;
        self
    }

    /// Adds a free-form setting entry.
    ///
    /// The `pipeline.reloadable` key is recognized and routed to the typed
    /// flag when its value is a boolean.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        if key == RELOADABLE_KEY {
            if let Some(flag) = value.as_bool() {
                self.reloadable = flag;
                return self;
            }
        }
        self.extra.insert(key, value);
        self
    }

    /// Looks up a free-form setting.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        if key == RELOADABLE_KEY {
            return None;
        }
        self.extra.get(key)
    }
}

/// An immutable pipeline configuration.
///
/// Produced by the operator-facing layers (file loading, APIs) and consumed
/// by the compiler collaborator. Never mutated after construction; a reload
/// always supplies a whole new configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pipeline_id: PipelineId,
    source: Arc<str>,
    settings: PipelineSettings,
    fingerprint: Fingerprint,
}

impl PipelineConfig {
    /// Creates a new configuration from source text and settings.
    #[must_use]
    pub fn new(
        pipeline_id: impl Into<PipelineId>,
        source: impl AsRef<str>,
        settings: PipelineSettings,
    ) -> Self {
        let source = source.as_ref();
        Self {
            pipeline_id: pipeline_id.into(),
            source: Arc::from(source),
            settings,
            fingerprint: Fingerprint::of_source(source),
        }
    }

    /// Returns the pipeline identifier this configuration targets.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Returns the configuration source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns whether the configuration permits hot-swapping.
    #[must_use]
    pub const fn reloadable(&self) -> bool {
        self.settings.reloadable
    }

    /// Returns the configuration fingerprint.
    #[must_use]
    pub const fn config_hash(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fingerprint_ignores_whitespace() {
        let a = Fingerprint::of_source("input { generator {} }  output { null {} }");
        let b = Fingerprint::of_source("input {\n  generator {}\n}\noutput { null {} }");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = Fingerprint::of_source("input { generator {} } output { null {} }");
        let b = Fingerprint::of_source("input { blocking {} } output { null {} }");
        assert_ne!(a, b);
    }

    #[test]
    fn test_settings_reloadable_key_routed() {
        let settings = PipelineSettings::new().with_entry(RELOADABLE_KEY, serde_json::json!(false));
        assert!(!settings.reloadable);
        assert!(settings.get(RELOADABLE_KEY).is_none());
    }

    #[test]
    fn test_settings_extra_entries() {
        let settings =
            PipelineSettings::new().with_entry("pipeline.workers", serde_json::json!(4));
        assert_eq!(
            settings.get("pipeline.workers"),
            Some(&serde_json::json!(4))
        );
        assert!(settings.reloadable);
    }

    #[test]
    fn test_config_exposes_hash_and_id() {
        let config = PipelineConfig::new(
            "main",
            "input { generator {} } output { null {} }",
            PipelineSettings::new(),
        );
        assert_eq!(config.pipeline_id().as_str(), "main");
        assert_eq!(
            config.config_hash(),
            &Fingerprint::of_source("input { generator {} } output { null {} }")
        );
    }
}
