//! Transpiler configuration.

use serde::{Deserialize, Serialize};

use crate::scope::DEFAULT_SCOPE_PREFIX;

/// What to do when the content loader fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentFailurePolicy {
    /// Log the failure and continue with empty content.
    #[default]
    Degrade,
    /// Abort the document with `ContentLoad`.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranspileOptions {
    /// Import paths ending with this are treated as SFC dependencies.
    pub sfc_extension: String,
    /// Prefix of allocated scope ids.
    pub scope_prefix: String,
    /// Prefix of the local binding that replaces the default export.
    pub binding_prefix: String,
    /// Scheme of artifact locations handed out by the in-memory store.
    pub artifact_scheme: String,
    /// Component hook that inserts the style element.
    pub create_hook: String,
    /// Component hook that removes the style element.
    pub destroy_hook: String,
    pub content_failure: ContentFailurePolicy,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            sfc_extension: ".vue".to_string(),
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_string(),
            binding_prefix: "__sfc_".to_string(),
            artifact_scheme: "sfc-artifact".to_string(),
            create_hook: "created".to_string(),
            destroy_hook: "destroyed".to_string(),
            content_failure: ContentFailurePolicy::Degrade,
        }
    }
}

impl TranspileOptions {
    /// Parse options from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_sfc_path(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        path.ends_with(&self.sfc_extension)
    }
}
