//! SFC data model.
//!
//! Identities, sections and the finished `SfcObject`. Everything here is a
//! plain value: once an `SfcObject` is built it is shared behind an `Arc` and
//! never mutated again.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::scope::ScopeId;

lazy_static! {
    /// File stem accepted as a component name.
    static ref COMPONENT_NAME_RE: Regex =
        Regex::new(r"(?i)^[a-z][-_a-z0-9]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Absolute, canonical locator of an SFC document. Used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(locator: impl Into<String>) -> Self {
        Identity(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, without query or fragment.
    pub fn file_name(&self) -> &str {
        let path = self.0.split(['?', '#']).next().unwrap_or("");
        path.rsplit('/').next().unwrap_or("")
    }

    /// Component name derived from the file name, lower-cased, with
    /// `extension` stripped when present.
    ///
    /// `MyButton.vue` → `mybutton`. Names must start with a letter and only
    /// contain letters, digits, `-` and `_`.
    pub fn component_name(&self, extension: &str) -> Option<String> {
        let file_name = self.file_name();
        let stem = match file_name.len().checked_sub(extension.len()) {
            Some(cut)
                if !extension.is_empty()
                    && file_name.is_char_boundary(cut)
                    && file_name[cut..].eq_ignore_ascii_case(extension) =>
            {
                &file_name[..cut]
            }
            _ => file_name,
        };
        COMPONENT_NAME_RE
            .is_match(stem)
            .then(|| stem.to_lowercase())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity::new(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPENDENCY STACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain of identities from the resolution root to the current document.
///
/// Never mutated in place: `push` returns an extended copy, so sibling
/// resolutions cannot observe each other's frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyStack(Vec<Identity>);

impl DependencyStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.0.contains(identity)
    }

    pub fn push(&self, identity: Identity) -> Self {
        let mut frames = self.0.clone();
        frames.push(identity);
        DependencyStack(frames)
    }

    pub fn last(&self) -> Option<&Identity> {
        self.0.last()
    }

    pub fn as_slice(&self) -> &[Identity] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The chain reported when `identity` would close a cycle.
    pub fn chain_with(&self, identity: &Identity) -> Vec<Identity> {
        let mut chain = self.0.clone();
        chain.push(identity.clone());
        chain
    }
}

impl From<Vec<Identity>> for DependencyStack {
    fn from(frames: Vec<Identity>) -> Self {
        DependencyStack(frames)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Style,
    Script,
    Template,
}

impl SectionKind {
    pub fn tag_name(self) -> &'static str {
        match self {
            SectionKind::Style => "style",
            SectionKind::Script => "script",
            SectionKind::Template => "template",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "style" => Some(SectionKind::Style),
            "script" => Some(SectionKind::Script),
            "template" => Some(SectionKind::Template),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAttributes {
    /// External content reference (`src="..."`).
    pub src: Option<String>,
    /// `scoped` marker on style sections.
    pub scoped: bool,
    /// Language hint (`lang="ts"`).
    pub lang: Option<String>,
    /// Every attribute as written; valueless attributes map to `"true"`.
    pub raw: BTreeMap<String, String>,
}

impl SectionAttributes {
    pub fn from_raw(raw: BTreeMap<String, String>) -> Self {
        Self {
            src: raw.get("src").cloned(),
            scoped: raw.contains_key("scoped"),
            lang: raw.get("lang").cloned(),
            raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub kind: SectionKind,
    pub content: String,
    pub attributes: SectionAttributes,
    /// Raw outer markup, kept for diagnostics.
    pub outer: String,
    /// Byte offset of the opening tag in the source.
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcSections {
    pub styles: Vec<Section>,
    pub scripts: Vec<Section>,
    pub templates: Vec<Section>,
}

impl SfcSections {
    pub fn push(&mut self, section: Section) {
        match section.kind {
            SectionKind::Style => self.styles.push(section),
            SectionKind::Script => self.scripts.push(section),
            SectionKind::Template => self.templates.push(section),
        }
    }

    pub fn has_scoped_style(&self) -> bool {
        self.styles.iter().any(|s| s.attributes.scoped)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SFC OBJECT
// ═══════════════════════════════════════════════════════════════════════════════

/// Loadable reference to a published module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLocation(String);

impl ArtifactLocation {
    pub fn new(location: impl Into<String>) -> Self {
        ArtifactLocation(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully transpiled document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcObject {
    pub identity: Identity,
    pub name: Option<String>,
    #[serde(skip)]
    pub source: Arc<str>,
    pub sections: SfcSections,
    pub scope_id: Option<ScopeId>,
    pub merged_style: String,
    pub merged_template: String,
    pub merged_script: String,
    pub children: Vec<Identity>,
    pub generated_code: Arc<str>,
    pub artifact_location: ArtifactLocation,
}
