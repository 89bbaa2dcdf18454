//! # SFC Transpiler
//!
//! Turns single-file component documents (`<template>`, `<script>`,
//! `<style>` in one file) into loadable JavaScript modules at run time,
//! following `.vue` imports recursively.
//!
//! ## Resolution Invariants
//!
//! 1. **Single Flight**: an identity is resolved at most once per cache. The
//!    cache entry is installed when the identity is claimed, before any work
//!    runs, and every later request joins it.
//!
//! 2. **Children First**: a document's artifact is published only after every
//!    SFC it imports has been published, and its import specifiers point at
//!    those artifacts.
//!
//! 3. **Cycles Fail**: an identity that reappears in its own dependency chain
//!    fails with `CyclicDependency` carrying the whole chain. Joins that would
//!    leave two in-flight resolutions waiting on each other fail the same way.
//!
//! 4. **One Scope Per Document**: all scoped styles of a document share one
//!    scope id, and no two documents share a scope id.
//!
//! 5. **Splice, Don't Regenerate**: script text is rewritten by byte spans;
//!    everything outside the rewritten specifiers and the default export is
//!    kept as written.

mod cache;
mod codegen;
mod context;
mod css;
mod error;
mod loader;
mod options;
mod parse;
mod publish;
mod resolve;
mod scope;
mod script;
mod sfc;
mod style;
mod template;
mod transpile;


pub use cache::{
    CacheEntry, CacheSnapshot, Claim, DependencyCache, EntryFuture, EntryStatus, FailedEntry,
    SnapshotEntry,
};
pub use codegen::{binding_name, generate_module, CodegenInput};
pub use context::{TranspileContext, TranspileContextBuilder};
pub use css::{serialize_rules, CssRule, RuleParser, SimpleRuleParser};
pub use error::{Result, TranspileError};
pub use error::{
    ERR_CODEGEN, ERR_CYCLE, ERR_DEPENDENCY, ERR_LOAD, ERR_PARSE, ERR_PUBLISH, ERR_RESOLVE,
};
pub use loader::{
    ContentLoader, FsContentLoader, LoadError, LocatorResolver, MemoryContentLoader, PathResolver,
};
pub use options::{ContentFailurePolicy, TranspileOptions};
pub use parse::{parse_attributes, parse_sfc};
pub use publish::{compute_hash, ArtifactPublisher, ArtifactStore, MemoryArtifactStore};
pub use scope::{ScopeAllocator, ScopeId, DEFAULT_SCOPE_PREFIX};
pub use script::{
    analyze_script, escape_js_string, DefaultExport, ModuleReference, ReferenceKind, ScriptAnalysis,
};
pub use sfc::{
    ArtifactLocation, DependencyStack, Identity, Section, SectionAttributes, SectionKind, SfcObject,
    SfcSections,
};
pub use style::{process_styles, scope_rules, scope_selector_list, StyleOutput};
pub use template::process_templates;
pub use transpile::Transpiler;
