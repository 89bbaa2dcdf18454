//! Shared transpilation context.
//!
//! One context is shared by every resolution started from the same
//! `Transpiler`: options, the host services (loader, resolver, CSS rule
//! parser, artifact store), the scope allocator and the dependency cache.

use std::sync::Arc;

use crate::cache::DependencyCache;
use crate::css::{RuleParser, SimpleRuleParser};
use crate::error::{Result, TranspileError};
use crate::loader::{ContentLoader, FsContentLoader, LocatorResolver, PathResolver};
use crate::options::{ContentFailurePolicy, TranspileOptions};
use crate::publish::{ArtifactPublisher, ArtifactStore, MemoryArtifactStore};
use crate::scope::ScopeAllocator;
use crate::sfc::{Identity, Section};

pub struct TranspileContext {
    options: TranspileOptions,
    loader: Arc<dyn ContentLoader>,
    resolver: Arc<dyn LocatorResolver>,
    rule_parser: Arc<dyn RuleParser>,
    publisher: ArtifactPublisher,
    scopes: Arc<ScopeAllocator>,
    cache: Arc<DependencyCache>,
}

impl TranspileContext {
    pub fn builder() -> TranspileContextBuilder {
        TranspileContextBuilder::default()
    }

    pub fn options(&self) -> &TranspileOptions {
        &self.options
    }

    pub fn resolver(&self) -> &dyn LocatorResolver {
        self.resolver.as_ref()
    }

    pub fn rule_parser(&self) -> &dyn RuleParser {
        self.rule_parser.as_ref()
    }

    pub fn publisher(&self) -> &ArtifactPublisher {
        &self.publisher
    }

    pub fn scopes(&self) -> &ScopeAllocator {
        &self.scopes
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    /// Fetch `locator` through the content loader, applying the configured
    /// failure policy.
    pub async fn load_content(&self, locator: &Identity) -> Result<String> {
        match self.loader.load(locator).await {
            Ok(text) => Ok(text),
            Err(err) => match self.options.content_failure {
                ContentFailurePolicy::Degrade => {
                    tracing::warn!(
                        "failed to load {}: {}; continuing with empty content",
                        locator,
                        err
                    );
                    Ok(String::new())
                }
                ContentFailurePolicy::FailFast => Err(TranspileError::ContentLoad {
                    locator: locator.clone(),
                    reason: err.to_string(),
                }),
            },
        }
    }

    /// Text of a section: external `src` content first, then the inline
    /// body, separated by a newline when both are present.
    pub async fn section_text(&self, identity: &Identity, section: &Section) -> Result<String> {
        let Some(src) = &section.attributes.src else {
            return Ok(section.content.clone());
        };

        let locator = self.resolver.resolve(src, identity)?;
        let external = self.load_content(&locator).await?;

        Ok(if section.content.trim().is_empty() {
            external
        } else if external.is_empty() {
            section.content.clone()
        } else {
            format!("{}\n{}", external, section.content)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct TranspileContextBuilder {
    options: Option<TranspileOptions>,
    loader: Option<Arc<dyn ContentLoader>>,
    resolver: Option<Arc<dyn LocatorResolver>>,
    rule_parser: Option<Arc<dyn RuleParser>>,
    store: Option<Arc<dyn ArtifactStore>>,
    scopes: Option<Arc<ScopeAllocator>>,
    cache: Option<Arc<DependencyCache>>,
}

impl TranspileContextBuilder {
    pub fn options(mut self, options: TranspileOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn LocatorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn rule_parser(mut self, rule_parser: Arc<dyn RuleParser>) -> Self {
        self.rule_parser = Some(rule_parser);
        self
    }

    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scope_allocator(mut self, scopes: Arc<ScopeAllocator>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn cache(mut self, cache: Arc<DependencyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Missing services fall back to the filesystem loader, the path
    /// resolver, the built-in rule parser, an in-memory artifact store and a
    /// fresh cache. Scope ids come from the process-wide allocator for the
    /// configured prefix.
    pub fn build(self) -> TranspileContext {
        let options = self.options.unwrap_or_default();
        let scopes = self
            .scopes
            .unwrap_or_else(|| ScopeAllocator::for_prefix(&options.scope_prefix));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryArtifactStore::new(options.artifact_scheme.clone())));

        TranspileContext {
            loader: self.loader.unwrap_or_else(|| Arc::new(FsContentLoader::new())),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(PathResolver)),
            rule_parser: self.rule_parser.unwrap_or_else(|| Arc::new(SimpleRuleParser)),
            publisher: ArtifactPublisher::new(store),
            scopes,
            cache: self.cache.unwrap_or_default(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryContentLoader;
    use crate::sfc::{SectionAttributes, SectionKind};
    use std::collections::BTreeMap;

    fn style_section(content: &str, src: Option<&str>) -> Section {
        let mut raw = BTreeMap::new();
        if let Some(src) = src {
            raw.insert("src".to_string(), src.to_string());
        }
        Section {
            kind: SectionKind::Style,
            content: content.to_string(),
            attributes: SectionAttributes::from_raw(raw),
            outer: String::new(),
            offset: 0,
        }
    }

    fn context(policy: ContentFailurePolicy, loader: Arc<MemoryContentLoader>) -> TranspileContext {
        TranspileContext::builder()
            .options(TranspileOptions {
                content_failure: policy,
                ..TranspileOptions::default()
            })
            .loader(loader)
            .build()
    }

    #[tokio::test]
    async fn test_section_text_puts_external_content_first() {
        let loader = Arc::new(MemoryContentLoader::new());
        loader.insert("/app/theme.css", ".t { a: 1 }");
        let ctx = context(ContentFailurePolicy::Degrade, loader.clone());
        let id = Identity::new("/app/A.vue");

        let both = ctx
            .section_text(&id, &style_section(".i { b: 2 }", Some("./theme.css")))
            .await
            .unwrap();
        assert_eq!(both, ".t { a: 1 }\n.i { b: 2 }");

        let inline = ctx
            .section_text(&id, &style_section(".i { b: 2 }", None))
            .await
            .unwrap();
        assert_eq!(inline, ".i { b: 2 }");
        assert_eq!(loader.fetch_count(&Identity::new("/app/theme.css")), 1);
    }

    #[tokio::test]
    async fn test_degrade_policy_yields_empty_content() {
        let ctx = context(ContentFailurePolicy::Degrade, Arc::new(MemoryContentLoader::new()));
        let text = ctx.load_content(&Identity::new("/missing.css")).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_fail_fast_policy_reports_content_load() {
        let ctx = context(ContentFailurePolicy::FailFast, Arc::new(MemoryContentLoader::new()));
        let err = ctx
            .load_content(&Identity::new("/missing.css"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_LOAD);
    }

    fn with_prefix(prefix: &str) -> TranspileContext {
        TranspileContext::builder()
            .options(TranspileOptions {
                scope_prefix: prefix.to_string(),
                ..TranspileOptions::default()
            })
            .build()
    }

    #[test]
    fn test_custom_prefix_is_applied() {
        let ctx = with_prefix("data-s-");
        assert_eq!(ctx.scopes().prefix(), "data-s-");
        assert!(ctx.scopes().allocate().as_str().starts_with("data-s-"));
    }

    #[test]
    fn test_contexts_with_same_prefix_never_repeat_scope_ids() {
        let first = with_prefix("data-shared-");
        let second = with_prefix("data-shared-");
        assert!(std::ptr::eq(first.scopes(), second.scopes()));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..20_000 {
            assert!(seen.insert(first.scopes().allocate()));
            assert!(seen.insert(second.scopes().allocate()));
        }
    }
}
