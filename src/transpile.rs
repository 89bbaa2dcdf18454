//! Transpiler entry points.
//!
//! `Transpiler` drives one document through the pipeline
//!
//! ```text
//! load → parse → (styles ∥ template ∥ dependencies) → codegen → publish
//! ```
//!
//! and records the result in the dependency cache. Every identity is
//! resolved at most once per cache; concurrent and repeated requests share
//! the first resolution.

use futures::future::FutureExt;
use std::sync::Arc;

use crate::cache::{CacheEntry, EntryFuture};
use crate::codegen::{generate_module, CodegenInput};
use crate::context::TranspileContext;
use crate::error::{Result, TranspileError};
use crate::parse::parse_sfc;
use crate::resolve::resolve_dependencies;
use crate::sfc::{DependencyStack, Identity, SfcObject};
use crate::style::process_styles;
use crate::template::process_templates;

#[derive(Clone)]
pub struct Transpiler {
    ctx: Arc<TranspileContext>,
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new(TranspileContext::builder().build())
    }
}

impl Transpiler {
    pub fn new(ctx: TranspileContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &TranspileContext {
        &self.ctx
    }

    /// Transpile a document whose source the caller already holds.
    ///
    /// `stack` is the chain of documents that led here (empty for a root).
    /// If `identity` is already cached or in flight, that resolution is
    /// returned and `source` is ignored.
    pub async fn transpile(
        &self,
        identity: &Identity,
        source: &str,
        stack: &DependencyStack,
    ) -> Result<(Arc<str>, Arc<SfcObject>)> {
        let entry = self
            .resolve_entry(identity, Some(Arc::from(source)), stack)
            .await?;
        Ok((entry.sfc.generated_code.clone(), entry.sfc))
    }

    /// Canonicalize `locator`, load it and transpile it as a root document.
    pub async fn transpile_locator(&self, locator: &str) -> Result<(Arc<str>, Arc<SfcObject>)> {
        let identity = self.ctx.resolver().canonicalize(locator)?;
        let entry = self
            .resolve_entry(&identity, None, &DependencyStack::new())
            .await?;
        Ok((entry.sfc.generated_code.clone(), entry.sfc))
    }

    /// Completed, successful resolutions in the order they were claimed.
    pub fn cache_entries(&self) -> Vec<CacheEntry> {
        self.ctx.cache().entries()
    }

    async fn resolve_entry(
        &self,
        identity: &Identity,
        source: Option<Arc<str>>,
        stack: &DependencyStack,
    ) -> Result<CacheEntry> {
        let entry = self.claim(identity, source, stack)?;
        let result = entry.await;
        if let Some(waiter) = stack.last() {
            self.ctx.cache().release_wait(waiter, identity);
        }
        result
    }

    /// Claim `identity` in the cache, installing a fresh resolution if none
    /// exists. Nothing runs until the returned future is polled.
    pub(crate) fn claim(
        &self,
        identity: &Identity,
        source: Option<Arc<str>>,
        stack: &DependencyStack,
    ) -> Result<EntryFuture> {
        if stack.contains(identity) {
            return Err(TranspileError::CyclicDependency {
                chain: stack.chain_with(identity),
            });
        }

        let worker = self.clone();
        let id = identity.clone();
        let own_stack = stack.push(identity.clone());
        let claim = self.ctx.cache().claim(identity, stack, move || {
            async move {
                let result = worker.run_pipeline(&id, source, &own_stack).await;
                worker.ctx.cache().clear_waits(&id);
                if let Err(err) = &result {
                    tracing::debug!("resolution of {} failed: {}", id, err);
                }
                result
            }
            .boxed()
        })?;
        Ok(claim.into_future())
    }

    async fn run_pipeline(
        &self,
        identity: &Identity,
        source: Option<Arc<str>>,
        stack: &DependencyStack,
    ) -> Result<CacheEntry> {
        let ctx = self.context();
        let source = match source {
            Some(source) => source,
            None => Arc::from(ctx.load_content(identity).await?),
        };

        let sections = parse_sfc(&source, identity)?;
        if sections.scripts.is_empty() {
            return Err(TranspileError::parse(identity, "no <script> section"));
        }

        let (script, style, template) = futures::join!(
            resolve_dependencies(self, identity, &sections.scripts, stack),
            process_styles(ctx, identity, &sections.styles),
            process_templates(ctx, identity, &sections.templates),
        );
        let script = script?;
        let style = style?;
        let template = template?;

        let code = generate_module(&CodegenInput {
            identity,
            script: &script.text,
            lang: script.lang.as_deref(),
            template: &template,
            scope_id: style.scope_id.as_ref(),
            css: &style.css,
            options: ctx.options(),
        })?;
        let artifact_location = ctx.publisher().publish(&code)?;

        let sfc = Arc::new(SfcObject {
            identity: identity.clone(),
            name: identity.component_name(&ctx.options().sfc_extension),
            source,
            sections,
            scope_id: style.scope_id,
            merged_style: style.css,
            merged_template: template,
            merged_script: script.text,
            children: script.children,
            generated_code: Arc::from(code),
            artifact_location: artifact_location.clone(),
        });

        tracing::info!(
            "transpiled {} -> {} ({} dependencies)",
            identity,
            artifact_location,
            sfc.children.len()
        );

        Ok(CacheEntry {
            identity: identity.clone(),
            artifact_location,
            sfc,
        })
    }
}
