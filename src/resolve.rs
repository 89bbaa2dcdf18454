//! Dependency Resolver
//!
//! Finds the SFC imports of a document's script, transpiles every one of
//! them through the shared cache, and rewrites each import specifier to the
//! child's artifact location. Non-SFC imports are left alone.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;

use crate::cache::CacheEntry;
use crate::error::{Result, TranspileError};
use crate::script::{analyze_script, escape_js_string, ModuleReference};
use crate::sfc::{DependencyStack, Identity, Section};
use crate::transpile::Transpiler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedScript {
    /// Script text with SFC specifiers rewritten.
    pub text: String,
    /// Language hint of the script section used.
    pub lang: Option<String>,
    /// Direct SFC dependencies, first occurrence order, no duplicates.
    pub children: Vec<Identity>,
}

/// Resolve the SFC dependencies of `identity`.
///
/// `stack` is the chain ending with `identity` itself. Only the last script
/// section is used. All children are claimed before any is awaited, and all
/// of them are driven to completion even when one fails; the first failure
/// in import order is reported.
pub async fn resolve_dependencies(
    transpiler: &Transpiler,
    identity: &Identity,
    scripts: &[Section],
    stack: &DependencyStack,
) -> Result<ResolvedScript> {
    let ctx = transpiler.context();
    let Some(section) = scripts.last() else {
        return Err(TranspileError::parse(identity, "no <script> section"));
    };
    if scripts.len() > 1 {
        tracing::debug!(
            "{} has {} script sections, using the last one",
            identity,
            scripts.len()
        );
    }

    let text = ctx.section_text(identity, section).await?;
    let lang = section.attributes.lang.clone();
    let analysis = analyze_script(&text, lang.as_deref(), identity)?;

    let imports = analysis
        .references
        .into_iter()
        .filter(|r| ctx.options().is_sfc_path(&r.specifier))
        .map(|r| -> Result<(Identity, ModuleReference)> {
            Ok((ctx.resolver().resolve(&r.specifier, identity)?, r))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut children: Vec<Identity> = Vec::new();
    for (child, _) in &imports {
        if stack.contains(child) {
            return Err(TranspileError::CyclicDependency {
                chain: stack.chain_with(child),
            });
        }
        if !children.contains(child) {
            children.push(child.clone());
        }
    }

    let pending: Vec<BoxFuture<'static, Result<CacheEntry>>> = children
        .iter()
        .map(|child| match transpiler.claim(child, None, stack) {
            Ok(entry) => entry.boxed(),
            Err(err) => future::ready(Err(err)).boxed(),
        })
        .collect();
    let results = future::join_all(pending).await;
    for child in &children {
        ctx.cache().release_wait(identity, child);
    }

    let mut locations = HashMap::with_capacity(children.len());
    for (child, result) in children.iter().zip(results) {
        match result {
            Ok(entry) => {
                locations.insert(child.clone(), entry.artifact_location);
            }
            Err(err @ TranspileError::CyclicDependency { .. }) => return Err(err),
            Err(err) => {
                return Err(TranspileError::Dependency {
                    parent: identity.clone(),
                    dependency: child.clone(),
                    source: Box::new(err),
                })
            }
        }
    }

    let mut replacements: Vec<(usize, usize, String)> = imports
        .iter()
        .filter_map(|(child, r)| {
            let location = locations.get(child)?;
            Some((r.start, r.end, escape_js_string(location.as_str(), r.quote)))
        })
        .collect();
    replacements.sort_by(|a, b| b.0.cmp(&a.0));

    let mut rewritten = text;
    for (start, end, replacement) in replacements {
        rewritten.replace_range(start..end, &replacement);
    }

    Ok(ResolvedScript {
        text: rewritten,
        lang,
        children,
    })
}
