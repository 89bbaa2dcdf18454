//! Style Preprocessor
//!
//! Merges a document's style sections into one stylesheet. Non-scoped
//! sections are appended as written. Scoped sections share a single scope id,
//! allocated the first time one is seen, and every selector in them gets the
//! id's attribute suffix, including selectors nested in `@media` and other
//! grouping rules. A selector ending in a pseudo-element (`::after`,
//! `:before`, ...) gets the suffix in front of the pseudo-element, so
//! `.c::after` becomes `.c[data-v-xxxxxxxx]::after`; every other selector
//! ends with the suffix.

use crate::context::TranspileContext;
use crate::css::{scan_until, serialize_rules, CssRule};
use crate::error::{Result, TranspileError};
use crate::scope::ScopeId;
use crate::sfc::{Identity, Section};

/// Pseudo-elements that may be written with a single colon.
const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["before", "after", "first-line", "first-letter"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOutput {
    pub scope_id: Option<ScopeId>,
    pub css: String,
}

pub async fn process_styles(
    ctx: &TranspileContext,
    identity: &Identity,
    sections: &[Section],
) -> Result<StyleOutput> {
    let mut scope_id: Option<ScopeId> = None;
    let mut chunks = Vec::with_capacity(sections.len());

    for section in sections {
        let text = ctx.section_text(identity, section).await?;

        if !section.attributes.scoped {
            chunks.push(text);
            continue;
        }

        let scope = scope_id
            .get_or_insert_with(|| ctx.scopes().allocate())
            .clone();
        let rules = ctx.rule_parser().parse_rules(&text).map_err(|e| {
            TranspileError::parse(
                identity,
                format!("style section at byte {}: {}", section.offset, e),
            )
        })?;
        chunks.push(serialize_rules(&scope_rules(rules, &scope)));
    }

    if let Some(scope) = &scope_id {
        tracing::debug!("{} scoped with {}", identity, scope);
    }

    Ok(StyleOutput {
        scope_id,
        css: chunks.join("\n"),
    })
}

pub fn scope_rules(rules: Vec<CssRule>, scope: &ScopeId) -> Vec<CssRule> {
    rules
        .into_iter()
        .map(|rule| match rule {
            CssRule::Style { selector, body } => CssRule::Style {
                selector: scope_selector_list(&selector, scope),
                body,
            },
            CssRule::Group { prelude, rules } => CssRule::Group {
                prelude,
                rules: scope_rules(rules, scope),
            },
            other => other,
        })
        .collect()
}

/// Append the scope suffix to every selector of a comma-separated list.
pub fn scope_selector_list(selector: &str, scope: &ScopeId) -> String {
    let suffix = scope.selector_suffix();
    split_selector_list(selector)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| scope_selector(s, &suffix))
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_selector_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(comma) = scan_until(selector, start, b",") {
        parts.push(&selector[start..comma]);
        start = comma + 1;
    }
    parts.push(&selector[start..]);
    parts
}

/// The suffix goes on the last compound selector, before a trailing
/// pseudo-element.
fn scope_selector(selector: &str, suffix: &str) -> String {
    let at = pseudo_element_start(selector).unwrap_or(selector.len());
    format!("{}{}{}", &selector[..at], suffix, &selector[at..])
}

fn pseudo_element_start(selector: &str) -> Option<usize> {
    let bytes = selector.as_bytes();
    let mut from = 0;
    while let Some(colon) = scan_until(selector, from, b":") {
        if bytes.get(colon + 1) == Some(&b':') {
            return Some(colon);
        }
        let rest = selector[colon + 1..].to_ascii_lowercase();
        let legacy = LEGACY_PSEUDO_ELEMENTS.iter().any(|name| {
            rest.strip_prefix(name).map_or(false, |tail| {
                !tail.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
        });
        if legacy {
            return Some(colon);
        }
        from = colon + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryContentLoader;
    use crate::parse::parse_sfc;
    use crate::scope::ScopeAllocator;
    use std::sync::Arc;

    fn scope() -> ScopeId {
        ScopeAllocator::new("data-v-").allocate()
    }

    fn ctx() -> TranspileContext {
        TranspileContext::builder()
            .loader(Arc::new(MemoryContentLoader::new()))
            .scope_allocator(Arc::new(ScopeAllocator::new("data-v-")))
            .build()
    }

    #[test]
    fn test_selector_list_gets_suffix_per_selector() {
        let scope = scope();
        let suffix = scope.selector_suffix();
        assert_eq!(
            scope_selector_list(".a, .b > p ,li", &scope),
            format!(".a{s}, .b > p{s}, li{s}", s = suffix)
        );
    }

    #[test]
    fn test_suffix_goes_before_pseudo_elements() {
        let scope = scope();
        let s = scope.selector_suffix();
        assert_eq!(
            scope_selector_list("a:hover::before", &scope),
            format!("a:hover{}::before", s)
        );
        assert_eq!(scope_selector_list("p:after", &scope), format!("p{}:after", s));
        assert_eq!(
            scope_selector_list("p:first-letter", &scope),
            format!("p{}:first-letter", s)
        );
        assert_eq!(scope_selector_list("p:focus", &scope), format!("p:focus{}", s));
        assert_eq!(
            scope_selector_list("p:not(.x, .y)", &scope),
            format!("p:not(.x, .y){}", s)
        );
    }

    #[tokio::test]
    async fn test_unscoped_styles_are_concatenated_raw() {
        let src = "<style>.a { x: 1 }</style><style>\n.b{y:2}\n</style><script>export default {}</script>";
        let id = Identity::new("/app/A.vue");
        let sections = parse_sfc(src, &id).unwrap();
        let out = process_styles(&ctx(), &id, &sections.styles).await.unwrap();
        assert!(out.scope_id.is_none());
        assert_eq!(out.css, ".a { x: 1 }\n\n.b{y:2}\n");
    }

    #[tokio::test]
    async fn test_scoped_sections_share_one_scope_id() {
        let src = r#"
<style scoped>.a { x: 1 } @media print { .b { y: 2 } }</style>
<style>.plain { z: 3 }</style>
<style scoped>.c::after { w: 4 }</style>
<script>export default {}</script>"#;
        let id = Identity::new("/app/A.vue");
        let sections = parse_sfc(src, &id).unwrap();
        let out = process_styles(&ctx(), &id, &sections.styles).await.unwrap();
        let scope = out.scope_id.expect("scoped style allocates an id");
        let s = scope.selector_suffix();

        assert!(out.css.contains(&format!(".a{} {{ x: 1 }}", s)));
        assert!(out.css.contains(&format!("@media print {{\n.b{} {{ y: 2 }}\n}}", s)));
        assert!(out.css.contains(".plain { z: 3 }"));
        assert!(!out.css.contains(&format!(".plain{}", s)));
        assert!(out.css.contains(&format!(".c{}::after", s)));
    }

    #[tokio::test]
    async fn test_unparseable_scoped_style_is_parse_error() {
        let src = "<style scoped>.a { x: 1</style><script>export default {}</script>";
        let id = Identity::new("/app/A.vue");
        let sections = parse_sfc(src, &id).unwrap();
        let err = process_styles(&ctx(), &id, &sections.styles)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_PARSE);
    }
}
