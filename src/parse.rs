//! Section Parser
//!
//! Splits raw SFC source into its top-level `<style>`, `<script>` and
//! `<template>` sections, in document order. Section bodies are sliced out of
//! the source byte for byte: style and script bodies are raw text up to the
//! matching close tag, template bodies may contain nested `<template>`
//! elements (slots) and are matched by depth.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::error::{Result, TranspileError};
use crate::sfc::{Identity, Section, SectionAttributes, SectionKind, SfcSections};

lazy_static! {
    /// Opening tag of a section, or the start of a top-level comment.
    static ref SECTION_OPEN_RE: Regex =
        Regex::new(r"(?i)<!--|<(style|script|template)\b([^>]*)>").unwrap();

    /// Attribute regex for parsing section attributes
    static ref ATTR_REGEX: Regex = Regex::new(
        r#"(?i)([a-z_:@#.\[\]][a-z0-9_:@#.\[\]-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#
    )
    .unwrap();

    static ref STYLE_CLOSE_RE: Regex = Regex::new(r"(?i)</style\s*>").unwrap();
    static ref SCRIPT_CLOSE_RE: Regex = Regex::new(r"(?i)</script\s*>").unwrap();

    /// Any template open or close tag, or the start of a comment, for depth matching.
    static ref TEMPLATE_TAG_RE: Regex =
        Regex::new(r"(?i)<!--|<(/?)template\b([^>]*)>").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse SFC source into its section lists.
///
/// Missing style or template sections are fine. A missing script section is
/// reported later by the orchestrator; an unterminated section fails here.
pub fn parse_sfc(source: &str, identity: &Identity) -> Result<SfcSections> {
    let mut sections = SfcSections::default();
    let mut pos = 0;

    while let Some(caps) = SECTION_OPEN_RE.captures_at(source, pos) {
        let Some(open) = caps.get(0) else { break };

        let Some(tag) = caps.get(1) else {
            // Top-level comment: skip it whole, an unclosed one swallows the rest.
            match source[open.end()..].find("-->") {
                Some(rel) => {
                    pos = open.end() + rel + 3;
                    continue;
                }
                None => break,
            }
        };

        let Some(kind) = SectionKind::from_tag(tag.as_str()) else {
            pos = open.end();
            continue;
        };

        let attr_text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let self_closing = attr_text.trim_end().ends_with('/');
        let attributes =
            SectionAttributes::from_raw(parse_attributes(attr_text.trim_end_matches('/')));

        let (content, end) = if self_closing {
            (String::new(), open.end())
        } else {
            let (close_start, close_end) = find_section_close(source, open.end(), kind)
                .ok_or_else(|| {
                    TranspileError::parse(
                        identity,
                        format!(
                            "unterminated <{}> section at byte {}",
                            kind.tag_name(),
                            open.start()
                        ),
                    )
                })?;
            (source[open.end()..close_start].to_string(), close_end)
        };

        sections.push(Section {
            kind,
            content,
            attributes,
            outer: source[open.start()..end].to_string(),
            offset: open.start(),
        });
        pos = end;
    }

    tracing::debug!(
        "parsed {}: {} style, {} script, {} template section(s)",
        identity,
        sections.styles.len(),
        sections.scripts.len(),
        sections.templates.len()
    );

    Ok(sections)
}

/// Parse the attribute text of an opening tag.
///
/// Names are lower-cased; valueless attributes map to `"true"`.
pub fn parse_attributes(attr_text: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    for attr_caps in ATTR_REGEX.captures_iter(attr_text) {
        if let Some(name) = attr_caps.get(1) {
            let value = attr_caps
                .get(2)
                .or_else(|| attr_caps.get(3))
                .or_else(|| attr_caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "true".to_string());
            attributes.insert(name.as_str().to_ascii_lowercase(), value);
        }
    }
    attributes
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOSE TAG MATCHING
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns `(close_start, close_end)` byte offsets of the matching close tag.
fn find_section_close(source: &str, from: usize, kind: SectionKind) -> Option<(usize, usize)> {
    match kind {
        SectionKind::Style => STYLE_CLOSE_RE
            .find_at(source, from)
            .map(|m| (m.start(), m.end())),
        SectionKind::Script => SCRIPT_CLOSE_RE
            .find_at(source, from)
            .map(|m| (m.start(), m.end())),
        SectionKind::Template => find_template_close(source, from),
    }
}

fn find_template_close(source: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(caps) = TEMPLATE_TAG_RE.captures_at(source, pos) {
        let m = caps.get(0)?;
        let Some(slash) = caps.get(1) else {
            // Comments inside the body hide any tags they contain.
            pos = m.end() + source[m.end()..].find("-->")? + 3;
            continue;
        };
        pos = m.end();
        if !slash.as_str().is_empty() {
            depth -= 1;
            if depth == 0 {
                return Some((m.start(), m.end()));
            }
        } else {
            let attrs = caps.get(2).map_or("", |a| a.as_str());
            if !attrs.trim_end().ends_with('/') {
                depth += 1;
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Identity {
        Identity::new("/app/Test.vue")
    }

    #[test]
    fn test_sections_in_document_order() {
        let src = r#"
<template><div class="a">hi</div></template>
<script>export default { name: 'a' }</script>
<style scoped>.a { color: red; }</style>
<style>.b { color: blue; }</style>
"#;
        let sections = parse_sfc(src, &id()).unwrap();
        assert_eq!(sections.templates.len(), 1);
        assert_eq!(sections.scripts.len(), 1);
        assert_eq!(sections.styles.len(), 2);
        assert_eq!(sections.templates[0].content, r#"<div class="a">hi</div>"#);
        assert_eq!(sections.scripts[0].content, "export default { name: 'a' }");
        assert!(sections.styles[0].attributes.scoped);
        assert!(!sections.styles[1].attributes.scoped);
        assert!(sections.has_scoped_style());
        assert!(sections.styles[0].outer.starts_with("<style scoped>"));
        assert!(sections.styles[0].outer.ends_with("</style>"));
    }

    #[test]
    fn test_nested_templates_are_kept_whole() {
        let src = "<template><List><template v-slot:item>x</template></List></template><script>export default {}</script>";
        let sections = parse_sfc(src, &id()).unwrap();
        assert_eq!(sections.templates.len(), 1);
        assert_eq!(
            sections.templates[0].content,
            "<List><template v-slot:item>x</template></List>"
        );
    }

    #[test]
    fn test_template_tags_inside_comments_are_ignored() {
        let src = "<template><div><!-- <template> legacy --></div></template><script>export default {}</script>";
        let sections = parse_sfc(src, &id()).unwrap();
        assert_eq!(
            sections.templates[0].content,
            "<div><!-- <template> legacy --></div>"
        );
        assert_eq!(sections.scripts.len(), 1);

        let closing = "<template>a<!-- </template> --></template><script>export default {}</script>";
        let sections = parse_sfc(closing, &id()).unwrap();
        assert_eq!(sections.templates[0].content, "a<!-- </template> -->");
    }

    #[test]
    fn test_script_body_is_raw_text() {
        let src = "<script>const t = '<template>nope</template>'; export default {}</script>";
        let sections = parse_sfc(src, &id()).unwrap();
        assert!(sections.templates.is_empty());
        assert!(sections.scripts[0].content.contains("<template>nope</template>"));
    }

    #[test]
    fn test_attributes_and_self_closing_sections() {
        let src = r#"<style src="./theme.css" scoped /><script lang="ts" src='./impl.ts'></script>"#;
        let sections = parse_sfc(src, &id()).unwrap();
        let style = &sections.styles[0];
        assert_eq!(style.content, "");
        assert_eq!(style.attributes.src.as_deref(), Some("./theme.css"));
        assert!(style.attributes.scoped);
        let script = &sections.scripts[0];
        assert_eq!(script.attributes.lang.as_deref(), Some("ts"));
        assert_eq!(script.attributes.src.as_deref(), Some("./impl.ts"));
    }

    #[test]
    fn test_commented_out_sections_are_skipped() {
        let src = "<!-- <style>.x{}</style> --><script>export default {}</script>";
        let sections = parse_sfc(src, &id()).unwrap();
        assert!(sections.styles.is_empty());
        assert_eq!(sections.scripts.len(), 1);
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let sections = parse_sfc("<template>only</template>", &id()).unwrap();
        assert!(sections.scripts.is_empty());
        assert!(sections.styles.is_empty());
        assert_eq!(sections.templates.len(), 1);
    }

    #[test]
    fn test_unterminated_section_is_parse_error() {
        let err = parse_sfc("<script>export default {}", &id()).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_PARSE);
        assert!(err.to_string().contains("unterminated <script>"));
    }

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes(r#" setup lang="ts" data-x='1' v=2"#);
        assert_eq!(attrs.get("setup").map(String::as_str), Some("true"));
        assert_eq!(attrs.get("lang").map(String::as_str), Some("ts"));
        assert_eq!(attrs.get("data-x").map(String::as_str), Some("1"));
        assert_eq!(attrs.get("v").map(String::as_str), Some("2"));
    }
}
