//! Rule-level CSS parsing.
//!
//! Only the outer structure matters for scoping: which text is a selector,
//! which is a declaration body, and which at-rules group further rules.
//! Declaration bodies are kept verbatim.

use serde::{Deserialize, Serialize};

/// At-rules whose block holds ordinary style rules.
const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "container",
    "layer",
    "document",
    "-moz-document",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CssRule {
    /// `selector { body }`
    Style { selector: String, body: String },
    /// A grouping at-rule such as `@media (...) { rules }`.
    Group { prelude: String, rules: Vec<CssRule> },
    /// Any other at-rule, kept as written (`@import ...;`, `@keyframes ... {}`).
    AtRule(String),
}

impl CssRule {
    pub fn to_css(&self) -> String {
        match self {
            CssRule::Style { selector, body } => format!("{} {{{}}}", selector, body),
            CssRule::Group { prelude, rules } => format!(
                "{} {{\n{}\n}}",
                prelude,
                rules.iter().map(CssRule::to_css).collect::<Vec<_>>().join("\n")
            ),
            CssRule::AtRule(text) => text.clone(),
        }
    }
}

pub fn serialize_rules(rules: &[CssRule]) -> String {
    rules.iter().map(CssRule::to_css).collect::<Vec<_>>().join("\n")
}

pub trait RuleParser: Send + Sync {
    fn parse_rules(&self, css: &str) -> Result<Vec<CssRule>, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRuleParser;

impl RuleParser for SimpleRuleParser {
    fn parse_rules(&self, css: &str) -> Result<Vec<CssRule>, String> {
        parse_rule_list(css)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_rule_list(css: &str) -> Result<Vec<CssRule>, String> {
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut i = 0;

    loop {
        i = skip_trivia(css, i);
        if i >= bytes.len() {
            break;
        }

        if bytes[i] == b'}' {
            return Err(format!("unexpected '}}' at byte {}", i));
        }

        let stop = scan_until(css, i, &[b'{', b';'])
            .ok_or_else(|| format!("unterminated rule at byte {}", i))?;

        if bytes[i] == b'@' {
            if bytes[stop] == b';' {
                rules.push(CssRule::AtRule(css[i..=stop].trim().to_string()));
                i = stop + 1;
                continue;
            }
            let close = matching_brace(css, stop)
                .ok_or_else(|| format!("unterminated block at byte {}", stop))?;
            let prelude = css[i..stop].trim();
            if is_grouping_at_rule(prelude) {
                rules.push(CssRule::Group {
                    prelude: prelude.to_string(),
                    rules: parse_rule_list(&css[stop + 1..close])?,
                });
            } else {
                rules.push(CssRule::AtRule(css[i..=close].trim().to_string()));
            }
            i = close + 1;
            continue;
        }

        if bytes[stop] == b';' {
            return Err(format!("declaration outside of a rule at byte {}", i));
        }
        let close = matching_brace(css, stop)
            .ok_or_else(|| format!("unterminated block at byte {}", stop))?;
        rules.push(CssRule::Style {
            selector: css[i..stop].trim().to_string(),
            body: css[stop + 1..close].to_string(),
        });
        i = close + 1;
    }

    Ok(rules)
}

fn is_grouping_at_rule(prelude: &str) -> bool {
    let name = prelude[1..]
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    GROUPING_AT_RULES.contains(&name.as_str())
}

/// Skips whitespace and comments.
fn skip_trivia(css: &str, mut i: usize) -> usize {
    let bytes = css.as_bytes();
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
        } else if bytes[i..].starts_with(b"/*") {
            i = css[i + 2..].find("*/").map_or(bytes.len(), |rel| i + 2 + rel + 2);
        } else if bytes[i..].starts_with(b"<!--") {
            i += 4;
        } else if bytes[i..].starts_with(b"-->") {
            i += 3;
        } else {
            break;
        }
    }
    i
}

/// Index of the first byte in `stops` outside strings, comments, parentheses
/// and brackets.
pub(crate) fn scan_until(css: &str, from: usize, stops: &[u8]) -> Option<usize> {
    let bytes = css.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |rel| i + 2 + rel + 2);
            }
            b'\\' => i += 2,
            b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ if depth == 0 && stops.contains(&c) => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index of the `}` closing the block opened at `open`.
fn matching_brace(css: &str, open: usize) -> Option<usize> {
    let bytes = css.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |rel| i + 2 + rel + 2);
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Returns the index just past the string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}
