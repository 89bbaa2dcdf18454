//! Script analysis.
//!
//! Parses a script section with oxc and reports the two things the
//! transpiler rewrites: module specifiers of static imports/re-exports and
//! the default-export statement. Only top-level statements are inspected;
//! everything is reported as byte spans into the original text so callers
//! can splice the source instead of regenerating it.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Statement, StringLiteral};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::error::{Result, TranspileError};
use crate::sfc::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Import,
    ReExport,
    ExportAll,
}

/// A module specifier string in the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub kind: ReferenceKind,
    /// Specifier value with escapes resolved.
    pub specifier: String,
    /// Byte range of the literal's contents, quotes excluded.
    pub start: usize,
    pub end: usize,
    pub quote: char,
}

/// Byte ranges of an `export default <declaration>` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultExport {
    pub statement_start: usize,
    pub declaration_start: usize,
    pub statement_end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAnalysis {
    pub references: Vec<ModuleReference>,
    pub default_exports: Vec<DefaultExport>,
}

fn source_type_for(lang: Option<&str>) -> SourceType {
    let lang = lang.unwrap_or("js").to_ascii_lowercase();
    SourceType::default()
        .with_module(true)
        .with_typescript(matches!(lang.as_str(), "ts" | "tsx"))
        .with_jsx(matches!(lang.as_str(), "jsx" | "tsx"))
}

pub fn analyze_script(
    text: &str,
    lang: Option<&str>,
    identity: &Identity,
) -> Result<ScriptAnalysis> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, source_type_for(lang)).parse();

    let syntax_error = || {
        let detail = ret
            .errors
            .first()
            .map(|e| format!("{:?}", e))
            .unwrap_or_else(|| "unrecoverable syntax error".to_string());
        TranspileError::parse(identity, format!("script: {}", detail))
    };
    if ret.panicked {
        return Err(syntax_error());
    }

    let mut analysis = ScriptAnalysis::default();
    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                analysis
                    .references
                    .push(reference(text, &decl.source, ReferenceKind::Import));
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    analysis
                        .references
                        .push(reference(text, source, ReferenceKind::ReExport));
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                analysis
                    .references
                    .push(reference(text, &decl.source, ReferenceKind::ExportAll));
            }
            Statement::ExportDefaultDeclaration(decl) => {
                analysis.default_exports.push(DefaultExport {
                    statement_start: decl.span.start as usize,
                    declaration_start: decl.declaration.span().start as usize,
                    statement_end: decl.span.end as usize,
                });
            }
            _ => {}
        }
    }

    // Duplicate default exports are reported by the parser as well; leave
    // those to the code generator, which owns that rule.
    if !ret.errors.is_empty() && analysis.default_exports.len() < 2 {
        return Err(syntax_error());
    }

    Ok(analysis)
}

fn reference(text: &str, literal: &StringLiteral, kind: ReferenceKind) -> ModuleReference {
    let start = literal.span.start as usize;
    let end = literal.span.end as usize;
    ModuleReference {
        kind,
        specifier: literal.value.to_string(),
        start: start + 1,
        end: end.saturating_sub(1).max(start + 1),
        quote: text[start..].chars().next().unwrap_or('"'),
    }
}

/// Escape `value` for use between `quote` characters in a JS string literal.
pub fn escape_js_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Identity {
        Identity::new("/app/A.vue")
    }

    #[test]
    fn test_references_report_inner_spans() {
        let text = "import B from './B.vue';\nexport { x } from \"./x.js\";\nexport * from './all.vue';\nexport default {}";
        let analysis = analyze_script(text, None, &id()).unwrap();
        let specs: Vec<_> = analysis
            .references
            .iter()
            .map(|r| (r.kind, r.specifier.as_str(), &text[r.start..r.end], r.quote))
            .collect();
        assert_eq!(
            specs,
            vec![
                (ReferenceKind::Import, "./B.vue", "./B.vue", '\''),
                (ReferenceKind::ReExport, "./x.js", "./x.js", '"'),
                (ReferenceKind::ExportAll, "./all.vue", "./all.vue", '\''),
            ]
        );
    }

    #[test]
    fn test_default_export_spans() {
        let text = "const a = 1;\nexport default { a };\n";
        let analysis = analyze_script(text, None, &id()).unwrap();
        assert_eq!(analysis.default_exports.len(), 1);
        let export = analysis.default_exports[0];
        assert_eq!(&text[export.statement_start..export.declaration_start], "export default ");
        assert!(text[export.declaration_start..export.statement_end].starts_with("{ a }"));
    }

    #[test]
    fn test_dynamic_imports_and_strings_are_ignored() {
        let text = "const s = \"import X from './X.vue'\";\nconst p = import('./Lazy.vue');\nexport default {}";
        let analysis = analyze_script(text, None, &id()).unwrap();
        assert!(analysis.references.is_empty());
    }

    #[test]
    fn test_typescript_lang() {
        let text = "import type { T } from './types';\nconst n: number = 1;\nexport default { n }";
        let analysis = analyze_script(text, Some("ts"), &id()).unwrap();
        assert_eq!(analysis.references.len(), 1);
        assert_eq!(analysis.default_exports.len(), 1);
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = analyze_script("export default {", None, &id()).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_PARSE);
    }

    #[test]
    fn test_escape_js_string() {
        assert_eq!(escape_js_string("a'b\\c", '\''), "a\\'b\\\\c");
        assert_eq!(escape_js_string("a'b", '"'), "a'b");
    }
}
