//! Code Generator
//!
//! Assembles the final module for a document. The default export of the
//! (already rewritten) script is rebound to a local constant, the merged
//! template and scope id are attached to it, style glue is appended when
//! there is CSS, and the constant is re-exported as the default export.
//!
//! The script text is spliced, never regenerated, so formatting and comments
//! survive unchanged.

use serde::Serialize;

use crate::error::{Result, TranspileError};
use crate::options::TranspileOptions;
use crate::publish::compute_hash;
use crate::scope::ScopeId;
use crate::script::analyze_script;
use crate::sfc::Identity;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct CodegenInput<'a> {
    pub identity: &'a Identity,
    pub script: &'a str,
    pub lang: Option<&'a str>,
    pub template: &'a str,
    pub scope_id: Option<&'a ScopeId>,
    pub css: &'a str,
    pub options: &'a TranspileOptions,
}

/// Local binding for a document's component: the prefix plus the first eight
/// hex digits of the identity's SHA-256.
pub fn binding_name(identity: &Identity, prefix: &str) -> String {
    format!("{}{}", prefix, &compute_hash(identity.as_str())[..8])
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate_module(input: &CodegenInput<'_>) -> Result<String> {
    let identity = input.identity;
    let binding = binding_name(identity, &input.options.binding_prefix);

    if input.script.contains(&binding) {
        return Err(TranspileError::generation(
            identity,
            format!("generated binding '{}' already appears in the script", binding),
        ));
    }

    let analysis = analyze_script(input.script, input.lang, identity)?;
    let export = match analysis.default_exports.as_slice() {
        [export] => *export,
        found => {
            return Err(TranspileError::generation(
                identity,
                format!("expected exactly one default export, found {}", found.len()),
            ))
        }
    };

    let script = input.script;
    let declaration = &script[export.declaration_start..export.statement_end];
    let terminator = if declaration.trim_end().ends_with(';') { "" } else { ";" };

    let mut code =
        String::with_capacity(script.len() + input.template.len() + input.css.len() + 512);
    code.push_str(&script[..export.statement_start]);
    code.push_str(&format!("const {} = {}{}", binding, declaration, terminator));
    code.push_str(&script[export.statement_end..]);
    code.push('\n');

    code.push_str(&format!(
        "{}.template = {};\n",
        binding,
        js_literal(identity, input.template)?
    ));
    if let Some(scope_id) = input.scope_id {
        code.push_str(&format!(
            "{}._scopeId = {};\n",
            binding,
            js_literal(identity, scope_id.as_str())?
        ));
    }
    if !input.css.trim().is_empty() {
        code.push_str(&style_glue(input, &binding)?);
    }
    code.push_str(&format!("export default {};\n", binding));

    Ok(code)
}

fn js_literal<T: Serialize + ?Sized>(identity: &Identity, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| TranspileError::generation(identity, e.to_string()))
}

/// Reference-counted style injection. The first live instance inserts the
/// stylesheet before its own create hook runs; the last one to be destroyed
/// removes it after its own destroy hook. Hooks defined by the component are
/// kept and called.
fn style_glue(input: &CodegenInput<'_>, binding: &str) -> Result<String> {
    let identity = input.identity;
    let record = format!("{}_style", binding);
    let css = js_literal(identity, input.css)?;
    let create_hook = js_literal(identity, &input.options.create_hook)?;
    let destroy_hook = js_literal(identity, &input.options.destroy_hook)?;

    Ok(format!(
        r#"const {record} = {{ css: {css}, el: null, refs: 0 }};
(function (component, style) {{
  const created = component[{create_hook}];
  component[{create_hook}] = function () {{
    if (style.refs++ === 0 && typeof document !== "undefined") {{
      style.el = document.createElement("style");
      style.el.textContent = style.css;
      document.head.appendChild(style.el);
    }}
    if (typeof created === "function") return created.apply(this, arguments);
  }};
  const destroyed = component[{destroy_hook}];
  component[{destroy_hook}] = function () {{
    const result = typeof destroyed === "function" ? destroyed.apply(this, arguments) : undefined;
    if (style.refs > 0 && --style.refs === 0 && style.el) {{
      style.el.remove();
      style.el = null;
    }}
    return result;
  }};
}})({binding}, {record});
"#,
        record = record,
        css = css,
        create_hook = create_hook,
        destroy_hook = destroy_hook,
        binding = binding,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeAllocator;

    fn generate(
        script: &str,
        template: &str,
        scope: Option<&ScopeId>,
        css: &str,
    ) -> Result<String> {
        let options = TranspileOptions::default();
        let identity = Identity::new("/app/A.vue");
        generate_module(&CodegenInput {
            identity: &identity,
            script,
            lang: None,
            template,
            scope_id: scope,
            css,
            options: &options,
        })
    }

    #[test]
    fn test_binding_name_is_stable_and_prefixed() {
        let id = Identity::new("/app/A.vue");
        let name = binding_name(&id, "__sfc_");
        assert_eq!(name.len(), "__sfc_".len() + 8);
        assert!(name.starts_with("__sfc_"));
        assert_eq!(name, binding_name(&id, "__sfc_"));
        assert_ne!(name, binding_name(&Identity::new("/app/B.vue"), "__sfc_"));
    }

    #[test]
    fn test_template_only_module() {
        let code = generate("export default {}", "hi", None, "").unwrap();
        let binding = binding_name(&Identity::new("/app/A.vue"), "__sfc_");
        assert!(code.starts_with(&format!("const {} = {{}};", binding)));
        assert!(code.contains(&format!("{}.template = \"hi\";", binding)));
        assert!(!code.contains("_scopeId"));
        assert!(!code.contains("createElement"));
        assert!(code.trim_end().ends_with(&format!("export default {};", binding)));
    }

    #[test]
    fn test_surrounding_script_is_preserved() {
        let script = "import x from './x.js';\n// keep me\nexport default { data() { return { x } } };\nconst after = 1;";
        let code = generate(script, "", None, "").unwrap();
        assert!(code.starts_with("import x from './x.js';\n// keep me\nconst __sfc_"));
        assert!(code.contains("{ data() { return { x } } };\nconst after = 1;"));
        assert!(!code.contains("export default {"));
    }

    #[test]
    fn test_template_is_json_escaped() {
        let code = generate("export default {}", "<p title=\"a\">\n`${x}`</p>", None, "").unwrap();
        assert!(code.contains(r#".template = "<p title=\"a\">\n`${x}`</p>";"#));
    }

    #[test]
    fn test_scope_id_and_style_glue() {
        let scope = ScopeAllocator::new("data-v-").allocate();
        let css = format!(".a{} {{ color: red }}", scope.selector_suffix());
        let code = generate(
            "export default { created() { this.ready = true } }",
            "",
            Some(&scope),
            &css,
        )
        .unwrap();
        assert!(code.contains(&format!("._scopeId = \"{}\";", scope)));
        assert!(code.contains("component[\"created\"]"));
        assert!(code.contains("component[\"destroyed\"]"));
        assert!(code.contains("refs: 0"));
        assert!(code.contains(&serde_json::to_string(&css).unwrap()));
    }

    #[test]
    fn test_default_export_count_must_be_one() {
        let none = generate("const a = 1;", "", None, "").unwrap_err();
        assert_eq!(none.code(), crate::error::ERR_CODEGEN);

        let two = generate("export default {};\nexport default {};", "", None, "").unwrap_err();
        assert_eq!(two.code(), crate::error::ERR_CODEGEN);
        assert!(two.to_string().contains("found 2"));
    }

    #[test]
    fn test_binding_collision_is_rejected() {
        let binding = binding_name(&Identity::new("/app/A.vue"), "__sfc_");
        let script = format!("const {} = 1;\nexport default {{}}", binding);
        let err = generate(&script, "", None, "").unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_CODEGEN);
    }
}
