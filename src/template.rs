//! Template Preprocessor

use crate::context::TranspileContext;
use crate::error::Result;
use crate::sfc::{Identity, Section};

/// Concatenate every template section (external `src` first) and trim the
/// result. No templates gives an empty string.
pub async fn process_templates(
    ctx: &TranspileContext,
    identity: &Identity,
    sections: &[Section],
) -> Result<String> {
    let mut merged = String::new();
    for section in sections {
        merged.push_str(&ctx.section_text(identity, section).await?);
    }
    Ok(merged.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryContentLoader;
    use crate::parse::parse_sfc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_templates_are_concatenated_and_trimmed() {
        let loader = Arc::new(MemoryContentLoader::new());
        loader.insert("/app/row.html", "<tr></tr>");
        let ctx = TranspileContext::builder().loader(loader).build();
        let id = Identity::new("/app/A.vue");
        let sections = parse_sfc(
            "<template>\n  <p>a</p>\n</template><template src=\"./row.html\"></template>",
            &id,
        )
        .unwrap();

        let merged = process_templates(&ctx, &id, &sections.templates)
            .await
            .unwrap();
        assert_eq!(merged, "<p>a</p>\n<tr></tr>");
    }

    #[tokio::test]
    async fn test_no_templates_is_empty() {
        let ctx = TranspileContext::builder()
            .loader(Arc::new(MemoryContentLoader::new()))
            .build();
        let merged = process_templates(&ctx, &Identity::new("/a.vue"), &[])
            .await
            .unwrap();
        assert_eq!(merged, "");
    }
}
