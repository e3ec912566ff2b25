//! Prompt templating for note extraction.

/// Placeholder used when a hint list is empty.
const NONE_PLACEHOLDER: &str = "(none)";

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE_PLACEHOLDER.to_string()
    } else {
        items.join(", ")
    }
}

/// Render the extraction prompt for a note.
///
/// Tags and projects keep the caller's order.
#[must_use]
pub fn extraction_prompt(
    existing_tags: &[String],
    existing_projects: &[String],
    note_content: &str,
) -> String {
    let tags = join_or_none(existing_tags);
    let projects = join_or_none(existing_projects);

    format!(
        r#"Extract 3-7 key insights from this note as separate cards.

Requirements:
- Each card: 50-200 words
- Self-contained and understandable alone
- Preserve important details, quotes, data
- Keep markdown formatting
- Suggest relevant tags from existing list when applicable, otherwise suggest new tags.
- Tag names will be in the format: "tag-name" (lowercase; no spaces; use dashes to separate words).
- Suggest a relevant project from existing list when applicable

Existing tags: {tags}
Existing projects: {projects}

Note content:
{note_content}

Return JSON:
{{
  "cards": [
    {{
      "content": "card content in markdown",
      "suggested_tags": ["tag1", "tag2"],
      "suggested_project": "project name or null"
    }}
  ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hints_render_placeholder() {
        let prompt = extraction_prompt(&[], &[], "body");
        assert!(prompt.contains("Existing tags: (none)"));
        assert!(prompt.contains("Existing projects: (none)"));
        assert!(prompt.contains("Note content:\nbody\n"));
    }

    #[test]
    fn test_hints_keep_order() {
        let tags = vec!["rust".to_string(), "async".to_string()];
        let projects = vec!["Book".to_string()];
        let prompt = extraction_prompt(&tags, &projects, "n");
        assert!(prompt.contains("Existing tags: rust, async"));
        assert!(prompt.contains("Existing projects: Book"));
    }

    #[test]
    fn test_literal_braces_survive() {
        let prompt = extraction_prompt(&[], &[], "n");
        assert!(prompt.contains("\"cards\": ["));
        assert!(prompt.ends_with('}'));
    }
}
