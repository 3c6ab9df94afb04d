//! LLM prompt construction for field extraction

use scout_domain::RawSearchResult;

/// Builds prompts asking the model for a JSON object of named fields
pub struct PromptBuilder<'a> {
    instruction: String,
    fields: &'a [String],
    search: Option<&'a RawSearchResult>,
    max_context_chars: usize,
    max_items: usize,
    include_raw_fallback: bool,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    ///
    /// `instruction` is the already-rendered prompt template.
    pub fn new(instruction: String, fields: &'a [String]) -> Self {
        Self {
            instruction,
            fields,
            search: None,
            max_context_chars: usize::MAX,
            max_items: usize::MAX,
            include_raw_fallback: false,
        }
    }

    /// Add the search content the answer must come from
    pub fn with_search_result(mut self, search: &'a RawSearchResult) -> Self {
        self.search = Some(search);
        self
    }

    /// Bound the search content by characters and number of hits
    pub fn with_limits(mut self, max_context_chars: usize, max_items: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self.max_items = max_items;
        self
    }

    /// Fall back to the raw provider payload when there are no normalized hits
    pub fn with_raw_fallback(mut self, enabled: bool) -> Self {
        self.include_raw_fallback = enabled;
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(self.instruction.trim());
        prompt.push_str("\n\n");

        prompt.push_str("Search results:\n");
        prompt.push_str("---\n");
        prompt.push_str(&self.render_context());
        prompt.push_str("---\n\n");

        prompt.push_str("Fields to extract: ");
        prompt.push_str(&self.fields.join(", "));
        prompt.push_str("\n\n");

        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }

    /// Search hits in ranking order, truncated to the character budget
    fn render_context(&self) -> String {
        let Some(search) = self.search else {
            return "(no search results)\n".to_string();
        };

        if search.items.is_empty() {
            if self.include_raw_fallback && !search.raw.is_null() {
                let raw = search.raw.to_string();
                let mut out = truncate_chars(&raw, self.max_context_chars).to_string();
                out.push('\n');
                return out;
            }
            return "(no search results)\n".to_string();
        }

        let mut out = String::new();
        let mut remaining = self.max_context_chars;

        for (idx, item) in search.items.iter().take(self.max_items).enumerate() {
            let block = format!(
                "[{}] {}\nURL: {}\n{}\n\n",
                idx + 1,
                item.title,
                item.url,
                item.snippet
            );
            let len = block.chars().count();
            if len <= remaining {
                out.push_str(&block);
                remaining -= len;
            } else {
                out.push_str(truncate_chars(&block, remaining));
                out.push('\n');
                break;
            }
        }

        out
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

const OUTPUT_FORMAT_REMINDER: &str = r#"Answer using only the search results above.
Output format (a single JSON object, no additional text):
{
  "<field>": "value found in the search results, or null if absent"
}

Use exactly the field names listed above as keys. Use null for any field the
search results do not contain. Do not guess.

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

#[cfg(test)]
mod tests {
    use super::*;
    use scout_domain::SearchItem;

    fn fields() -> Vec<String> {
        vec!["email".to_string(), "phone".to_string()]
    }

    fn item(n: usize, snippet: &str) -> SearchItem {
        SearchItem {
            title: format!("Title {}", n),
            url: format!("https://example.test/{}", n),
            snippet: snippet.to_string(),
        }
    }

    #[test]
    fn test_prompt_includes_instruction_and_fields() {
        let fields = fields();
        let prompt = PromptBuilder::new("Find contact details for Acme.".to_string(), &fields).build();

        assert!(prompt.starts_with("Find contact details for Acme."));
        assert!(prompt.contains("Fields to extract: email, phone"));
        assert!(prompt.contains("(no search results)"));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }

    #[test]
    fn test_prompt_includes_search_items_in_order() {
        let fields = fields();
        let search = RawSearchResult::new(
            "Acme contact email",
            vec![item(1, "Email us at info@acme.test"), item(2, "Call 555-0100")],
        );

        let prompt = PromptBuilder::new("Extract.".to_string(), &fields)
            .with_search_result(&search)
            .build();

        let first = prompt.find("info@acme.test").unwrap();
        let second = prompt.find("555-0100").unwrap();
        assert!(first < second);
        assert!(prompt.contains("[1] Title 1"));
        assert!(prompt.contains("URL: https://example.test/2"));
    }

    #[test]
    fn test_context_is_truncated() {
        let fields = fields();
        let search = RawSearchResult::new(
            "q",
            vec![item(1, &"a".repeat(100)), item(2, "SECOND ITEM")],
        );

        let builder = PromptBuilder::new("Extract.".to_string(), &fields)
            .with_search_result(&search)
            .with_limits(60, 10);
        let context = builder.render_context();

        assert!(context.chars().count() <= 61);
        assert!(!context.contains("SECOND ITEM"));
    }

    #[test]
    fn test_max_items_limits_hits() {
        let fields = fields();
        let items = (1..=5).map(|n| item(n, "snippet")).collect();
        let search = RawSearchResult::new("q", items);

        let prompt = PromptBuilder::new("Extract.".to_string(), &fields)
            .with_search_result(&search)
            .with_limits(10_000, 2)
            .build();

        assert!(prompt.contains("[2] Title 2"));
        assert!(!prompt.contains("[3] Title 3"));
    }

    #[test]
    fn test_raw_fallback() {
        let fields = fields();
        let search = RawSearchResult::new("q", Vec::new())
            .with_raw(serde_json::json!({"answer_box": {"email": "hi@acme.test"}}));

        let without = PromptBuilder::new("Extract.".to_string(), &fields)
            .with_search_result(&search)
            .build();
        assert!(!without.contains("hi@acme.test"));

        let with = PromptBuilder::new("Extract.".to_string(), &fields)
            .with_search_result(&search)
            .with_raw_fallback(true)
            .build();
        assert!(with.contains("hi@acme.test"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
