//! Prompt template for the RAG flow
//!
//! Templates use `{{question}}` and `{{context}}` placeholders. Both must be
//! present; a template missing either is rejected when it is built.

use ragline_core::{RagError, RagResult, SearchHit};

/// Placeholder replaced by the user's question
pub const QUESTION_PLACEHOLDER: &str = "{{question}}";
/// Placeholder replaced by the retrieved context
pub const CONTEXT_PLACEHOLDER: &str = "{{context}}";

/// Default instruction template
pub const DEFAULT_TEMPLATE: &str = "\
You're a salesman at a phone store.
Help the client choose a mobile phone.
Question: {{question}}
Context: {{context}}
";

/// Validated instruction template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Build a template, checking both placeholders are present
    pub fn new(template: impl Into<String>) -> RagResult<Self> {
        let template = template.into();
        for placeholder in [QUESTION_PLACEHOLDER, CONTEXT_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::invalid_input(format!(
                    "prompt template is missing {}",
                    placeholder
                )));
            }
        }
        Ok(PromptTemplate { template })
    }

    /// Raw template text
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute the question and context
    ///
    /// Substitution is single-pass, so placeholder text inside the question
    /// or context is left alone.
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        loop {
            let next_q = rest.find(QUESTION_PLACEHOLDER);
            let next_c = rest.find(CONTEXT_PLACEHOLDER);
            let (at, placeholder, value) = match (next_q, next_c) {
                (Some(q), Some(c)) if q < c => (q, QUESTION_PLACEHOLDER, question),
                (Some(q), None) => (q, QUESTION_PLACEHOLDER, question),
                (_, Some(c)) => (c, CONTEXT_PLACEHOLDER, context),
                (None, None) => break,
            };
            out.push_str(&rest[..at]);
            out.push_str(value);
            rest = &rest[at + placeholder.len()..];
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        PromptTemplate {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Join hit texts one per line, each line newline-terminated
pub fn build_context(hits: &[SearchHit]) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&hit.text);
        context.push('\n');
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::Metadata;

    fn hit(id: i64, text: &str) -> SearchHit {
        SearchHit {
            id,
            score: 1.0,
            text: text.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_default_template_is_valid() {
        assert!(PromptTemplate::new(DEFAULT_TEMPLATE).is_ok());
        assert_eq!(PromptTemplate::default().as_str(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        assert!(matches!(
            PromptTemplate::new("Question: {{question}}"),
            Err(RagError::InvalidInput { message }) if message.contains("{{context}}")
        ));
        assert!(PromptTemplate::new("Context: {{context}}").is_err());
    }

    #[test]
    fn test_render() {
        let t = PromptTemplate::new("Q={{question}}; C={{context}}; again {{question}}").unwrap();
        assert_eq!(t.render("why", "because"), "Q=why; C=because; again why");
    }

    #[test]
    fn test_render_does_not_expand_injected_placeholders() {
        let t = PromptTemplate::new("{{question}}|{{context}}").unwrap();
        assert_eq!(t.render("{{context}}", "ctx"), "{{context}}|ctx");
    }

    #[test]
    fn test_build_context_newline_terminated() {
        let context = build_context(&[hit(1, "iPhone 17 $1000"), hit(2, "Pixel 9 $800")]);
        assert_eq!(context, "iPhone 17 $1000\nPixel 9 $800\n");
        assert_eq!(build_context(&[]), "");
    }
}
