//! Instruction templates for the two transform passes.

use std::fmt;

/// Which instruction template a transform request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Full conversion of extracted text into markup.
    Initial,
    /// Repair of a previous candidate; output is markup only.
    Refine,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Initial => "initial",
            Purpose::Refine => "refine",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            Purpose::Initial => INITIAL_PROMPT,
            Purpose::Refine => REFINE_PROMPT,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const INITIAL_PROMPT: &str = r#"Convert the following text, extracted from a PDF document, into a single well-formed XML document.

Rules:
1. Start with the declaration <?xml version="1.0" encoding="UTF-8"?>.
2. Use one root element named <Document>.
3. Preserve ALL of the text. Do not summarise, reorder, translate or omit anything.
4. Represent the structure you can infer: <Title>, <Section> with a <Heading>, <Paragraph>, <List> with <Item>, <Table> with <Row> and <Cell>.
5. Escape &, < and > inside text content.
6. Every element you open must be closed, in the correct order.
7. Output only the XML document. No explanations and no code fences.

Text:
"#;

pub const REFINE_PROMPT: &str = r#"The XML document below was generated automatically and may contain structural errors: unclosed elements, elements closed in the wrong order, unescaped special characters or stray non-XML text.

Return a corrected version of the document.

Rules:
1. Keep the <?xml version="1.0" encoding="UTF-8"?> declaration and the <Document> root.
2. Keep every piece of text content exactly as it appears.
3. Fix nesting and close every open element.
4. Output ONLY the corrected XML. No commentary, no explanations, no code fences.

Document:
"#;

/// Prompt text followed by the pass input, sent as one user message.
pub fn render(purpose: Purpose, input: &str) -> String {
    format!("{}{}", purpose.template(), input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_demand_declaration_and_markup_only() {
        for purpose in [Purpose::Initial, Purpose::Refine] {
            let t = purpose.template();
            assert!(t.contains("<?xml"), "{purpose}");
            assert!(t.contains("<Document>"), "{purpose}");
            assert!(t.to_lowercase().contains("no code fences"), "{purpose}");
        }
        assert!(REFINE_PROMPT.contains("ONLY the corrected XML"));
    }

    #[test]
    fn test_render_appends_input() {
        let prompt = render(Purpose::Initial, "Hello world");
        assert!(prompt.starts_with(INITIAL_PROMPT));
        assert!(prompt.ends_with("Hello world"));
    }

    #[test]
    fn test_purpose_labels() {
        assert_eq!(Purpose::Initial.to_string(), "initial");
        assert_eq!(Purpose::Refine.as_str(), "refine");
    }
}
