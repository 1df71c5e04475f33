//! Heuristic repair and tag-balance checking for model-produced markup.
//!
//! Both operations are pure. [`sanitize`] is deliberately not a parser: it
//! finds the `<?xml` declaration, drops everything before it, and cuts after
//! the last closing tag, assuming that tag closes the document root. Model
//! output is unpredictable, so a strict grammar would reject more documents
//! than it fixes. Swapping in a real parser later only means replacing these
//! two functions.

use once_cell::sync::Lazy;
use regex::Regex;

const DECLARATION: &str = "<?xml";

static RE_CLOSING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</[A-Za-z_][\w:.\-]*\s*>").unwrap());

// Constructs that may contain `<` without being tags
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_CDATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>").unwrap());
static RE_PROCESSING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\?.*?\?>").unwrap());
static RE_DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").unwrap());

/// `<name attrs>`, `</name>`, `<name attrs/>`; quoted attribute values may contain `>`.
static RE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/?)([A-Za-z_][\w:.\-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `open` is the innermost unclosed tag when `</close>` arrived, `None` if nothing was open.
    #[error("{}", describe_mismatch(.open, .close))]
    MismatchedTag { open: Option<String>, close: String },

    #[error("unclosed tags: {}", .0.join(", "))]
    UnclosedTags(Vec<String>),
}

fn describe_mismatch(open: &Option<String>, close: &str) -> String {
    match open {
        Some(open) => format!("mismatched tag: <{}> closed by </{}>", open, close),
        None => format!("closing tag </{}> has no matching open tag", close),
    }
}

/// Trim a completion down to the declaration-to-final-close span.
///
/// Input without a declaration is returned unchanged. Idempotent.
pub fn sanitize(raw: &str) -> String {
    let Some(start) = raw.find(DECLARATION) else {
        return raw.to_string();
    };
    let body = &raw[start..];

    match RE_CLOSING_TAG.find_iter(body).last() {
        Some(last) => body[..last.end()].to_string(),
        None => body.to_string(),
    }
}

/// Stack-based balance check. Attributes are ignored and self-closing tags
/// never touch the stack.
pub fn validate(markup: &str) -> Result<(), ValidationError> {
    let stripped = RE_COMMENT.replace_all(markup, "");
    let stripped = RE_CDATA.replace_all(&stripped, "");
    let stripped = RE_PROCESSING.replace_all(&stripped, "");
    let stripped = RE_DOCTYPE.replace_all(&stripped, "");

    let mut stack: Vec<&str> = Vec::new();
    for caps in RE_TAG.captures_iter(&stripped) {
        let is_close = !caps[1].is_empty();
        let self_closing = !caps[4].is_empty();
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        if is_close {
            match stack.pop() {
                Some(open) if open == name => {}
                open => {
                    return Err(ValidationError::MismatchedTag {
                        open: open.map(str::to_string),
                        close: name.to_string(),
                    })
                }
            }
        } else if !self_closing {
            stack.push(name);
        }
    }

    if stack.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnclosedTags(
            stack.into_iter().map(str::to_string).collect(),
        ))
    }
}
