//! Response handling options.

use std::fmt;
use std::sync::Arc;

/// Decides whether a response with a given `Content-Type` is decoded to UTF-8.
pub trait ContentTypePredicate: Send + Sync {
    /// Returns `true` if bodies of `content_type` should be decoded.
    fn matches(&self, content_type: &str) -> bool;
}

impl<F> ContentTypePredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, content_type: &str) -> bool {
        self(content_type)
    }
}

/// Content types decoded by default.
pub const DEFAULT_DECODED_CONTENT_TYPES: [&str; 5] = ["text", "json", "xml", "html", "java"];

/// Matches content types containing any of a list of keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeKeywords(Vec<String>);

impl Default for ContentTypeKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_DECODED_CONTENT_TYPES)
    }
}

impl ContentTypeKeywords {
    /// Match content types containing one of `keywords` (case-insensitive).
    #[must_use]
    pub fn new<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self(
            keywords
                .into_iter()
                .map(|keyword| keyword.into().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Configured keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.0
    }
}

impl ContentTypePredicate for ContentTypeKeywords {
    fn matches(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        self.0
            .iter()
            .any(|keyword| content_type.contains(keyword.as_str()))
    }
}

/// Matches every content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyContentType;

impl ContentTypePredicate for AnyContentType {
    fn matches(&self, _content_type: &str) -> bool {
        true
    }
}

/// Options applied to responses after dispatch.
#[derive(Clone)]
pub struct ResponseOptions {
    /// Leave bodies as received.
    pub disable_auto_decode: bool,
    /// Which content types are decoded.
    pub auto_decode: Arc<dyn ContentTypePredicate>,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            disable_auto_decode: false,
            auto_decode: Arc::new(ContentTypeKeywords::default()),
        }
    }
}

impl fmt::Debug for ResponseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseOptions")
            .field("disable_auto_decode", &self.disable_auto_decode)
            .finish_non_exhaustive()
    }
}

impl ResponseOptions {
    /// Returns `true` if a body of `content_type` should be decoded.
    #[must_use]
    pub fn should_decode(&self, content_type: &str) -> bool {
        !self.disable_auto_decode && self.auto_decode.matches(content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keywords() {
        let options = ResponseOptions::default();

        assert!(options.should_decode("text/html; charset=gbk"));
        assert!(options.should_decode("application/json"));
        assert!(options.should_decode("application/javascript"));
        assert!(options.should_decode("application/XML"));
        assert!(!options.should_decode("image/png"));
        assert!(!options.should_decode("application/octet-stream"));
    }

    #[test]
    fn disabled_decodes_nothing() {
        let options = ResponseOptions {
            disable_auto_decode: true,
            ..ResponseOptions::default()
        };
        assert!(!options.should_decode("text/plain"));
    }

    #[test]
    fn closures_and_any() {
        let only_csv = |content_type: &str| content_type.starts_with("text/csv");
        assert!(only_csv.matches("text/csv; charset=latin1"));
        assert!(!only_csv.matches("text/plain"));
        assert!(AnyContentType.matches("image/png"));
    }
}
