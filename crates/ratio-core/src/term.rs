//! # Graph Terms
//!
//! The closed term model of the store and its canonical text notation.
//!
//! Every term a triple can hold is one of:
//! - `Uri`: an IRI reference, written `<http://...>`
//! - `Literal`: a lexical value with an optional datatype or language tag,
//!   written `"v"`, `"v"^^<dt>` or `"v"@lang`
//! - `Blank`: a blank node, written `_:id`
//!
//! The notation is what persistent backends keep in their text columns, so
//! `Term::parse_n3` must accept everything `Term::to_n3` produces.

use crate::RatioError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// LITERAL
// =============================================================================

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub datatype: Option<String>,
    pub lang: Option<String>,
}

impl Literal {
    /// A literal without datatype or language.
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// A typed literal.
    #[must_use]
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// A language-tagged literal.
    #[must_use]
    pub fn tagged(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }

    fn to_n3(&self) -> String {
        let mut out = String::with_capacity(self.value.len() + 2);
        out.push('"');
        escape_into(&self.value, &mut out);
        out.push('"');
        if let Some(lang) = &self.lang {
            out.push('@');
            out.push_str(lang);
        } else if let Some(dt) = &self.datatype {
            out.push_str("^^<");
            out.push_str(dt);
            out.push('>');
        }
        out
    }
}

// =============================================================================
// TERM
// =============================================================================

/// A subject, predicate or object of a triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Uri(String),
    Literal(Literal),
    Blank(String),
}

impl Term {
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(value))
    }

    #[must_use]
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal::typed(value, datatype))
    }

    #[must_use]
    pub fn blank(id: impl Into<String>) -> Self {
        Self::Blank(id.into())
    }

    /// The empty literal used as an "unset" placeholder in ordered fields.
    #[must_use]
    pub fn empty() -> Self {
        Self::literal("")
    }

    #[must_use]
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Self::Uri(uri) => Some(uri),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_uri(&self) -> bool {
        matches!(self, Self::Uri(_))
    }

    /// Whether this is an empty literal (an unset value).
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Literal(lit) if lit.value.is_empty())
    }

    /// The uri, the literal's lexical value, or the blank node id.
    #[must_use]
    pub fn lexical(&self) -> &str {
        match self {
            Self::Uri(uri) => uri,
            Self::Literal(lit) => &lit.value,
            Self::Blank(id) => id,
        }
    }

    /// Canonical notation.
    #[must_use]
    pub fn to_n3(&self) -> String {
        match self {
            Self::Uri(uri) => format!("<{uri}>"),
            Self::Literal(lit) => lit.to_n3(),
            Self::Blank(id) => format!("_:{id}"),
        }
    }

    /// Parse canonical notation.
    ///
    /// Only meant for rows written with [`Term::to_n3`] (or the equivalent
    /// display form of an RDF parser), not for general RDF documents.
    pub fn parse_n3(s: &str) -> Result<Self, RatioError> {
        let s = s.trim();

        if let Some(inner) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            if inner.contains(['<', '>']) {
                return Err(RatioError::TermParse(s.to_string()));
            }
            return Ok(Self::Uri(inner.to_string()));
        }

        if let Some(id) = s.strip_prefix("_:") {
            if id.is_empty() {
                return Err(RatioError::TermParse(s.to_string()));
            }
            return Ok(Self::Blank(id.to_string()));
        }

        if s.starts_with('"') {
            return parse_literal(s).map(Self::Literal);
        }

        Err(RatioError::TermParse(s.to_string()))
    }

    /// Validate a user supplied URI.
    ///
    /// A URI needs a scheme (`letter *(letter / digit / "+" / "-" / ".")`)
    /// followed by `:` and may not contain whitespace or the characters
    /// that the canonical notation cannot hold.
    pub fn parse_uri(raw: &str) -> Result<Self, RatioError> {
        let raw = raw.trim();
        let malformed = || RatioError::MalformedUri(raw.to_string());

        let (scheme, rest) = raw.split_once(':').ok_or_else(malformed)?;
        let mut scheme_chars = scheme.chars();
        let scheme_ok = scheme_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok || rest.is_empty() {
            return Err(malformed());
        }
        if raw.chars().any(|c| {
            c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
        }) {
            return Err(malformed());
        }
        Ok(Self::Uri(raw.to_string()))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_n3())
    }
}

// =============================================================================
// TRIPLE
// =============================================================================

/// A `(subject, predicate, object)` statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    #[must_use]
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

// =============================================================================
// ESCAPING
// =============================================================================

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
}

/// Escape a lexical value for use between double quotes.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(value, &mut out);
    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_literal(s: &str) -> Result<Literal, RatioError> {
    let err = || RatioError::TermParse(s.to_string());

    // Find the closing quote, skipping escaped characters.
    let mut end_quote = None;
    let mut escaped = false;
    for (i, ch) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            end_quote = Some(i);
            break;
        }
    }
    let end = end_quote.ok_or_else(err)?;

    let value = unescape(&s[1..end]);
    let suffix = &s[end + 1..];

    if suffix.is_empty() {
        return Ok(Literal::plain(value));
    }
    if let Some(lang) = suffix.strip_prefix('@') {
        if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(err());
        }
        return Ok(Literal::tagged(value, lang));
    }
    if let Some(dt) = suffix
        .strip_prefix("^^<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        if dt.is_empty() || dt.contains(['<', '>']) {
            return Err(err());
        }
        return Ok(Literal::typed(value, dt));
    }
    Err(err())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_notation() {
        let term = Term::uri("http://example.org/a#B");
        assert_eq!(term.to_n3(), "<http://example.org/a#B>");
        assert_eq!(Term::parse_n3("<http://example.org/a#B>").expect("parse"), term);
    }

    #[test]
    fn literal_notations() {
        assert_eq!(Term::parse_n3("\"x\"").expect("plain"), Term::literal("x"));
        assert_eq!(
            Term::parse_n3("\"5\"^^<http://www.w3.org/2001/XMLSchema#integer>").expect("typed"),
            Term::typed("5", "http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(
            Term::parse_n3("\"Hallo\"@de").expect("tagged"),
            Term::Literal(Literal::tagged("Hallo", "de"))
        );
    }

    #[test]
    fn blank_notation() {
        assert_eq!(Term::parse_n3("_:b0").expect("blank"), Term::blank("b0"));
        assert!(Term::parse_n3("_:").is_err());
    }

    #[test]
    fn quotes_and_newlines_are_escaped() {
        let term = Term::literal("say \"hi\"\nand \\ leave");
        let n3 = term.to_n3();
        assert_eq!(n3, "\"say \\\"hi\\\"\\nand \\\\ leave\"");
        assert_eq!(Term::parse_n3(&n3).expect("parse"), term);
    }

    #[test]
    fn empty_literal_is_unset() {
        assert!(Term::empty().is_unset());
        assert_eq!(Term::empty().to_n3(), "\"\"");
        assert!(!Term::literal(" ").is_unset());
        assert!(!Term::uri("http://x").is_unset());
    }

    #[test]
    fn malformed_terms_are_rejected() {
        for bad in ["", "plain", "\"open", "\"x\"^^dt", "\"x\"@", "\"x\"junk", "<a<b>"] {
            let result = Term::parse_n3(bad);
            assert!(matches!(result, Err(RatioError::TermParse(_))), "{bad}");
        }
    }

    #[test]
    fn parse_uri_validates() {
        assert_eq!(
            Term::parse_uri(" http://example.org/x_1 ").expect("uri"),
            Term::uri("http://example.org/x_1")
        );
        assert!(Term::parse_uri("urn:isbn:123").is_ok());
        for bad in ["", "noscheme", "1http://x", "http://a b", "http://x>", "http:"] {
            assert!(
                matches!(Term::parse_uri(bad), Err(RatioError::MalformedUri(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn triple_display() {
        let triple = Triple::new(
            Term::uri("http://s"),
            Term::uri("http://p"),
            Term::literal("o"),
        );
        assert_eq!(triple.to_string(), "<http://s> <http://p> \"o\" .");
    }
}
