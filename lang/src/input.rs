use std::convert::TryFrom;
use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;

/// Raw source text of a domain, problem or plan document, with an optional
/// origin (file name) used when rendering localized errors.
pub struct Input {
    pub text: String,
    pub source: Option<String>,
}

impl Input {
    pub fn from_string(input: impl Into<String>) -> Input {
        Input {
            text: input.into(),
            source: None,
        }
    }

    pub fn from_file(file: &std::path::Path) -> std::result::Result<Input, std::io::Error> {
        let s = std::fs::read_to_string(file)?;
        Ok(Input {
            text: s,
            source: Some(file.display().to_string()),
        })
    }

    /// Line and column (both zero-based) of a byte offset in the text.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 0;
        let mut col = 0;
        for (i, c) in self.text.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// Renders the line containing the start of `range`, underlined with carets.
    pub fn underlined(&self, range: Range<usize>) -> impl Display + '_ {
        let formatter = move |f: &mut std::fmt::Formatter| {
            let (line, col) = self.line_col(range.start);
            let l = self.text.lines().nth(line).unwrap_or("");
            writeln!(f, "{l}")?;
            // keep tabulations of the source line so the carets stay aligned
            for c in l.chars().take(col) {
                let output = if c == '\t' { '\t' } else { ' ' };
                write!(f, "{output}")?;
            }
            let underlined_len = range.len().max(1).min(l.len().saturating_sub(col).max(1));
            write!(f, "{}", "^".repeat(underlined_len))?;
            Ok(())
        };
        Fmt(formatter)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input {
            text: s.to_string(),
            source: None,
        }
    }
}

impl TryFrom<&std::path::Path> for Input {
    type Error = std::io::Error;

    fn try_from(path: &std::path::Path) -> Result<Self, Self::Error> {
        Input::from_file(path)
    }
}

/// A half-open byte range `[start, end)` of an input document.
///
/// Mostly used to extract the original substring of a syntax node and to
/// produce localized error messages through the `invalid` method.
#[derive(Clone)]
pub struct Span {
    source: Arc<Input>,
    range: Range<usize>,
}

impl Span {
    pub fn new(source: &Arc<Input>, range: Range<usize>) -> Span {
        Span {
            source: source.clone(),
            range,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    /// The substring of the source covered by this span.
    pub fn str(&self) -> &str {
        &self.source.text[self.range.clone()]
    }

    pub fn invalid(&self, error: impl Into<String>) -> ParseError {
        ParseError {
            context: vec![],
            inline_err: Some(error.into()),
            loc: Some(self.clone()),
        }
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.str())
    }
}

/// Error localized in an input document, rendered with the offending line
/// underlined and any context messages stacked above it.
pub struct ParseError {
    context: Vec<String>,
    inline_err: Option<String>,
    loc: Option<Span>,
}

impl ParseError {
    pub fn failed<T>(self) -> std::result::Result<T, ParseError> {
        Err(self)
    }
}

impl std::error::Error for ParseError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, context) in self.context.iter().rev().enumerate() {
            let prefix = if i > 0 { "Caused by" } else { "Error" };
            writeln!(f, "{prefix}: {context}")?;
        }
        if let Some(Span { source, range }) = &self.loc {
            let (line, col) = source.line_col(range.start);
            if let Some(path) = &source.source {
                writeln!(f, "{}:{}:{}", path, line + 1, col)?;
            }
            write!(f, "{}", source.underlined(range.clone()))?;
        }
        if let Some(err) = &self.inline_err {
            write!(f, " {err}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub trait Ctx<T> {
    fn ctx(self, error_context: impl Display) -> std::result::Result<T, ParseError>;
}
impl<T> Ctx<T> for std::result::Result<T, ParseError> {
    fn ctx(self, error_context: impl Display) -> Result<T, ParseError> {
        match self {
            Ok(x) => Ok(x),
            Err(mut e) => {
                e.context.push(format!("{error_context}"));
                Err(e)
            }
        }
    }
}

/// Symbol of the language, annotated with its origin when it was read from a
/// document. PDDL identifiers compare case-insensitively; `Display` keeps the
/// capitalization of the source.
#[derive(Clone)]
pub struct Sym {
    symbol: String,
    pub span: Option<Span>,
}

impl Sym {
    pub fn with_source(s: impl Into<String>, source: Span) -> Sym {
        Sym {
            symbol: s.into(),
            span: Some(source),
        }
    }

    pub fn as_str(&self) -> &str {
        self.symbol.as_str()
    }

    /// Case-insensitive equality, the canonical comparison for identifiers.
    pub fn canonical_eq(&self, other: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(other)
    }

    pub fn canonical_string(&self) -> String {
        self.symbol.to_ascii_lowercase()
    }
}

impl From<&str> for Sym {
    fn from(value: &str) -> Self {
        Sym {
            symbol: value.to_string(),
            span: None,
        }
    }
}
impl From<String> for Sym {
    fn from(value: String) -> Self {
        Sym {
            symbol: value,
            span: None,
        }
    }
}

impl AsRef<str> for Sym {
    fn as_ref(&self) -> &str {
        &self.symbol
    }
}

impl std::borrow::Borrow<str> for Sym {
    fn borrow(&self) -> &str {
        &self.symbol
    }
}

impl PartialEq for Sym {
    fn eq(&self, other: &Self) -> bool {
        self.symbol.eq_ignore_ascii_case(&other.symbol)
    }
}
impl Eq for Sym {}

impl PartialOrd for Sym {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Sym {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical_string().cmp(&other.canonical_string())
    }
}

impl std::hash::Hash for Sym {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical_string().hash(state)
    }
}

impl std::fmt::Debug for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
impl Display for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Wraps a closure into a `Display` object.
pub struct Fmt<F>(pub F)
where
    F: Fn(&mut std::fmt::Formatter) -> std::fmt::Result;

impl<F> Display for Fmt<F>
where
    F: Fn(&mut std::fmt::Formatter) -> std::fmt::Result,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        (self.0)(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_of_offsets() {
        let input = Input::from_string("(define\n  (domain x))");
        assert_eq!(input.line_col(0), (0, 0));
        assert_eq!(input.line_col(8), (1, 0));
        assert_eq!(input.line_col(11), (1, 3));
    }

    #[test]
    fn span_extracts_source_substring() {
        let input = Arc::new(Input::from_string("(domain logistics)"));
        let span = Span::new(&input, 1..7);
        assert_eq!(span.str(), "domain");
    }

    #[test]
    fn syms_compare_case_insensitively() {
        let a = Sym::from("Truck");
        let b = Sym::from("truck");
        assert_eq!(a, b);
        assert!(a.canonical_eq("TRUCK"));
        assert_eq!(a.to_string(), "Truck");
    }
}
