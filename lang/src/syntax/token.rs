use std::ops::Range;

/// Kind of one lexical element of the language.
///
/// Whitespace and comments are first-class tokens so that the token sequence
/// partitions the document exactly: concatenating the text of all tokens
/// yields the original source back.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// Synthetic token of the tree root, spanning the whole document.
    Document,
    /// A lone `(`.
    OpenBracket,
    /// A `(` fused with the operator-like identifier that immediately follows
    /// it, e.g. `(:action`, `(and`, `(=`.
    OpenBracketOperator,
    CloseBracket,
    Whitespace,
    /// A `;` comment, up to (excluding) the end of the line.
    Comment,
    /// A `?name` variable parameter.
    Parameter,
    /// A lone `-`, separating a symbol list from its type.
    Dash,
    Number,
    /// Any other identifier or symbol.
    Other,
}

/// One lexical element, addressing its text as a byte range of the document.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, range: Range<usize>) -> Token {
        Token { kind, range }
    }

    pub fn text<'a>(&self, document: &'a str) -> &'a str {
        &document[self.range.clone()]
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
}

/// Identifiers that, when immediately following a `(`, fuse with it into an
/// `OpenBracketOperator` token.
const OPERATORS: [&str; 22] = [
    "define", "domain", "problem", "and", "or", "not", "when", "forall", "exists", "at", "over", "assign",
    "increase", "decrease", "scale-up", "scale-down", "minimize", "maximize", "=", ">=", "<=", "supply-demand",
];

fn is_operator_word(word: &str) -> bool {
    word.starts_with(':')
        || OPERATORS.iter().any(|op| word.eq_ignore_ascii_case(op))
        || matches!(word, "<" | ">" | "+" | "-" | "/" | "*")
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == ';'
}

fn is_number(word: &str) -> bool {
    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.') && digits.chars().any(|c| c.is_ascii_digit())
}

/// Splits the document into a lossless token sequence.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = text.char_indices().collect::<Vec<_>>();
    let len = text.len();
    let mut i = 0;

    // end offset of the word starting at position `at` in `bytes`
    let word_end = |mut at: usize| -> usize {
        while at < bytes.len() && !is_delimiter(bytes[at].1) {
            at += 1;
        }
        if at < bytes.len() {
            bytes[at].0
        } else {
            len
        }
    };

    while i < bytes.len() {
        let (start, c) = bytes[i];
        match c {
            ';' => {
                while i < bytes.len() && bytes[i].1 != '\n' {
                    i += 1;
                }
                let end = if i < bytes.len() { bytes[i].0 } else { len };
                tokens.push(Token::new(TokenKind::Comment, start..end));
            }
            c if c.is_whitespace() => {
                while i < bytes.len() && bytes[i].1.is_whitespace() {
                    i += 1;
                }
                let end = if i < bytes.len() { bytes[i].0 } else { len };
                tokens.push(Token::new(TokenKind::Whitespace, start..end));
            }
            '(' => {
                let mut end = word_end(i + 1);
                let word = &text[bytes.get(i + 1).map(|(o, _)| *o).unwrap_or(len)..end];
                if !word.is_empty() && is_operator_word(word) {
                    // `at start`, `at end` and `over all` are single operators
                    if word.eq_ignore_ascii_case("at") || word.eq_ignore_ascii_case("over") {
                        let mut j = i;
                        while j < bytes.len() && bytes[j].0 < end {
                            j += 1;
                        }
                        while j < bytes.len() && bytes[j].1.is_whitespace() {
                            j += 1;
                        }
                        if j < bytes.len() {
                            let next_end = word_end(j);
                            let next = &text[bytes[j].0..next_end];
                            if matches!(next.to_ascii_lowercase().as_str(), "start" | "end" | "all") {
                                end = next_end;
                            }
                        }
                    }
                    tokens.push(Token::new(TokenKind::OpenBracketOperator, start..end));
                    while i < bytes.len() && bytes[i].0 < end {
                        i += 1;
                    }
                } else {
                    tokens.push(Token::new(TokenKind::OpenBracket, start..start + 1));
                    i += 1;
                }
            }
            ')' => {
                tokens.push(Token::new(TokenKind::CloseBracket, start..start + 1));
                i += 1;
            }
            _ => {
                let end = word_end(i);
                let word = &text[start..end];
                let kind = if word.starts_with('?') {
                    TokenKind::Parameter
                } else if word == "-" {
                    TokenKind::Dash
                } else if is_number(word) {
                    TokenKind::Number
                } else {
                    TokenKind::Other
                };
                tokens.push(Token::new(kind, start..end));
                while i < bytes.len() && bytes[i].0 < end {
                    i += 1;
                }
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokens_partition_the_document() {
        let text = "(:action load ; comment\n  :parameters (?t - truck))";
        let tokens = tokenize(text);
        let mut offset = 0;
        for t in &tokens {
            assert_eq!(t.start(), offset, "gap before token {t:?}");
            offset = t.end();
        }
        assert_eq!(offset, text.len());
    }

    #[test]
    fn operator_brackets_are_fused() {
        let tokens = tokenize("(:action (and (at-destination)");
        assert_eq!(tokens[0].kind, TokenKind::OpenBracketOperator);
        assert_eq!(tokens[0].text("(:action (and (at-destination)"), "(:action");
        assert_eq!(tokens[2].kind, TokenKind::OpenBracketOperator);
        // `at-destination` is an ordinary identifier, not the `at` operator
        assert_eq!(tokens[4].kind, TokenKind::OpenBracket);
    }

    #[test]
    fn temporal_qualifiers_fuse_into_one_operator() {
        let text = "(at start (clear ?x)) (over all (safe))";
        let tokens = tokenize(text);
        assert_eq!(tokens[0].kind, TokenKind::OpenBracketOperator);
        assert_eq!(tokens[0].text(text), "(at start");
        let over = tokens.iter().find(|t| t.text(text).starts_with("(over")).unwrap();
        assert_eq!(over.text(text), "(over all");
    }

    #[test]
    fn parameters_dashes_and_numbers() {
        assert_eq!(
            kinds("?t - truck 17 -2.5"),
            vec![
                TokenKind::Parameter,
                TokenKind::Whitespace,
                TokenKind::Dash,
                TokenKind::Whitespace,
                TokenKind::Other,
                TokenKind::Whitespace,
                TokenKind::Number,
                TokenKind::Whitespace,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn comment_stops_before_newline() {
        let text = "; makespan\n(x)";
        let tokens = tokenize(text);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].text(text), "; makespan");
        assert_eq!(tokens[1].kind, TokenKind::Whitespace);
    }
}
