use std::borrow::Cow;

use memchr::memchr;

/// Whitespace characters recognized by every tokenizer.
pub const WHITESPACE: &str = " \n\r\u{c}\t";

/// Delimiters used by the basic formatter and the equivalence check.
pub const SQL_DELIMITERS: &str = "()+*/-=<>'`\"[], \n\r\u{c}\t";

/// Lexical category of a token. Keyword classification is never stored here;
/// it is computed from the token text against the fixed sets in `keywords`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Anything between two delimiters: keywords, identifiers, numbers.
    Word,
    /// A single delimiter character other than whitespace or a quote.
    Symbol,
    /// A quoted literal or identifier, including its delimiters.
    Quoted,
    /// A `--` comment up to the end of the line, or a `/* */` block.
    Comment,
    Whitespace,
}

/// An immutable slice of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str) -> Self {
        Self { kind, text }
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    pub fn is_line_comment(&self) -> bool {
        self.kind == TokenKind::Comment && self.text.starts_with("--")
    }

    /// Lowercase form used for keyword dispatch. Quoted tokens are returned
    /// as written so their content can never match a keyword.
    pub fn lowercase(&self) -> Cow<'a, str> {
        if matches!(self.kind, TokenKind::Quoted | TokenKind::Comment)
            || !self.text.chars().any(char::is_uppercase)
        {
            Cow::Borrowed(self.text)
        } else {
            Cow::Owned(self.text.to_lowercase())
        }
    }
}

#[inline]
fn is_delimiter(b: u8, delimiters: &str) -> bool {
    delimiters.as_bytes().contains(&b)
}

/// Splits text on a set of single-byte delimiters and returns the delimiters
/// themselves as one-character tokens.
///
/// Delimiters are ASCII, so every split point is a char boundary.
pub struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    delimiters: &'static str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, delimiters: &'static str) -> Self {
        Self {
            source,
            pos: 0,
            delimiters,
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.source.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }
        let end = if is_delimiter(bytes[start], self.delimiters) {
            start + 1
        } else {
            bytes[start..]
                .iter()
                .position(|&b| is_delimiter(b, self.delimiters))
                .map(|offset| start + offset)
                .unwrap_or(bytes.len())
        };
        self.pos = end;
        Some(&self.source[start..end])
    }
}

/// Position just past the delimiter closing a quoted segment opened at
/// `start`, or the end of input when the segment is unterminated.
pub(crate) fn quoted_end(bytes: &[u8], start: usize, close: u8) -> usize {
    match memchr(close, &bytes[start + 1..]) {
        Some(offset) => start + 1 + offset + 1,
        None => bytes.len(),
    }
}

/// The closing delimiter for a quote-opening byte.
pub(crate) fn closing_quote(open: u8) -> Option<u8> {
    match open {
        b'\'' | b'`' | b'"' => Some(open),
        b'[' => Some(b']'),
        _ => None,
    }
}

/// Tokenize a SQL string, reassembling quoted segments and comments into
/// single tokens.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        let next = bytes.get(pos + 1).copied();
        let (kind, end) = if let Some(close) = closing_quote(b) {
            (TokenKind::Quoted, quoted_end(bytes, pos, close))
        } else if b == b'-' && next == Some(b'-') {
            let end = memchr(b'\n', &bytes[pos..])
                .map(|offset| pos + offset)
                .unwrap_or(bytes.len());
            (TokenKind::Comment, end)
        } else if b == b'/' && next == Some(b'*') {
            (TokenKind::Comment, find_block_comment_end(bytes, pos + 2))
        } else if is_delimiter(b, WHITESPACE) {
            (TokenKind::Whitespace, pos + 1)
        } else if is_delimiter(b, SQL_DELIMITERS) {
            (TokenKind::Symbol, pos + 1)
        } else {
            let end = bytes[pos..]
                .iter()
                .position(|&c| is_delimiter(c, SQL_DELIMITERS))
                .map(|offset| pos + offset)
                .unwrap_or(bytes.len());
            (TokenKind::Word, end)
        };
        tokens.push(Token::new(kind, &sql[pos..end]));
        pos = end;
    }

    tokens
}

/// The non-whitespace token texts of `sql`, in order.
pub fn significant_tokens(sql: &str) -> Vec<&str> {
    tokenize(sql)
        .into_iter()
        .filter(|t| !t.is_whitespace())
        .map(|t| t.text)
        .collect()
}

/// One statement of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlStatement<'a> {
    /// Statement text without the terminator, trimmed.
    pub text: &'a str,
    /// Whether a `;` ended the statement in the source.
    pub terminated: bool,
}

/// Split a script on `;` outside quotes and comments. Empty statements are
/// dropped.
pub fn split_statements(sql: &str) -> Vec<SqlStatement<'_>> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b';' => {
                push_statement(&sql[start..pos], true, &mut statements);
                pos += 1;
                start = pos;
            }
            b'-' if bytes.get(pos + 1) == Some(&b'-') => {
                pos = memchr(b'\n', &bytes[pos..])
                    .map(|offset| pos + offset + 1)
                    .unwrap_or(bytes.len());
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = find_block_comment_end(bytes, pos + 2);
            }
            b => {
                pos = match closing_quote(b) {
                    Some(close) => quoted_end(bytes, pos, close),
                    None => pos + 1,
                };
            }
        }
    }
    push_statement(&sql[start..], false, &mut statements);

    statements
}

fn push_statement<'a>(raw: &'a str, terminated: bool, out: &mut Vec<SqlStatement<'a>>) {
    let text = raw.trim();
    if !text.is_empty() {
        out.push(SqlStatement { text, terminated });
    }
}

fn find_block_comment_end(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() {
        match memchr(b'*', &bytes[pos..]) {
            Some(offset) => {
                let at = pos + offset;
                if bytes.get(at + 1) == Some(&b'/') {
                    return at + 2;
                }
                pos = at + 1;
            }
            None => return bytes.len(),
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(sql: &str) -> Vec<&str> {
        tokenize(sql).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenizer_returns_delimiters() {
        let parts: Vec<&str> = Tokenizer::new("a=b, c", SQL_DELIMITERS).collect();
        assert_eq!(parts, vec!["a", "=", "b", ",", " ", "c"]);
    }

    #[test]
    fn test_tokenizer_custom_delimiters() {
        let parts: Vec<&str> = Tokenizer::new("x is 'y'", " '").collect();
        assert_eq!(parts, vec!["x", " ", "is", " ", "'", "y", "'"]);
    }

    #[test]
    fn test_quoted_segments_are_single_tokens() {
        assert_eq!(
            texts("select 'a, b' from \"My Table\""),
            vec!["select", " ", "'a, b'", " ", "from", " ", "\"My Table\""]
        );
    }

    #[test]
    fn test_bracket_quoting() {
        let tokens = tokenize("select [order] from t");
        assert_eq!(tokens[2], Token::new(TokenKind::Quoted, "[order]"));
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        let tokens = tokenize("select 'abc def");
        assert_eq!(tokens.last().unwrap().text, "'abc def");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Quoted);
    }

    #[test]
    fn test_lowercase_leaves_quoted_alone() {
        let tokens = tokenize("SELECT 'SELECT'");
        assert_eq!(tokens[0].lowercase(), "select");
        assert_eq!(tokens[2].lowercase(), "'SELECT'");
    }

    #[test]
    fn test_comments_are_single_tokens() {
        let tokens = tokenize("a -- x, y\nb /* c ) */ d-e");
        let comments: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .map(|t| t.text)
            .collect();
        assert_eq!(comments, vec!["-- x, y", "/* c ) */"]);
        assert!(tokens.iter().any(|t| t.text == "-" && t.kind == TokenKind::Symbol));
    }

    #[test]
    fn test_multibyte_words() {
        assert_eq!(texts("select ünïcode"), vec!["select", " ", "ünïcode"]);
    }

    #[test]
    fn test_significant_tokens_skip_whitespace() {
        assert_eq!(
            significant_tokens("a  =\n b"),
            vec!["a", "=", "b"]
        );
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements("select 1; select ';' ;\n-- a;b\nselect 2");
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].text, "select 1");
        assert!(statements[0].terminated);
        assert_eq!(statements[1].text, "select ';'");
        assert_eq!(statements[2].text, "-- a;b\nselect 2");
        assert!(!statements[2].terminated);
    }

    #[test]
    fn test_split_statements_block_comment() {
        let statements = split_statements("/* x; y */ select 1;;");
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].text, "/* x; y */ select 1");
    }
}
