use std::borrow::Cow;

use memchr::memchr;

use crate::keywords::HIGHLIGHT_KEYWORDS;
use crate::style::Formatter;
use crate::token::Tokenizer;

const SYMBOLS_AND_WS: &str = "=><!+-*/()',.|&`\"? \n\r\u{c}\t";
const RESET: &str = "\x1b[0m";

/// Wraps keywords, string literals and quoted identifiers in ANSI SGR
/// escapes. Only quoting is tracked; the text itself is never reflowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightingFormatter {
    keyword: Cow<'static, str>,
    string: Cow<'static, str>,
    quoted: Cow<'static, str>,
}

impl HighlightingFormatter {
    /// Blue keywords, cyan strings, green quoted identifiers.
    pub const DEFAULT: HighlightingFormatter = HighlightingFormatter {
        keyword: Cow::Borrowed("\x1b[34m"),
        string: Cow::Borrowed("\x1b[36m"),
        quoted: Cow::Borrowed("\x1b[32m"),
    };

    /// Build a formatter from SGR parameter strings such as `"1;34"`.
    pub fn new(keyword_code: &str, string_code: &str, quoted_code: &str) -> Self {
        Self {
            keyword: Cow::Owned(escape(keyword_code)),
            string: Cow::Owned(escape(string_code)),
            quoted: Cow::Owned(escape(quoted_code)),
        }
    }
}

impl Default for HighlightingFormatter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn escape(code: &str) -> String {
    format!("\x1b[{code}m")
}

impl Formatter for HighlightingFormatter {
    fn format(&self, sql: &str) -> String {
        let mut result = String::with_capacity(sql.len() * 2);
        let mut in_string = false;
        let mut in_quoted = false;

        for token in Tokenizer::new(sql, SYMBOLS_AND_WS) {
            match token {
                "\"" | "`" => {
                    if in_string {
                        result.push_str(token);
                    } else if in_quoted {
                        in_quoted = false;
                        result.push_str(token);
                        result.push_str(RESET);
                    } else {
                        in_quoted = true;
                        result.push_str(&self.quoted);
                        result.push_str(token);
                    }
                }
                "'" => {
                    if in_quoted {
                        result.push_str(token);
                    } else if in_string {
                        in_string = false;
                        result.push_str(token);
                        result.push_str(RESET);
                    } else {
                        in_string = true;
                        result.push_str(&self.string);
                        result.push_str(token);
                    }
                }
                _ if !in_string && !in_quoted && is_keyword(token) => {
                    result.push_str(&self.keyword);
                    result.push_str(token);
                    result.push_str(RESET);
                }
                _ => result.push_str(token),
            }
        }

        result
    }
}

fn is_keyword(token: &str) -> bool {
    if token.chars().any(char::is_uppercase) {
        HIGHLIGHT_KEYWORDS.contains(token.to_lowercase().as_str())
    } else {
        HIGHLIGHT_KEYWORDS.contains(token)
    }
}

/// Remove ANSI SGR escape sequences (`ESC [ ... m`).
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr(0x1b, bytes) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    let mut next = Some(first);
    while let Some(esc) = next {
        out.push_str(&text[pos..esc]);
        pos = if bytes.get(esc + 1) == Some(&b'[') {
            match memchr(b'm', &bytes[esc..]) {
                Some(offset) => esc + offset + 1,
                None => bytes.len(),
            }
        } else {
            esc + 1
        };
        next = memchr(0x1b, &bytes[pos..]).map(|offset| pos + offset);
    }
    out.push_str(&text[pos..]);

    Cow::Owned(out)
}
