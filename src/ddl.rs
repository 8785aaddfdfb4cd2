use crate::keywords::DDL_BREAKS;
use crate::style::Formatter;
use crate::token::{tokenize, Token, TokenKind, WHITESPACE};

const INITIAL_LINE: &str = "\n    ";
const OTHER_LINES: &str = "\n        ";

/// Formatter for schema statements. It only tracks paren depth; quoted
/// literals and comments arrive as single tokens and are copied verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct DdlFormatter;

impl Formatter for DdlFormatter {
    fn format(&self, sql: &str) -> String {
        if sql.trim().is_empty() {
            return sql.to_string();
        }
        let lower = sql.trim_start().to_lowercase();
        if lower.starts_with("create table") {
            format_create_table(sql)
        } else if lower.starts_with("alter table") {
            format_alter_table(sql)
        } else if lower.starts_with("comment on") {
            format_comment_on(sql)
        } else {
            format!("{INITIAL_LINE}{}", sql.trim_start())
        }
    }
}

/// Output buffer that drops the whitespace following a forced line break.
struct DdlOutput {
    result: String,
    at_break: bool,
    /// End of the last token copied from the source. Trimming before a
    /// break never reaches below it.
    token_end: usize,
}

impl DdlOutput {
    fn new(capacity: usize) -> Self {
        let mut result = String::with_capacity(capacity + 32);
        result.push_str(INITIAL_LINE);
        Self {
            token_end: result.len(),
            result,
            at_break: true,
        }
    }

    fn push(&mut self, token: &Token<'_>) {
        if token.is_whitespace() {
            if !self.at_break {
                self.result.push_str(token.text);
            }
            return;
        }
        self.result.push_str(token.text);
        self.token_end = self.result.len();
        self.at_break = false;
    }

    fn line_break(&mut self, line: &str) {
        let len = self
            .result
            .trim_end_matches(|c| WHITESPACE.contains(c))
            .len()
            .max(self.token_end);
        self.result.truncate(len);
        self.result.push_str(line);
        self.at_break = true;
    }

    fn finish(self) -> String {
        self.result
    }
}

fn is_symbol(token: &Token<'_>, symbol: &str) -> bool {
    token.kind == TokenKind::Symbol && token.text == symbol
}

fn format_create_table(sql: &str) -> String {
    let mut out = DdlOutput::new(sql.len());
    let mut depth = 0usize;

    for token in tokenize(sql.trim_start()) {
        if is_symbol(&token, ")") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                out.line_break(INITIAL_LINE);
            }
        }
        out.push(&token);
        if is_symbol(&token, ",") && depth == 1 {
            out.line_break(OTHER_LINES);
        }
        if is_symbol(&token, "(") {
            depth += 1;
            if depth == 1 {
                out.line_break(OTHER_LINES);
            }
        }
    }

    out.finish()
}

fn format_alter_table(sql: &str) -> String {
    let mut out = DdlOutput::new(sql.len());
    let mut first = true;

    for token in tokenize(sql.trim_start()) {
        if token.kind == TokenKind::Word && !first && DDL_BREAKS.contains(&*token.lowercase()) {
            out.line_break(OTHER_LINES);
        }
        if !token.is_whitespace() {
            first = false;
        }
        out.push(&token);
    }

    out.finish()
}

fn format_comment_on(sql: &str) -> String {
    let mut out = DdlOutput::new(sql.len());

    for token in tokenize(sql.trim_start()) {
        out.push(&token);
        if token.kind == TokenKind::Word && token.text.eq_ignore_ascii_case("is") {
            out.line_break(OTHER_LINES);
        }
    }

    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::significant_tokens;
    use pretty_assertions::assert_eq;

    fn format(sql: &str) -> String {
        DdlFormatter.format(sql)
    }

    #[test]
    fn test_empty_is_unchanged() {
        assert_eq!(format(""), "");
        assert_eq!(format("  "), "  ");
    }

    #[test]
    fn test_create_table_breaks_top_level_commas() {
        assert_eq!(
            format("CREATE TABLE t (a INT, b INT)"),
            "\n    CREATE TABLE t (\n        a INT,\n        b INT\n    )"
        );
    }

    #[test]
    fn test_create_table_nested_parens_stay_inline() {
        assert_eq!(
            format("create table t (a numeric(10,2), b int check (b > 0), primary key (a))"),
            "\n    create table t (\n        a numeric(10,2),\n        b int check (b > 0),\n        primary key (a)\n    )"
        );
    }

    #[test]
    fn test_create_table_quoted_content_is_verbatim() {
        assert_eq!(
            format("create table t (a varchar(5) default 'x,(y)', \"b,c\" int, [d)] int)"),
            "\n    create table t (\n        a varchar(5) default 'x,(y)',\n        \"b,c\" int,\n        [d)] int\n    )"
        );
    }

    #[test]
    fn test_create_index_gets_single_indent() {
        assert_eq!(
            format("create index idx on t (a, b)"),
            "\n    create index idx on t (a, b)"
        );
    }

    #[test]
    fn test_unknown_statement_gets_single_indent() {
        assert_eq!(format("drop table t"), "\n    drop table t");
    }

    #[test]
    fn test_alter_table_breaks_before_keywords() {
        assert_eq!(
            format("alter table orders add constraint fk_cust foreign key (cust_id) references customer"),
            "\n    alter table orders\n        add constraint fk_cust\n        foreign key (cust_id)\n        references customer"
        );
    }

    #[test]
    fn test_alter_table_case_insensitive_and_quote_aware() {
        assert_eq!(
            format("ALTER TABLE t DROP COLUMN \"add\""),
            "\n    ALTER TABLE t\n        DROP COLUMN \"add\""
        );
    }

    #[test]
    fn test_comment_on_breaks_after_is() {
        assert_eq!(
            format("comment on column t.a is 'what is this'"),
            "\n    comment on column t.a is\n        'what is this'"
        );
    }

    #[test]
    fn test_create_table_comma_inside_line_comment() {
        let sql = "create table t (a int, -- note, more\n b int)";
        let out = format(sql);
        assert_eq!(
            out,
            "\n    create table t (\n        a int,\n        -- note, more\n b int\n    )"
        );
        assert_eq!(significant_tokens(&out), significant_tokens(sql));
    }

    #[test]
    fn test_create_table_parens_inside_block_comment() {
        let sql = "create table t (a int /* (x, y) */, b int)";
        assert_eq!(
            format(sql),
            "\n    create table t (\n        a int /* (x, y) */,\n        b int\n    )"
        );
    }

    #[test]
    fn test_alter_table_keyword_inside_line_comment() {
        let sql = "alter table t add b int -- add later\n";
        let out = format(sql);
        assert_eq!(out, "\n    alter table t\n        add b int -- add later\n");
        assert_eq!(significant_tokens(&out), significant_tokens(sql));
    }

    #[test]
    fn test_comment_on_is_inside_block_comment() {
        assert_eq!(
            format("comment on /* is */ table t is 'x'"),
            "\n    comment on /* is */ table t is\n        'x'"
        );
    }

    #[test]
    fn test_break_keeps_trailing_spaces_of_comment() {
        let sql = "create table t (a int -- c   \n)";
        let out = format(sql);
        assert_eq!(out, "\n    create table t (\n        a int -- c   \n    )");
        assert_eq!(significant_tokens(&out), significant_tokens(sql));
    }
}
