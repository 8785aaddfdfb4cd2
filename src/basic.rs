use std::borrow::Cow;

use smallvec::SmallVec;

use crate::keywords::{self, BEGIN_CLAUSES, DML, END_CLAUSES};
use crate::style::Formatter;
use crate::token::{tokenize, Token, TokenKind};

const INDENT: &str = "    ";

/// Pretty-printer for queries and DML.
///
/// This is a heuristic text transform, not a parser: it never rejects input
/// and never reorders or drops tokens, it only rewrites the whitespace
/// between them. Some reserved words are always treated as structural, so
/// `left` or `right` used as a function name still starts a new clause.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicFormatter;

impl Formatter for BasicFormatter {
    fn format(&self, source: &str) -> String {
        FormatProcess::new(source).perform()
    }
}

/// Kind of clause body the cursor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    /// Directly after SELECT, FROM, BY or SET: top-level commas break lines.
    List,
    Body,
}

/// One-shot modifiers armed by a keyword and consumed by a later token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    /// The next `and` belongs to `between`.
    Between,
    /// A `from` inside the call opened at this paren count belongs to
    /// `extract(...)` or `trim(...)`.
    Extract(usize),
    /// The token after the INSERT target starts a new line.
    Insert,
}

/// State saved when a SELECT starts and restored by the paren that closes
/// the scope enclosing it. Keeping the clause and the paren count in one
/// frame keeps both at the same depth.
#[derive(Debug, Clone, Copy)]
struct SelectScope {
    clause: Clause,
    parens: usize,
    in_function: usize,
}

struct FormatProcess<'a> {
    tokens: Vec<Token<'a>>,
    result: String,
    indent: usize,
    begin_line: bool,
    clause: Clause,
    /// After a clause-opening word such as `left` or inside a CASE branch,
    /// before the clause body.
    inline_clause: bool,
    after_on: bool,
    pending: Pending,
    in_function: usize,
    /// Parens opened since the innermost SELECT and not yet closed.
    parens: usize,
    scopes: SmallVec<[SelectScope; 8]>,
    /// Indent level at each open CASE.
    cases: SmallVec<[usize; 4]>,
    /// Paren depth at which a VALUES row list opens.
    values_parens: Option<usize>,
    /// End of the last source token in `result`. Trailing spaces before it
    /// belong to that token.
    token_end: usize,
    last: Option<Cow<'a, str>>,
}

impl<'a> FormatProcess<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            tokens: tokenize(sql),
            result: String::with_capacity(sql.len() + sql.len() / 2),
            indent: 1,
            begin_line: true,
            clause: Clause::Body,
            inline_clause: false,
            after_on: false,
            pending: Pending::None,
            in_function: 0,
            parens: 0,
            scopes: SmallVec::new(),
            cases: SmallVec::new(),
            values_parens: None,
            token_end: 0,
            last: None,
        }
    }

    fn perform(mut self) -> String {
        self.result.push('\n');
        self.result.push_str(INDENT);

        let tokens = std::mem::take(&mut self.tokens);
        for token in tokens {
            let lc = token.lowercase();
            match token.kind {
                TokenKind::Whitespace => self.white(),
                TokenKind::Quoted => self.misc(token.text),
                TokenKind::Comment => self.comment(&token),
                TokenKind::Symbol => match token.text {
                    "," => self.comma(token.text),
                    "(" => self.open_paren(token.text),
                    ")" => self.close_paren(token.text),
                    _ => self.misc(token.text),
                },
                TokenKind::Word => self.word(token.text, &lc),
            }
            if !token.is_whitespace() {
                self.last = Some(lc);
            }
        }

        self.trim_spaces();
        self.result
    }

    fn word(&mut self, text: &str, lc: &str) {
        match lc {
            "select" => self.select(text),
            "values" => self.values(text),
            "on" => self.on(text),
            "between" => {
                self.pending = Pending::Between;
                self.misc(text);
            }
            "trim" | "extract" => {
                self.pending = Pending::Extract(self.parens);
                self.misc(text);
            }
            "from" => self.from(text, lc),
            "case" => self.begin_case(text),
            "end" => self.end_case(text),
            "when" | "else" => self.when(text),
            "then" => self.then(text),
            "and" => self.and(text),
            "or" => self.logical(text),
            _ if DML.contains(lc) => self.update_or_insert_or_delete(text, lc),
            _ if BEGIN_CLAUSES.contains(lc) => self.begin_new_clause(text),
            _ if END_CLAUSES.contains(lc) => self.end_new_clause(text, lc),
            _ => self.misc(text),
        }
    }

    fn out(&mut self, text: &str) {
        if self.result.ends_with(',') {
            self.result.push(' ');
        }
        self.result.push_str(text);
        self.token_end = self.result.len();
        self.begin_line = false;
    }

    fn trim_spaces(&mut self) {
        let len = self.result.trim_end_matches(' ').len().max(self.token_end);
        self.result.truncate(len);
    }

    fn newline(&mut self) {
        self.trim_spaces();
        // Never emit an empty line, e.g. after a line comment.
        if self.result.len() > self.token_end && self.result.ends_with('\n') {
            self.result.pop();
        }
        self.result.push('\n');
        for _ in 0..self.indent {
            self.result.push_str(INDENT);
        }
        self.begin_line = true;
    }

    fn increment_indent(&mut self) {
        self.indent += 1;
    }

    fn decrement_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn white(&mut self) {
        if !self.begin_line && !self.result.ends_with(' ') {
            self.result.push(' ');
        }
    }

    fn misc(&mut self, text: &str) {
        self.out(text);
        if self.pending == Pending::Insert && self.in_function == 0 {
            self.newline();
            self.pending = Pending::None;
        }
    }

    fn comment(&mut self, token: &Token<'_>) {
        self.out(token.text);
        if token.is_line_comment() {
            self.newline();
        }
    }

    fn comma(&mut self, text: &str) {
        if self.clause == Clause::List && self.in_function == 0 {
            self.out(text);
            self.newline();
        } else {
            self.misc(text);
        }
    }

    fn open_paren(&mut self, text: &str) {
        let opens_call = self
            .last
            .as_deref()
            .is_some_and(keywords::is_function_name)
            || self.values_parens == Some(self.parens);
        if opens_call || self.in_function > 0 {
            self.in_function += 1;
        }
        self.out(text);
        if self.in_function == 0 && self.clause != Clause::List {
            self.increment_indent();
            self.newline();
        }
        self.parens += 1;
    }

    fn close_paren(&mut self, text: &str) {
        if self.parens == 0 {
            // Closes the paren enclosing the innermost SELECT.
            if let Some(scope) = self.scopes.pop() {
                self.decrement_indent();
                self.clause = scope.clause;
                self.parens = scope.parens.saturating_sub(1);
                self.in_function = scope.in_function;
            }
        } else {
            self.parens -= 1;
        }
        if let Pending::Extract(parens) = self.pending {
            if self.parens <= parens {
                self.pending = Pending::None;
            }
        }

        if self.in_function > 0 {
            self.in_function -= 1;
            self.out(text);
        } else {
            if self.clause != Clause::List {
                self.decrement_indent();
                self.newline();
            }
            self.out(text);
        }
    }

    fn select(&mut self, text: &str) {
        self.out(text);
        self.increment_indent();
        self.newline();
        self.scopes.push(SelectScope {
            clause: self.clause,
            parens: self.parens,
            in_function: self.in_function,
        });
        self.parens = 0;
        self.in_function = 0;
        self.values_parens = None;
        self.clause = Clause::List;
    }

    fn update_or_insert_or_delete(&mut self, text: &str, lc: &str) {
        self.out(text);
        if self.indent > 1 {
            // Nested, most likely a function such as MySQL's insert().
            return;
        }
        self.increment_indent();
        match lc {
            "update" => self.newline(),
            "insert" => self.pending = Pending::Insert,
            _ => {}
        }
    }

    fn values(&mut self, text: &str) {
        if self.parens == 0 {
            self.decrement_indent();
            self.newline();
            self.out(text);
            self.increment_indent();
            self.newline();
        } else {
            self.out(text);
        }
        self.values_parens = Some(self.parens);
    }

    fn from(&mut self, text: &str, lc: &str) {
        match self.pending {
            Pending::Extract(parens) if self.parens > parens => {
                self.pending = Pending::None;
                self.misc(text);
            }
            Pending::Extract(_) => {
                self.pending = Pending::None;
                self.end_new_clause(text, lc);
            }
            _ => self.end_new_clause(text, lc),
        }
    }

    fn end_new_clause(&mut self, text: &str, lc: &str) {
        if !self.inline_clause {
            self.decrement_indent();
            if self.after_on {
                self.decrement_indent();
                self.after_on = false;
            }
            self.newline();
        }
        self.out(text);
        if lc != "union" && lc != "intersect" {
            self.increment_indent();
        }
        self.newline();
        self.inline_clause = false;
        self.values_parens = None;
        self.clause = if matches!(lc, "by" | "set" | "from") {
            Clause::List
        } else {
            Clause::Body
        };
    }

    fn begin_new_clause(&mut self, text: &str) {
        if !self.inline_clause {
            if self.after_on {
                self.decrement_indent();
                self.after_on = false;
            }
            self.decrement_indent();
            self.newline();
        }
        self.out(text);
        self.inline_clause = true;
        self.values_parens = None;
    }

    /// Ad hoc: the first ON after a join indents, a second one outdents.
    fn on(&mut self, text: &str) {
        if self.after_on {
            self.decrement_indent();
            self.after_on = false;
        } else {
            self.increment_indent();
            self.after_on = true;
        }
        self.newline();
        self.out(text);
    }

    fn and(&mut self, text: &str) {
        if self.pending == Pending::Between {
            self.pending = Pending::None;
            self.misc(text);
        } else {
            self.logical(text);
        }
    }

    fn logical(&mut self, text: &str) {
        self.newline();
        self.out(text);
    }

    fn begin_case(&mut self, text: &str) {
        self.out(text);
        self.cases.push(self.indent);
        self.increment_indent();
        self.inline_clause = true;
    }

    fn when(&mut self, text: &str) {
        if let Some(&base) = self.cases.last() {
            self.indent = base + 1;
        }
        self.newline();
        self.out(text);
        self.inline_clause = true;
    }

    fn then(&mut self, text: &str) {
        match self.cases.last() {
            Some(&base) => {
                self.indent = base + 2;
                self.newline();
                self.out(text);
            }
            None => self.misc(text),
        }
    }

    fn end_case(&mut self, text: &str) {
        match self.cases.pop() {
            Some(base) => {
                self.indent = base;
                self.inline_clause = false;
                self.newline();
                self.out(text);
            }
            None => self.misc(text),
        }
    }
}
