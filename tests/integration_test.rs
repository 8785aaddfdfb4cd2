use pretty_assertions::assert_eq;
use proptest::prelude::*;

use sqlshape::highlight::strip_ansi;
use sqlshape::token::{significant_tokens, split_statements};
use sqlshape::{format_string, FormatStyle, Mode};

const QUERIES: &[&str] = &[
    "select a, b from t",
    "SELECT E.ID, COUNT(*) FROM EMPLOYEE E GROUP BY E.ID HAVING COUNT(*) > 1",
    "select * from a left outer join b on a.id = b.a_id where b.x is not null order by a.id",
    "select a from t where a in (select b from u where u.c = 'x') and d = 1",
    "select case when a = 1 then 'one' when a = 2 then 'two' else 'many' end from t",
    "insert into t (a, b, c) values (1, 'two', 3.0)",
    "update t set a = a + 1, b = coalesce(b, 0) where id = ?",
    "delete from t where id in (1, 2, 3)",
    "select \"select\", [from], `where` from t",
    "select a -- trailing note\nfrom t /* block, with comma */ where x = 1",
    "select a from t union all select b from u",
];

fn mode(style: &str) -> Mode {
    Mode {
        style_name: style.to_string(),
        ..Mode::default()
    }
}

#[test]
fn test_basic_preserves_token_order() {
    let formatter = FormatStyle::Basic.formatter();
    for sql in QUERIES {
        let out = formatter.format(sql);
        assert_eq!(significant_tokens(&out), significant_tokens(sql), "{sql}");
    }
}

#[test]
fn test_basic_reformat_keeps_token_stream() {
    let formatter = FormatStyle::Basic.formatter();
    for sql in QUERIES {
        let once = formatter.format(sql);
        let twice = formatter.format(&once);
        assert_eq!(significant_tokens(&twice), significant_tokens(&once), "{sql}");
    }
}

#[test]
fn test_basic_output_starts_on_fresh_indented_line() {
    let formatter = FormatStyle::Basic.formatter();
    for sql in QUERIES {
        assert!(formatter.format(sql).starts_with("\n    "), "{sql}");
    }
}

#[test]
fn test_ddl_create_table() {
    assert_eq!(
        FormatStyle::Ddl.formatter().format("CREATE TABLE t (a INT, b INT)"),
        "\n    CREATE TABLE t (\n        a INT,\n        b INT\n    )"
    );
}

#[test]
fn test_highlight_colors_only_outer_keyword() {
    let out = FormatStyle::Highlight.formatter().format("SELECT 'SELECT' FROM t");
    assert_eq!(out.matches("\x1b[34m").count(), 2);
    assert!(out.starts_with("\x1b[34mSELECT\x1b[0m"));
    assert!(out.contains("\x1b[36m'SELECT'\x1b[0m"));
    assert_eq!(strip_ansi(&out), "SELECT 'SELECT' FROM t");
}

#[test]
fn test_format_script_detects_style_per_statement() {
    let source = "create table person (id bigint not null, name varchar(255), primary key (id));\nselect p.name from person p where p.id = ?;\n";
    let expected = "    create table person (
        id bigint not null,
        name varchar(255),
        primary key (id)
    );
    select
        p.name
    from
        person p
    where
        p.id = ?;
";
    assert_eq!(format_string(source, &Mode::default()).unwrap(), expected);
}

#[test]
fn test_format_script_reformat_keeps_tokens() {
    let source = QUERIES.join(";\n");
    let once = format_string(&source, &Mode::default()).unwrap();
    let twice = format_string(&once, &Mode::default()).unwrap();
    assert_eq!(significant_tokens(&once), significant_tokens(&source));
    assert_eq!(significant_tokens(&twice), significant_tokens(&once));
}

#[test]
fn test_style_none_only_normalizes_statement_boundaries() {
    let result = format_string("  select  a\n  from t ;select 1", &mode("none")).unwrap();
    assert_eq!(result, "select  a\n  from t;\nselect 1\n");
}

#[test]
fn test_highlight_style_keeps_layout() {
    let result = format_string("select 'a' from t;", &mode("highlight")).unwrap();
    assert_eq!(strip_ansi(&result), "select 'a' from t;\n");
    assert!(result.contains("\x1b[36m'a'\x1b[0m"));
}

#[test]
fn test_unknown_style_is_config_error() {
    let err = format_string("select 1", &mode("pretty")).unwrap_err();
    assert!(err.to_string().contains("Unknown format style"));
}

/// Keywords, punctuation, literals and comments that steer the formatters.
const FRAGMENTS: &[&str] = &[
    "select", "from", "where", "and", "or", "on", "left", "join", "case", "when", "then",
    "else", "end", "trim", "extract", "between", "values", "insert", "into", "update", "set",
    "group", "by", "order", "union", "add", "drop", "is", "(", ")", ",", "=", "-", "'x, y'",
    "'a  '", "\"q\"", "[b)]", "-- c, add\n", "-- from (x   \n", "/* a, (b) is */", "a", "b1",
    "t.c", "42", "\n", "\t",
];

/// Unterminated quotes and comments that run to the end of the input.
const TAILS: &[&str] = &["'abc   ", "/* open  ", "-- note  ", "\"q  "];

/// Statement openers that route a generated body to each formatter.
const LEADS: &[&str] = &["select ", "create table t (", "alter table t ", "comment on table t is ", ""];

fn arb_fragments() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..40).prop_map(|parts| parts.join(" "))
}

fn arb_sql() -> impl Strategy<Value = String> {
    (arb_fragments(), prop::option::of(prop::sample::select(TAILS))).prop_map(|(mut sql, tail)| {
        if let Some(tail) = tail {
            sql.push(' ');
            sql.push_str(tail);
        }
        sql
    })
}

fn assert_tokens_kept(style: FormatStyle, sql: &str) -> Result<(), TestCaseError> {
    let formatter = style.formatter();
    let once = formatter.format(sql);
    prop_assert_eq!(significant_tokens(&once), significant_tokens(sql));
    let twice = formatter.format(&once);
    prop_assert_eq!(significant_tokens(&twice), significant_tokens(&once));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn test_generated_basic_input_keeps_tokens(sql in arb_sql()) {
        assert_tokens_kept(FormatStyle::Basic, &sql)?;
    }

    #[test]
    fn test_generated_create_table_keeps_tokens(body in arb_sql()) {
        assert_tokens_kept(FormatStyle::Ddl, &format!("create table t ({body}"))?;
    }

    #[test]
    fn test_generated_alter_table_keeps_tokens(body in arb_sql()) {
        assert_tokens_kept(FormatStyle::Ddl, &format!("alter table t {body}"))?;
    }

    #[test]
    fn test_generated_comment_on_keeps_tokens(body in arb_sql()) {
        assert_tokens_kept(FormatStyle::Ddl, &format!("comment on column t.a is {body}"))?;
    }

    #[test]
    fn test_generated_script_keeps_statements(
        statements in prop::collection::vec(
            (arb_fragments(), prop::sample::select(LEADS)),
            1..4,
        )
    ) {
        let source: String = statements
            .iter()
            .map(|(body, lead)| format!("{lead}{body};\n"))
            .collect();
        let out = format_string(&source, &Mode::default()).unwrap();
        let before = split_statements(&source);
        let after = split_statements(&out);
        prop_assert_eq!(before.len(), after.len(), "{}", out);
        for (a, b) in before.iter().zip(&after) {
            prop_assert_eq!(significant_tokens(a.text), significant_tokens(b.text));
            prop_assert_eq!(a.terminated, b.terminated);
        }
    }
}
