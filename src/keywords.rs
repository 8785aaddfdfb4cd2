use phf::{phf_set, Set};

/// Words after which an opening paren does not start a function call.
pub static NON_FUNCTION_NAMES: Set<&'static str> = phf_set! {
    "select", "from", "on", "set", "and", "or", "where", "having", "by", "using",
};

/// Words that start a clause without forcing a line break after them.
pub static BEGIN_CLAUSES: Set<&'static str> = phf_set! {
    "left", "right", "full", "inner", "outer", "cross", "group", "order", "returning", "using",
};

/// Words that end the previous clause and start their own indented body.
pub static END_CLAUSES: Set<&'static str> = phf_set! {
    "where", "set", "having", "by", "join", "into", "union", "intersect", "offset", "limit",
    "fetch",
};

pub static DML: Set<&'static str> = phf_set! {
    "merge", "insert", "update", "delete",
};

/// ALTER TABLE words preceded by a line break in DDL output.
pub static DDL_BREAKS: Set<&'static str> = phf_set! {
    "drop", "alter", "modify", "add", "references", "foreign", "on",
};

/// ANSI SQL 2003 reserved words plus common extensions.
pub static HIGHLIGHT_KEYWORDS: Set<&'static str> = phf_set! {
    "add", "all", "allocate", "alter", "and", "any", "are", "array", "as", "asensitive",
    "asymmetric", "at", "atomic", "authorization", "begin", "between", "bigint", "binary",
    "blob", "both", "by", "call", "called", "cascaded", "case", "cast", "char",
    "character", "check", "clob", "close", "collate", "column", "commit", "condition",
    "connect", "constraint", "continue", "corresponding", "create", "cross", "cube",
    "current", "current_date", "current_default_transform_group", "current_path",
    "current_role", "current_time", "current_timestamp",
    "current_transform_group_for_type", "current_user", "cursor", "cycle", "date", "day",
    "deallocate", "dec", "decimal", "declare", "default", "delete", "deref", "describe",
    "deterministic", "disconnect", "distinct", "do", "double", "drop", "dynamic", "each",
    "element", "else", "elseif", "end", "escape", "except", "exec", "execute", "exists",
    "exit", "external", "false", "fetch", "filter", "float", "for", "foreign", "free",
    "from", "full", "function", "get", "global", "grant", "group", "grouping", "handler",
    "having", "hold", "hour", "identity", "if", "immediate", "in", "indicator", "inner",
    "inout", "input", "insensitive", "insert", "int", "integer", "intersect", "interval",
    "into", "is", "iterate", "join", "language", "large", "lateral", "leading", "leave",
    "left", "like", "local", "localtime", "localtimestamp", "loop", "match", "member",
    "merge", "method", "minute", "modifies", "module", "month", "multiset", "national",
    "natural", "nchar", "nclob", "new", "no", "none", "not", "null", "numeric", "of",
    "old", "on", "only", "open", "or", "order", "out", "outer", "output", "over",
    "overlaps", "parameter", "partition", "precision", "prepare", "primary", "procedure",
    "range", "reads", "real", "recursive", "ref", "references", "referencing", "release",
    "repeat", "resignal", "result", "return", "returns", "revoke", "right", "rollback",
    "rollup", "row", "rows", "savepoint", "scroll", "search", "second", "select",
    "sensitive", "session_user", "set", "signal", "similar", "smallint", "some",
    "specific", "specifictype", "sql", "sqlexception", "sqlstate", "sqlwarning", "start",
    "static", "submultiset", "symmetric", "system", "system_user", "table", "tablesample",
    "then", "time", "timestamp", "timezone_hour", "timezone_minute", "to", "trailing",
    "translation", "treat", "trigger", "true", "undo", "union", "unique", "unknown",
    "unnest", "until", "update", "user", "using", "value", "values", "varchar", "varying",
    "when", "whenever", "where", "while", "window", "with", "within", "without", "year",
    "key", "sequence", "cascade", "increment", "boolean", "offset", "first", "next",
    "returning",
};

/// Whether a (lowercased) token is identifier-like and not a clause word, so
/// that a following `(` opens a function call.
pub fn is_function_name(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    let identifier_like = first.is_alphabetic() || first == '_' || first == '$' || first == '"';
    identifier_like && !NON_FUNCTION_NAMES.contains(token)
}
