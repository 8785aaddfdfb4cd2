use crate::basic::BasicFormatter;
use crate::ddl::DdlFormatter;
use crate::error::SqlshapeError;
use crate::highlight::HighlightingFormatter;

/// A pure text transform over one SQL statement. Formatters are total: any
/// input, however malformed, produces output.
pub trait Formatter: Send + Sync {
    fn format(&self, source: &str) -> String;
}

/// Returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFormatter;

impl Formatter for NoFormatter {
    fn format(&self, source: &str) -> String {
        source.to_string()
    }
}

static BASIC: BasicFormatter = BasicFormatter;
static DDL: DdlFormatter = DdlFormatter;
static HIGHLIGHT: HighlightingFormatter = HighlightingFormatter::DEFAULT;
static NONE: NoFormatter = NoFormatter;

/// Which formatter renders a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatStyle {
    Basic,
    Ddl,
    Highlight,
    None,
}

impl FormatStyle {
    /// The shared formatter instance for this style.
    pub fn formatter(self) -> &'static dyn Formatter {
        match self {
            FormatStyle::Basic => &BASIC,
            FormatStyle::Ddl => &DDL,
            FormatStyle::Highlight => &HIGHLIGHT,
            FormatStyle::None => &NONE,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SqlshapeError> {
        match name.to_ascii_lowercase().as_str() {
            "basic" => Ok(FormatStyle::Basic),
            "ddl" => Ok(FormatStyle::Ddl),
            "highlight" => Ok(FormatStyle::Highlight),
            "none" => Ok(FormatStyle::None),
            _ => Err(SqlshapeError::Config(format!("Unknown format style: {}", name))),
        }
    }

    /// Schema statements get the DDL formatter, everything else the basic
    /// one.
    pub fn detect(sql: &str) -> Self {
        let mut words = sql.split_whitespace();
        let first = words.next().unwrap_or_default();
        if ["create", "alter", "drop"]
            .iter()
            .any(|kw| first.eq_ignore_ascii_case(kw))
        {
            return FormatStyle::Ddl;
        }
        if first.eq_ignore_ascii_case("comment")
            && words.next().is_some_and(|w| w.eq_ignore_ascii_case("on"))
        {
            return FormatStyle::Ddl;
        }
        FormatStyle::Basic
    }
}
