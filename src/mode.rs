use serde::Deserialize;

use crate::error::SqlshapeError;
use crate::style::FormatStyle;

/// Mode holds all formatting configuration for sqlshape.
#[derive(Debug, Clone, Deserialize)]
pub struct Mode {
    /// `basic`, `ddl`, `highlight`, `none`, or `auto` to pick per statement.
    #[serde(default = "default_style")]
    pub style_name: String,

    /// Wrap keywords and literals in ANSI colors after formatting.
    #[serde(default)]
    pub highlight: bool,

    #[serde(default)]
    pub check: bool,

    #[serde(default)]
    pub diff: bool,

    /// Skip safety equivalence check for faster operation.
    #[serde(default)]
    pub fast: bool,

    /// Glob patterns to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub no_progressbar: bool,

    #[serde(default)]
    pub no_color: bool,

    #[serde(default)]
    pub force_color: bool,

    /// Number of threads for parallel processing (0 = all cores).
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub single_process: bool,
}

fn default_style() -> String {
    "auto".to_string()
}

impl Mode {
    /// The style for one statement. `auto` detects it from the statement.
    pub fn style(&self, sql: &str) -> Result<FormatStyle, SqlshapeError> {
        if self.style_name.eq_ignore_ascii_case("auto") {
            Ok(FormatStyle::detect(sql))
        } else {
            FormatStyle::from_name(&self.style_name)
        }
    }

    /// Whether color output is enabled.
    pub fn color(&self) -> bool {
        if self.force_color {
            return true;
        }
        if self.no_color {
            return false;
        }
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }
        true
    }

    /// Whether safety check should be performed.
    pub fn should_safety_check(&self) -> bool {
        !self.fast && !self.check && !self.diff
    }

    /// SQL file extensions to process.
    pub fn sql_extensions(&self) -> &[&str] {
        &["sql", "ddl", "dml"]
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self {
            style_name: default_style(),
            highlight: false,
            check: false,
            diff: false,
            fast: false,
            exclude: Vec::new(),
            verbose: false,
            quiet: false,
            no_progressbar: false,
            no_color: false,
            force_color: false,
            threads: 0,
            single_process: false,
        }
    }
}
