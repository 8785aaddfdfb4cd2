pub mod api;
pub mod basic;
pub mod config;
pub mod ddl;
pub mod error;
pub mod highlight;
pub mod jdbc;
pub mod keywords;
pub mod mode;
pub mod report;
pub mod statement_logger;
pub mod style;
pub mod token;

// Re-export the main public API
pub use api::{format_string, get_matching_paths, run};
pub use config::{load_config, load_jdbc_settings};
pub use error::{Result, SqlshapeError};
pub use mode::Mode;
pub use style::{FormatStyle, Formatter};
