//! Deprecated-API migration for Jupyter notebooks.
//!
//! Scans code cells for deprecated usages, asks a text-generation service
//! for a rewrite, validates the answer and writes it back, either into the
//! cell or as a patch applied by an external program.

pub mod apply;
pub mod client;
pub mod config;
pub mod error;
pub mod notebook;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod validate;
pub mod warnings;

pub use client::MistralClient;
pub use client::TextGenerator;
pub use config::MigrateConfig;
pub use config::OutputMode;
pub use config::ScanStrategy;
pub use config::ServiceConfig;
pub use error::GenerateError;
pub use error::MigrateError;
pub use error::Result;
pub use notebook::Notebook;
pub use pipeline::Migrator;
pub use report::RunReport;
pub use report::RunStats;
pub use rules::DeprecationRule;
pub use rules::RuleSet;
