//! # validate-xml-batch Library
//!
//! Batch XML Schema (XSD 1.0) validation on top of libxml2: compile one schema, then run
//! every input document through guard → parse → validate → report, isolating failures per
//! file and reporting structured, line-numbered diagnostics.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_discovery;
pub mod guard;
pub mod libxml2;
pub mod log_sink;
pub mod output;
pub mod parser;
pub mod schema;
pub mod validator;

pub use batch::{
    BatchOptions, BatchReport, BatchRunner, CancellationToken, FileRecord, FileStatus, SkipReason,
};
pub use cli::{Cli, OutputFormat};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use error::{DiscoveryError, LibXml2Error, ParseError, SchemaLoadError};
pub use file_discovery::FileDiscovery;
pub use guard::ReadabilityGuard;
pub use libxml2::LibXml2Wrapper;
pub use log_sink::{LogEvent, LogLevel, LogSink, MemorySink, NullSink, WriterSink};
pub use output::Output;
pub use parser::{Document, DocumentParser};
pub use schema::Schema;
pub use validator::{Severity, ValidationError, ValidationOutcome, Validator};
