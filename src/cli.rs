use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary format printed on stdout after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Human,
    /// Machine-readable JSON report
    Json,
}

/// Batch XML Schema validation
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-xml-batch")]
#[command(about = "Validate a batch of XML documents against one XSD schema")]
#[command(version)]
pub struct Cli {
    /// XML files or directories to validate
    #[arg(default_value = "data")]
    pub inputs: Vec<PathBuf>,

    /// XSD schema every document is validated against
    #[arg(short = 's', long = "schema", default_value = "xml_schema.xsd")]
    pub schema: PathBuf,

    /// File-name glob applied inside directories
    #[arg(short = 'p', long = "pattern", help = "File-name glob (default: *.xml)")]
    pub pattern: Option<String>,

    /// Descend into sub-directories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Lift parser depth and size limits for very large documents
    #[arg(long = "large-documents")]
    pub large_documents: bool,

    /// Request DTD validation (kept for compatibility; XSD results are unaffected)
    #[arg(long = "validate-dtd")]
    pub validate_dtd: bool,

    /// Files validated at once (1 = sequential, 0 = one per CPU)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Summary format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Suppress the summary
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
