//! Schema Validation
//!
//! Applies a compiled [`Schema`] to a parsed [`Document`] and turns libxml2's structured
//! diagnostics into an ordered, immutable [`ValidationOutcome`].
//!
//! - Each call creates its own libxml2 validation context, so one `Validator` can serve any
//!   number of threads against a shared schema.
//! - Only error-level diagnostics count as violations; warnings go to `tracing` at debug level.
//! - Violations are stably sorted by line, so ties keep libxml2's reporting order.
//! - The validator never writes to the report log; that is the caller's job.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LibXml2Error, LibXml2Result};
use crate::libxml2::{CapturedError, LibXml2Wrapper, ValidationResult, XML_ERR_ERROR};
use crate::parser::Document;
use crate::schema::Schema;

/// Severity of a schema violation; the model only knows errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// 1-based line in the source document
    pub line: u32,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line: line.max(1),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Result of validating one document
///
/// `passed` is true exactly when `errors` is empty; the only constructor enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    passed: bool,
    errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    /// Build an outcome, sorting errors by line while keeping ties in their given order
    pub fn from_errors(mut errors: Vec<ValidationError>) -> Self {
        errors.sort_by_key(|e| e.line);
        Self {
            passed: errors.is_empty(),
            errors,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Validates documents against a schema
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    libxml2: LibXml2Wrapper,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
        }
    }

    /// Validate `document` against `schema`
    ///
    /// Schema violations are data in the returned outcome, never `Err`.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error` when libxml2 cannot set up or complete validation at all.
    pub fn validate(
        &self,
        schema: &Schema,
        document: &Document,
    ) -> LibXml2Result<ValidationOutcome> {
        let result = self
            .libxml2
            .validate_document(schema.compiled(), document.tree())?;

        let outcome = match result {
            ValidationResult::Valid => ValidationOutcome::from_errors(Vec::new()),
            ValidationResult::Invalid {
                error_count,
                errors,
            } => {
                let mut violations = collect_violations(document, errors);
                if violations.is_empty() {
                    // libxml2 reported invalidity without a diagnostic at error level
                    violations.push(ValidationError::new(
                        document.root_line().unwrap_or(1),
                        format!(
                            "Document failed schema validation ({error_count} error(s) reported without details)"
                        ),
                    ));
                }
                ValidationOutcome::from_errors(violations)
            }
            ValidationResult::InternalError { code } => {
                return Err(LibXml2Error::InternalError { code });
            }
        };

        Ok(outcome)
    }
}

fn collect_violations(document: &Document, captured: Vec<CapturedError>) -> Vec<ValidationError> {
    captured
        .into_iter()
        .filter_map(|err| {
            if err.level < XML_ERR_ERROR {
                debug!(
                    path = %document.path().display(),
                    line = err.line,
                    "schema validation warning: {}",
                    err.message
                );
                return None;
            }
            Some(ValidationError::new(err.line, err.message))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DocumentParser;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const PEOPLE_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="people">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="person" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="name" type="xs:string"/>
              <xs:element name="age" type="xs:nonNegativeInteger"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn setup() -> (TempDir, Schema) {
        let temp_dir = TempDir::new().unwrap();
        let xsd = temp_dir.path().join("people.xsd");
        std::fs::write(&xsd, PEOPLE_XSD).unwrap();
        let schema = Schema::load(&xsd).unwrap();
        (temp_dir, schema)
    }

    fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_conforming_document_passes() {
        let (temp_dir, schema) = setup();
        let path = write_doc(
            temp_dir.path(),
            "ok.xml",
            "<people>\n<person><name>Ann</name><age>30</age></person>\n</people>\n",
        );
        let doc = DocumentParser::new(false).parse(&path).unwrap();

        let outcome = Validator::new().validate(&schema, &doc).unwrap();
        assert!(outcome.passed());
        assert!(outcome.errors().is_empty());
    }

    #[test]
    fn test_violations_are_line_sorted() {
        let (temp_dir, schema) = setup();
        let path = write_doc(
            temp_dir.path(),
            "bad.xml",
            "<people>\n<person><name>Ann</name><age>-1</age></person>\n<person><name>Bob</name><age>x</age></person>\n</people>\n",
        );
        let doc = DocumentParser::new(false).parse(&path).unwrap();

        let outcome = Validator::new().validate(&schema, &doc).unwrap();
        assert!(!outcome.passed());
        assert!(outcome.error_count() >= 2);
        assert!(outcome.errors().iter().all(|e| e.line >= 1));
        assert!(outcome.errors().windows(2).all(|w| w[0].line <= w[1].line));
        assert_eq!(outcome.errors()[0].line, 2);
        assert!(
            outcome
                .errors()
                .iter()
                .all(|e| e.severity == Severity::Error)
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let (temp_dir, schema) = setup();
        let path = write_doc(
            temp_dir.path(),
            "bad.xml",
            "<people>\n<person><age>1</age></person>\n</people>\n",
        );
        let validator = Validator::new();

        let first = validator
            .validate(&schema, &DocumentParser::new(false).parse(&path).unwrap())
            .unwrap();
        let second = validator
            .validate(&schema, &DocumentParser::new(false).parse(&path).unwrap())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_outcome_invariant() {
        let empty = ValidationOutcome::from_errors(vec![]);
        assert!(empty.passed());

        let failed = ValidationOutcome::from_errors(vec![
            ValidationError::new(7, "b"),
            ValidationError::new(3, "a"),
            ValidationError::new(7, "c"),
        ]);
        assert!(!failed.passed());
        let messages: Vec<_> = failed.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_line_zero_is_clamped() {
        assert_eq!(ValidationError::new(0, "no line").line, 1);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&ValidationError::new(4, "oops")).unwrap();
        assert!(json.contains(r#""severity":"error""#));
        assert!(json.contains(r#""line":4"#));
    }
}
