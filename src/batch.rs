//! Batch Runner
//!
//! Drives every input path through the per-file pipeline:
//!
//! ```text
//! guard → parse → validate → report
//! ```
//!
//! A failure in one file never stops the batch. Unreadable files and files that are not
//! well-formed become skip records; schema violations become a failed `ValidationOutcome`.
//! Only cancellation ends a batch early.
//!
//! Two schedules produce identical reports:
//! - **Sequential** (`run`, `run_with_cancel`): each file completes before the next starts.
//! - **Concurrent** (`run_concurrent`): semaphore-bounded tokio tasks run the pipeline on the
//!   blocking pool; each task buffers its log events and the runner replays records and
//!   events in input order once all tasks finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Level, debug, error, info};

use crate::guard::ReadabilityGuard;
use crate::log_sink::{LogEvent, LogSink};
use crate::parser::DocumentParser;
use crate::schema::Schema;
use crate::validator::{ValidationOutcome, Validator};

/// Options shared by every file in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Relax libxml2's depth and size limits for very large inputs
    pub allow_large_documents: bool,
    /// Accepted for parity with DTD-aware drivers; XSD outcomes do not depend on it
    pub validate_dtd: bool,
    /// Upper bound on files in flight for `run_concurrent`
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            allow_large_documents: false,
            validate_dtd: false,
            max_concurrency: 1,
        }
    }
}

/// Cooperative cancellation flag, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a file produced no validation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    Unreadable,
    NotWellFormed { line: u32, message: String },
    ValidatorFailure { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileStatus {
    Validated(ValidationOutcome),
    Skipped(SkipReason),
}

/// What happened to one input path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileRecord {
    pub fn validated(path: PathBuf, outcome: ValidationOutcome) -> Self {
        Self {
            path,
            status: FileStatus::Validated(outcome),
        }
    }

    pub fn skipped_with(path: PathBuf, reason: SkipReason) -> Self {
        Self {
            path,
            status: FileStatus::Skipped(reason),
        }
    }

    pub fn skipped(&self) -> bool {
        matches!(self.status, FileStatus::Skipped(_))
    }

    pub fn outcome(&self) -> Option<&ValidationOutcome> {
        match &self.status {
            FileStatus::Validated(outcome) => Some(outcome),
            FileStatus::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            FileStatus::Skipped(reason) => Some(reason),
            FileStatus::Validated(_) => None,
        }
    }

    /// True only for a validated file without violations
    pub fn passed(&self) -> bool {
        self.outcome().is_some_and(ValidationOutcome::passed)
    }
}

/// Records of one batch run, in input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub records: Vec<FileRecord>,
    /// Set when cancellation left some inputs unattempted. The records then cover a prefix
    /// of the inputs; the remaining paths were never started.
    pub cancelled: bool,
    pub duration: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn passed_count(&self) -> usize {
        self.records.iter().filter(|r| r.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome().is_some_and(|o| !o.passed()))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records.iter().filter(|r| r.skipped()).count()
    }

    /// Schema violations across all validated files
    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter_map(FileRecord::outcome)
            .map(ValidationOutcome::error_count)
            .sum()
    }

    pub fn all_passed(&self) -> bool {
        !self.cancelled && self.failed_count() == 0 && self.skipped_count() == 0
    }

    /// 0 when every input passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() { 0 } else { 1 }
    }
}

/// Runs the validation pipeline over a list of paths against one shared schema
pub struct BatchRunner {
    schema: Arc<Schema>,
    options: BatchOptions,
    sink: Arc<dyn LogSink>,
    parser: DocumentParser,
    validator: Validator,
}

impl BatchRunner {
    pub fn new(schema: Arc<Schema>, options: BatchOptions, sink: Arc<dyn LogSink>) -> Self {
        if options.validate_dtd {
            debug!("DTD validation requested; XSD outcomes are unaffected");
        }

        Self {
            schema,
            options,
            sink,
            parser: DocumentParser::new(options.allow_large_documents),
            validator: Validator::new(),
        }
    }

    /// Validate every path in order, one at a time
    pub fn run(&self, paths: &[PathBuf]) -> BatchReport {
        self.run_with_cancel(paths, &CancellationToken::new())
    }

    /// Sequential run that stops before the next file once `token` is cancelled
    pub fn run_with_cancel(&self, paths: &[PathBuf], token: &CancellationToken) -> BatchReport {
        let start = Instant::now();
        let mut records = Vec::with_capacity(paths.len());
        let mut cancelled = false;

        for path in paths {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let (record, events) = process_file(&self.schema, self.parser, self.validator, path);
            self.emit_all(events);
            records.push(record);
        }

        self.finish(records, cancelled, start)
    }

    /// Validate paths concurrently, reporting in input order
    ///
    /// At most `max_concurrency` files are parsed or validated at once. Permits are taken in
    /// input order and the token is checked after each one, so a cancelled report holds a
    /// prefix of `paths`. Files already in flight finish.
    pub async fn run_concurrent(
        &self,
        paths: &[PathBuf],
        token: &CancellationToken,
    ) -> BatchReport {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = Vec::with_capacity(paths.len());
        let mut cancelled = false;

        for path in paths {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                cancelled = true;
                break;
            };
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let schema = Arc::clone(&self.schema);
            let parser = self.parser;
            let validator = self.validator;
            let task_path = path.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                tokio::task::spawn_blocking(move || {
                    process_file(&schema, parser, validator, &task_path)
                })
                .await
            });
            let key = path.clone();
            tasks.push(async move { (key, handle.await) });
        }

        // join_all yields outputs in spawn order, which is input order
        let outputs = join_all(tasks).await;

        let mut records = Vec::with_capacity(outputs.len());
        for (path, output) in outputs {
            let (record, events) = match output {
                Ok(Ok(done)) => done,
                Ok(Err(e)) | Err(e) => task_failure(path, &e),
            };
            self.emit_all(events);
            records.push(record);
        }

        self.finish(records, cancelled, start)
    }

    fn emit_all(&self, events: Vec<LogEvent>) {
        for event in events {
            self.sink.emit(event);
        }
    }

    fn finish(&self, records: Vec<FileRecord>, cancelled: bool, start: Instant) -> BatchReport {
        let report = BatchReport {
            records,
            cancelled,
            duration: start.elapsed(),
        };
        info!(
            files = report.total(),
            passed = report.passed_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            cancelled = report.cancelled,
            "batch finished"
        );
        report
    }
}

/// Record for a file whose pipeline task panicked or was aborted
fn task_failure(path: PathBuf, err: &tokio::task::JoinError) -> (FileRecord, Vec<LogEvent>) {
    let message = format!("validation task failed: {err}");
    error!(path = %path.display(), "{}", message);
    let event = LogEvent::error(format!(
        "VALIDATOR FAILURE: [{}] - {}",
        path.display(),
        message
    ));
    let record = FileRecord::skipped_with(path, SkipReason::ValidatorFailure { message });
    (record, vec![event])
}

/// The per-file pipeline: a function of schema, parser mode and path
///
/// Returns the record together with the log events it produced, in emission order.
fn process_file(
    schema: &Schema,
    parser: DocumentParser,
    validator: Validator,
    path: &Path,
) -> (FileRecord, Vec<LogEvent>) {
    let shown = path.display();
    let mut events = Vec::new();

    if !ReadabilityGuard::is_readable(path) {
        events.push(LogEvent::warning(format!(
            "Cannot read from XML file: {shown}"
        )));
        return (
            FileRecord::skipped_with(path.to_path_buf(), SkipReason::Unreadable),
            events,
        );
    }

    events.push(LogEvent::info(format!("PROCESSING: [{shown}]")));

    let document = match parser.parse(path) {
        Ok(document) => document,
        Err(e) => {
            let line = e.line().unwrap_or(1);
            let message = e.details();
            events.push(LogEvent::error(format!(
                "NOT WELL-FORMED: [{shown} - L:{line}] - {message}"
            )));
            events.push(LogEvent::info(format!("FINISHED: [{shown}]")));
            return (
                FileRecord::skipped_with(
                    path.to_path_buf(),
                    SkipReason::NotWellFormed { line, message },
                ),
                events,
            );
        }
    };

    if tracing::enabled!(Level::DEBUG) {
        debug!(path = %path.display(), elements = document.node_count(), "document parsed");
    }

    let record = match validator.validate(schema, &document) {
        Ok(outcome) => {
            if outcome.passed() {
                events.push(LogEvent::info(format!(
                    "SUCCESS: [{shown}] Validation was successful!"
                )));
            } else {
                for err in outcome.errors() {
                    events.push(LogEvent::error(format!(
                        "[{shown} - L:{}] - {}",
                        err.line, err.message
                    )));
                }
            }
            FileRecord::validated(path.to_path_buf(), outcome)
        }
        Err(e) => {
            let message = e.to_string();
            events.push(LogEvent::error(format!(
                "VALIDATOR FAILURE: [{shown}] - {message}"
            )));
            FileRecord::skipped_with(
                path.to_path_buf(),
                SkipReason::ValidatorFailure { message },
            )
        }
    };

    events.push(LogEvent::info(format!("FINISHED: [{shown}]")));
    (record, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::{LogLevel, MemorySink};
    use crate::validator::ValidationError;
    use tempfile::TempDir;

    const ITEM_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="item" type="xs:integer"/>
</xs:schema>"#;

    struct Fixture {
        dir: TempDir,
        schema: Arc<Schema>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let xsd = dir.path().join("item.xsd");
            std::fs::write(&xsd, ITEM_XSD).unwrap();
            let schema = Arc::new(Schema::load(&xsd).unwrap());
            Self { dir, schema }
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn runner(&self, sink: Arc<MemorySink>) -> BatchRunner {
            BatchRunner::new(Arc::clone(&self.schema), BatchOptions::default(), sink)
        }
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_file_record_accessors() {
        let passed = FileRecord::validated(
            PathBuf::from("a.xml"),
            ValidationOutcome::from_errors(vec![]),
        );
        assert!(!passed.skipped());
        assert!(passed.passed());
        assert!(passed.skip_reason().is_none());

        let failed = FileRecord::validated(
            PathBuf::from("b.xml"),
            ValidationOutcome::from_errors(vec![ValidationError::new(2, "bad")]),
        );
        assert!(!failed.passed());
        assert_eq!(failed.outcome().map(|o| o.error_count()), Some(1));

        let skipped = FileRecord::skipped_with(PathBuf::from("c.xml"), SkipReason::Unreadable);
        assert!(skipped.skipped());
        assert!(skipped.outcome().is_none());
        assert_eq!(skipped.skip_reason(), Some(&SkipReason::Unreadable));
    }

    #[test]
    fn test_report_counters_and_exit_code() {
        let report = BatchReport {
            records: vec![
                FileRecord::validated(
                    PathBuf::from("a.xml"),
                    ValidationOutcome::from_errors(vec![]),
                ),
                FileRecord::validated(
                    PathBuf::from("b.xml"),
                    ValidationOutcome::from_errors(vec![
                        ValidationError::new(2, "x"),
                        ValidationError::new(3, "y"),
                    ]),
                ),
                FileRecord::skipped_with(PathBuf::from("c.xml"), SkipReason::Unreadable),
            ],
            cancelled: false,
            duration: Duration::from_millis(5),
        };

        assert_eq!(report.total(), 3);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.error_count(), 2);
        assert!(!report.all_passed());
        assert_eq!(report.exit_code(), 1);

        let empty = BatchReport {
            records: vec![],
            cancelled: false,
            duration: Duration::ZERO,
        };
        assert!(empty.all_passed());
        assert_eq!(empty.exit_code(), 0);
    }

    #[test]
    fn test_run_logs_each_stage() {
        let fixture = Fixture::new();
        let good = fixture.file("good.xml", "<item>42</item>");
        let bad = fixture.file("bad.xml", "<item>forty-two</item>");
        let sink = Arc::new(MemorySink::new());

        let report = fixture
            .runner(Arc::clone(&sink))
            .run(&[good.clone(), bad.clone()]);

        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);

        let lines = sink.lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[0],
            (LogLevel::Info, format!("PROCESSING: [{}]", good.display()))
        );
        assert_eq!(
            lines[1],
            (
                LogLevel::Info,
                format!("SUCCESS: [{}] Validation was successful!", good.display())
            )
        );
        assert_eq!(
            lines[2],
            (LogLevel::Info, format!("FINISHED: [{}]", good.display()))
        );
        assert_eq!(lines[4].0, LogLevel::Error);
        assert!(
            lines[4]
                .1
                .starts_with(&format!("[{} - L:1] - ", bad.display()))
        );
        assert_eq!(
            lines[5],
            (LogLevel::Info, format!("FINISHED: [{}]", bad.display()))
        );
    }

    #[test]
    fn test_unreadable_file_is_skipped_without_processing_line() {
        let fixture = Fixture::new();
        let missing = fixture.dir.path().join("missing.xml");
        let sink = Arc::new(MemorySink::new());

        let report = fixture.runner(Arc::clone(&sink)).run(&[missing.clone()]);

        assert_eq!(
            report.records[0].skip_reason(),
            Some(&SkipReason::Unreadable)
        );
        assert_eq!(
            sink.lines(),
            vec![(
                LogLevel::Warning,
                format!("Cannot read from XML file: {}", missing.display())
            )]
        );
    }

    #[test]
    fn test_malformed_file_is_skipped_and_finished() {
        let fixture = Fixture::new();
        let broken = fixture.file("broken.xml", "<item>1");
        let sink = Arc::new(MemorySink::new());

        let report = fixture.runner(Arc::clone(&sink)).run(&[broken.clone()]);

        assert!(matches!(
            report.records[0].skip_reason(),
            Some(SkipReason::NotWellFormed { .. })
        ));
        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].1.starts_with("NOT WELL-FORMED: ["));
        assert_eq!(
            lines[2],
            (LogLevel::Info, format!("FINISHED: [{}]", broken.display()))
        );
    }

    #[test]
    fn test_pre_cancelled_sequential_run_is_empty() {
        let fixture = Fixture::new();
        let good = fixture.file("good.xml", "<item>1</item>");
        let sink = Arc::new(MemorySink::new());
        let token = CancellationToken::new();
        token.cancel();

        let report = fixture
            .runner(Arc::clone(&sink))
            .run_with_cancel(&[good], &token);

        assert!(report.cancelled);
        assert!(report.records.is_empty());
        assert!(sink.is_empty());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let fixture = Fixture::new();
        let paths: Vec<PathBuf> = (0..12)
            .map(|i| {
                let content = if i % 3 == 0 {
                    "<item>oops</item>".to_string()
                } else {
                    format!("<item>{i}</item>")
                };
                fixture.file(&format!("doc{i:02}.xml"), &content)
            })
            .collect();

        let sequential_sink = Arc::new(MemorySink::new());
        let sequential = fixture.runner(Arc::clone(&sequential_sink)).run(&paths);

        let concurrent_sink = Arc::new(MemorySink::new());
        let runner = BatchRunner::new(
            Arc::clone(&fixture.schema),
            BatchOptions {
                max_concurrency: 4,
                ..BatchOptions::default()
            },
            concurrent_sink.clone(),
        );
        let concurrent = runner
            .run_concurrent(&paths, &CancellationToken::new())
            .await;

        assert_eq!(sequential.records, concurrent.records);
        assert_eq!(sequential_sink.lines(), concurrent_sink.lines());
        assert!(!concurrent.cancelled);
    }

    #[tokio::test]
    async fn test_concurrent_pre_cancelled_is_empty() {
        let fixture = Fixture::new();
        let good = fixture.file("good.xml", "<item>1</item>");
        let token = CancellationToken::new();
        token.cancel();

        let report = fixture
            .runner(Arc::new(MemorySink::new()))
            .run_concurrent(&[good], &token)
            .await;

        assert!(report.cancelled);
        assert!(report.records.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_concurrent_run_keeps_input_prefix() {
        let fixture = Fixture::new();
        let paths: Vec<PathBuf> = (0..40)
            .map(|i| fixture.file(&format!("doc{i:02}.xml"), &format!("<item>{i}</item>")))
            .collect();
        let token = CancellationToken::new();
        let runner = BatchRunner::new(
            Arc::clone(&fixture.schema),
            BatchOptions {
                max_concurrency: 2,
                ..BatchOptions::default()
            },
            Arc::new(MemorySink::new()),
        );

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                token.cancel();
            })
        };
        let report = runner.run_concurrent(&paths, &token).await;
        canceller.await.unwrap();

        let attempted: Vec<PathBuf> = report.records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(attempted, paths[..attempted.len()].to_vec());
        assert!(report.cancelled || attempted.len() == paths.len());
        assert!(report.records.iter().all(FileRecord::passed));
    }

    #[tokio::test]
    async fn test_task_failure_becomes_validator_failure_record() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let join_error = handle.await.unwrap_err();

        let (record, events) = task_failure(PathBuf::from("lost.xml"), &join_error);

        match record.skip_reason() {
            Some(SkipReason::ValidatorFailure { message }) => {
                assert!(message.starts_with("validation task failed"));
            }
            other => panic!("Expected ValidatorFailure, got {:?}", other),
        }
        assert_eq!(record.path, PathBuf::from("lost.xml"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, LogLevel::Error);
        assert!(events[0].message.starts_with("VALIDATOR FAILURE: [lost.xml] - "));
    }

    #[test]
    fn test_record_serializes_with_status_tag() {
        let record = FileRecord::skipped_with(
            PathBuf::from("broken.xml"),
            SkipReason::NotWellFormed {
                line: 3,
                message: "tag mismatch".to_string(),
            },
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"]["status"], "skipped");
        assert_eq!(json["status"]["detail"]["kind"], "not_well_formed");
        assert_eq!(json["status"]["detail"]["line"], 3);
    }
}
