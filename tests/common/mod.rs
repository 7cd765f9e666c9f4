#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use validate_xml_batch::{BatchOptions, BatchRunner, MemorySink, Schema};

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn orders_schema(&self) -> PathBuf {
        self.fixtures_dir.join("orders.xsd")
    }

    pub fn valid_orders(&self) -> PathBuf {
        self.fixtures_dir.join("valid_orders.xml")
    }

    pub fn invalid_orders(&self) -> PathBuf {
        self.fixtures_dir.join("invalid_orders_missing_price.xml")
    }

    pub fn broken_xml(&self) -> PathBuf {
        self.fixtures_dir.join("broken.xml")
    }

    pub fn missing_xml(&self) -> PathBuf {
        self.fixtures_dir.join("missing.xml")
    }

    pub fn load_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::load(self.orders_schema()).unwrap())
    }
}

/// Runner over the orders schema, logging into a fresh memory sink
pub fn orders_runner(options: BatchOptions) -> (BatchRunner, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let runner = BatchRunner::new(TestFixtures::new().load_schema(), options, sink.clone());
    (runner, sink)
}

/// 1-based line of the first line containing `needle`
pub fn line_of(path: &Path, needle: &str, occurrence: usize) -> u32 {
    let content = std::fs::read_to_string(path).unwrap();
    let index = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(needle))
        .nth(occurrence)
        .map(|(i, _)| i)
        .unwrap();
    index as u32 + 1
}

/// Copy `count` fixture documents into a temp dir, alternating valid and invalid
pub fn mixed_batch(count: usize) -> (TempDir, Vec<PathBuf>) {
    let fixtures = TestFixtures::new();
    let temp_dir = TempDir::new().unwrap();
    let paths = (0..count)
        .map(|i| {
            let source = if i % 2 == 0 {
                fixtures.valid_orders()
            } else {
                fixtures.invalid_orders()
            };
            let target = temp_dir.path().join(format!("orders_{i:03}.xml"));
            std::fs::copy(source, &target).unwrap();
            target
        })
        .collect();
    (temp_dir, paths)
}
