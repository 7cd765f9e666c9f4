//! Compiled XSD schema shared read-only across a batch.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::SchemaLoadError;
use crate::guard::ReadabilityGuard;
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};

/// An XSD compiled by libxml2
///
/// Valid and immutable once constructed. Share it with `Arc<Schema>`; every validation
/// against it creates its own libxml2 validation context.
#[derive(Debug, Clone)]
pub struct Schema {
    path: PathBuf,
    compiled: XmlSchemaPtr,
}

impl Schema {
    /// Compile the schema at `path`
    ///
    /// # Errors
    ///
    /// `SchemaLoadError::Unreadable` when the file cannot be read, `SchemaLoadError::Invalid`
    /// when libxml2 rejects the XSD. Either one aborts the run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();

        if !ReadabilityGuard::is_readable(path) {
            return Err(SchemaLoadError::Unreadable {
                path: path.to_path_buf(),
            });
        }

        debug!(schema = %path.display(), "compiling schema");
        let compiled = LibXml2Wrapper::new().parse_schema_file(path)?;
        info!(schema = %path.display(), "schema compiled");

        Ok(Self {
            path: path.to_path_buf(),
            compiled,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn compiled(&self) -> &XmlSchemaPtr {
        &self.compiled
    }
}
