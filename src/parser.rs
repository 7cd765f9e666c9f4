use std::path::{Path, PathBuf};

use libc::c_int;

use crate::error::ParseError;
use crate::libxml2::{
    LibXml2Wrapper, XML_PARSE_BIG_LINES, XML_PARSE_HUGE, XML_PARSE_NOERROR, XML_PARSE_NONET,
    XML_PARSE_NOWARNING, XmlDocPtr,
};

/// A parsed XML tree, owned by the pipeline that parsed it and freed on drop
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    tree: XmlDocPtr,
}

impl Document {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of element nodes, counted by walking the tree
    pub fn node_count(&self) -> usize {
        self.tree.element_count()
    }

    pub fn root_line(&self) -> Option<u32> {
        self.tree.root_line()
    }

    pub(crate) fn tree(&self) -> &XmlDocPtr {
        &self.tree
    }
}

/// Parses XML files into `Document`s
///
/// Protective mode keeps libxml2's default depth and text-size limits. Large-document mode
/// lifts them (`XML_PARSE_HUGE`) so multi-gigabyte inputs parse, at the cost of weaker
/// protection against hostile trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentParser {
    allow_large_documents: bool,
}

impl DocumentParser {
    pub fn new(allow_large_documents: bool) -> Self {
        Self {
            allow_large_documents,
        }
    }

    pub fn allows_large_documents(&self) -> bool {
        self.allow_large_documents
    }

    pub(crate) fn options(&self) -> c_int {
        let base = XML_PARSE_NONET | XML_PARSE_BIG_LINES | XML_PARSE_NOERROR | XML_PARSE_NOWARNING;
        if self.allow_large_documents {
            base | XML_PARSE_HUGE
        } else {
            base
        }
    }

    /// Parse the file at `path`
    ///
    /// # Errors
    ///
    /// `ParseError::NotWellFormed` with libxml2's line and message when the file is not
    /// well-formed XML.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<Document, ParseError> {
        let path = path.as_ref();
        let tree = LibXml2Wrapper::new().read_document(path, self.options())?;

        Ok(Document {
            path: path.to_path_buf(),
            tree,
        })
    }
}
