//! LibXML2 FFI Wrapper Module
//!
//! This module provides safe wrappers around the libxml2 calls needed for batch XML Schema
//! validation: compiling an XSD from a path, reading a document into a tree, and validating
//! that tree against the compiled schema.
//!
//! ## Why libxml2
//!
//! The Rust XML ecosystem has good parsers (`roxmltree`, `quick-xml`) but no mature
//! runtime XSD 1.0 validator, so validation goes through libxml2 directly.
//!
//! ## Thread Safety Strategy
//!
//! According to the libxml2 threading notes (http://xmlsoft.org/threads.html):
//!
//! - **Initialization**: `xmlInitParser` is NOT thread-safe; it runs exactly once via `Once`.
//! - **Schema structures**: read-only after compilation and safe to share across threads.
//! - **Document loading**: concurrent loading of different documents is supported.
//! - **Validation**: safe for different documents as long as every thread creates its own
//!   validation context.
//!
//! **Our Implementation:**
//! - **Schema compilation**: happens once, before the batch starts
//! - **Documents**: owned by the pipeline that parsed them, never shared (`XmlDocPtr` is `!Send`)
//! - **Schema sharing**: `Arc`-wrapped pointer, freed when the last clone drops
//!
//! ## Diagnostics
//!
//! Errors are captured through libxml2's *structured* error callbacks so that each message
//! arrives with its line number instead of being printed to stderr.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_long, c_void};
use tracing::debug;

use crate::error::{LibXml2Error, LibXml2Result, ParseError, SchemaLoadError};

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// Suppress error reports on stderr (they are read back from the parser context)
pub const XML_PARSE_NOERROR: c_int = 1 << 5;
/// Suppress warning reports on stderr
pub const XML_PARSE_NOWARNING: c_int = 1 << 6;
/// Forbid network access while parsing
pub const XML_PARSE_NONET: c_int = 1 << 11;
/// Relax hardcoded depth and text-size limits
pub const XML_PARSE_HUGE: c_int = 1 << 19;
/// Store line numbers above 65535 exactly
pub const XML_PARSE_BIG_LINES: c_int = 1 << 22;

/// `xmlErrorLevel` at which a diagnostic is an error rather than a warning
pub const XML_ERR_ERROR: c_int = 2;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlNode {
    _private: [u8; 0],
}

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Schema compilation
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Document parsing
    pub fn xmlNewParserCtxt() -> *mut XmlParserCtxt;
    pub fn xmlFreeParserCtxt(ctxt: *mut XmlParserCtxt);
    pub fn xmlCtxtReadFile(
        ctxt: *mut XmlParserCtxt,
        filename: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlCtxtGetLastError(ctx: *mut c_void) -> *const XmlError;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    // Tree navigation
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;
    pub fn xmlFirstElementChild(parent: *mut XmlNode) -> *mut XmlNode;
    pub fn xmlNextElementSibling(node: *mut XmlNode) -> *mut XmlNode;
    pub fn xmlGetLineNo(node: *const XmlNode) -> c_long;

    // Schema validation
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
}

/// Mirror of libxml2's `xmlError`
#[repr(C)]
pub struct XmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const XmlError)>;

/// One diagnostic delivered by a structured error callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    pub level: i32,
    /// 0 when libxml2 could not attribute the error to a line
    pub line: u32,
    pub message: String,
}

impl CapturedError {
    /// Copy the fields out of a libxml2 error record
    ///
    /// # Safety
    ///
    /// `error` must be null or point to a live `xmlError`.
    unsafe fn from_raw(error: *const XmlError) -> Option<Self> {
        if error.is_null() {
            return None;
        }
        let error = unsafe { &*error };
        if error.message.is_null() {
            return None;
        }

        let message = unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim()
            .to_string();

        let mut line = error.line;
        if line <= 0 && !error.node.is_null() {
            // Schema validity errors may carry only the offending node
            line = unsafe { xmlGetLineNo(error.node as *const XmlNode) } as c_int;
        }

        Some(Self {
            level: error.level,
            line: u32::try_from(line).unwrap_or(0),
            message,
        })
    }
}

/// Callback for libxml2 to report schema compilation or validation errors (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *const XmlError) {
    if user_data.is_null() {
        return;
    }
    let errors = unsafe { &mut *(user_data as *mut Vec<CapturedError>) };

    if let Some(captured) = unsafe { CapturedError::from_raw(error) } {
        errors.push(captured);
    }
}

/// Convert a path into the C string libxml2 expects, without lossy UTF-8 conversion on Unix
pub fn path_to_cstring(path: &Path) -> Option<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).ok()
    }
    #[cfg(not(unix))]
    {
        path.to_str().and_then(|s| CString::new(s).ok())
    }
}

/// Thread-safe wrapper for libxml2 schema pointer with proper resource management
///
/// This wrapper ensures that:
/// - Schema pointers are properly freed when the last clone is dropped
/// - The schema can be safely shared across threads (libxml2 schemas are read-only after parsing)
/// - Null pointers are rejected at construction
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// Create a new XmlSchemaPtr from a raw pointer
    ///
    /// # Safety
    ///
    /// The pointer must come from `xmlSchemaParse` and must not be freed elsewhere.
    unsafe fn from_raw(ptr: *mut XmlSchema) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }

        Some(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    /// Get the raw pointer for FFI calls
    ///
    /// The returned pointer is only valid as long as this XmlSchemaPtr exists.
    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        // The Arc ensures this runs exactly once per compiled schema
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Owned libxml2 document tree, freed on drop
///
/// Deliberately neither `Send` nor `Sync`: a document belongs to the pipeline that parsed it.
#[derive(Debug)]
pub struct XmlDocPtr {
    ptr: *mut XmlDoc,
}

impl XmlDocPtr {
    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }

    /// Line of the root element, or `None` for a document without one
    pub fn root_line(&self) -> Option<u32> {
        let root = unsafe { xmlDocGetRootElement(self.ptr) };
        if root.is_null() {
            return None;
        }
        let line = unsafe { xmlGetLineNo(root) };
        u32::try_from(line).ok().filter(|l| *l > 0)
    }

    /// Count element nodes in document order without recursion
    pub fn element_count(&self) -> usize {
        let root = unsafe { xmlDocGetRootElement(self.ptr) };
        if root.is_null() {
            return 0;
        }

        let mut count = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            count += 1;
            let mut child = unsafe { xmlFirstElementChild(node) };
            while !child.is_null() {
                stack.push(child);
                child = unsafe { xmlNextElementSibling(child) };
            }
        }
        count
    }
}

impl Drop for XmlDocPtr {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDoc(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Validation result from libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed with errors (return code > 0)
    Invalid {
        error_count: i32,
        errors: Vec<CapturedError>,
    },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32 },
}

impl ValidationResult {
    /// Create ValidationResult from libxml2 return code and captured errors
    pub fn from_code(code: c_int, errors: Vec<CapturedError>) -> Self {
        match code {
            0 => ValidationResult::Valid,
            n if n > 0 => ValidationResult::Invalid {
                error_count: n,
                errors,
            },
            n => ValidationResult::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// LibXML2 wrapper providing safe access to the compile / read / validate calls
///
/// Creating a wrapper is cheap; libxml2 itself is initialised exactly once per process.
#[derive(Debug, Clone, Copy)]
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new LibXML2 wrapper instance
    ///
    /// This initializes the libxml2 parser if not already initialized.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| {
            unsafe { xmlInitParser() };
            debug!("libxml2 parser initialised");
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile an XML schema from a file path
    ///
    /// Compiling from the path (rather than from memory) lets libxml2 resolve relative
    /// `xs:include` and `xs:import` locations against the schema's own directory.
    ///
    /// **IMPORTANT**: schema compilation is NOT thread-safe in libxml2; call it once, up front.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError::Invalid` with the collected compiler messages when libxml2
    /// rejects the schema, and `SchemaLoadError::InvalidPath` for paths libxml2 cannot take.
    pub fn parse_schema_file(&self, path: &Path) -> Result<XmlSchemaPtr, SchemaLoadError> {
        let c_path = path_to_cstring(path).ok_or_else(|| SchemaLoadError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let mut errors: Vec<CapturedError> = Vec::new();

        let schema_ptr = unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(SchemaLoadError::Invalid {
                    path: path.to_path_buf(),
                    details: "schema parser context creation failed".to_string(),
                });
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                &mut errors as *mut Vec<CapturedError> as *mut c_void,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);

            // Always free the parser context
            xmlSchemaFreeParserCtxt(parser_ctxt);

            XmlSchemaPtr::from_raw(schema_ptr)
        };

        schema_ptr.ok_or_else(|| {
            let details = if errors.is_empty() {
                "libxml2 could not compile the schema".to_string()
            } else {
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            SchemaLoadError::Invalid {
                path: path.to_path_buf(),
                details,
            }
        })
    }

    /// Read an XML document into a tree with the given `XML_PARSE_*` options
    ///
    /// # Errors
    ///
    /// Returns `ParseError::NotWellFormed` carrying libxml2's last error (line and message)
    /// when the file is not well-formed XML. Namespace errors such as an undeclared prefix
    /// count: libxml2 still builds a tree for them, which is discarded here.
    pub fn read_document(&self, path: &Path, options: c_int) -> Result<XmlDocPtr, ParseError> {
        let c_path = path_to_cstring(path).ok_or_else(|| ParseError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        unsafe {
            let parser_ctxt = xmlNewParserCtxt();
            if parser_ctxt.is_null() {
                return Err(ParseError::ContextAllocation {
                    path: path.to_path_buf(),
                });
            }

            let doc = xmlCtxtReadFile(parser_ctxt, c_path.as_ptr(), std::ptr::null(), options);

            let last = CapturedError::from_raw(xmlCtxtGetLastError(parser_ctxt as *mut c_void));

            let result = if doc.is_null() {
                let (line, details) = match last {
                    Some(err) => (err.line, err.message),
                    None => (0, "document could not be parsed".to_string()),
                };
                Err(ParseError::NotWellFormed {
                    path: path.to_path_buf(),
                    line,
                    details,
                })
            } else {
                match last {
                    Some(err) if err.level >= XML_ERR_ERROR => {
                        xmlFreeDoc(doc);
                        Err(ParseError::NotWellFormed {
                            path: path.to_path_buf(),
                            line: err.line,
                            details: err.message,
                        })
                    }
                    _ => Ok(XmlDocPtr { ptr: doc }),
                }
            };

            // Always free the parser context; the document outlives it
            xmlFreeParserCtxt(parser_ctxt);

            result
        }
    }

    /// Validate a parsed document against a schema
    ///
    /// This method is thread-safe: each call creates its own validation context, and the
    /// schema pointer is only read.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::ValidationContextCreationFailed` if the context cannot be
    /// allocated and `LibXml2Error::InternalError` when libxml2 reports a negative code.
    pub fn validate_document(
        &self,
        schema: &XmlSchemaPtr,
        doc: &XmlDocPtr,
    ) -> LibXml2Result<ValidationResult> {
        let mut errors: Vec<CapturedError> = Vec::new();

        let result_code = unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                &mut errors as *mut Vec<CapturedError> as *mut c_void,
            );

            let code = xmlSchemaValidateDoc(valid_ctxt, doc.as_ptr());

            // Always free the validation context
            xmlSchemaFreeValidCtxt(valid_ctxt);
            code
        };

        match ValidationResult::from_code(result_code, errors) {
            ValidationResult::InternalError { code } => Err(LibXml2Error::InternalError { code }),
            result => Ok(result),
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
