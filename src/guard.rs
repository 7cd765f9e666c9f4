use std::path::Path;

/// Pre-flight readability check for schema and document paths
///
/// A pure predicate: it never fails and never logs. Callers decide whether an unreadable
/// path is fatal (the schema) or a per-file skip (documents).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityGuard;

impl ReadabilityGuard {
    /// True when `path` exists, is not a directory, and the process may read it
    pub fn is_readable(path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(metadata) if !metadata.is_dir() => has_read_permission(path),
            _ => false,
        }
    }
}

#[cfg(unix)]
fn has_read_permission(path: &Path) -> bool {
    match crate::libxml2::path_to_cstring(path) {
        Some(c_path) => unsafe { libc::access(c_path.as_ptr(), libc::R_OK) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn has_read_permission(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_is_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.xml");
        std::fs::write(&path, "<root/>").unwrap();

        assert!(ReadabilityGuard::is_readable(&path));
    }

    #[test]
    fn test_missing_file_is_not_readable() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!ReadabilityGuard::is_readable(
            &temp_dir.path().join("missing.xml")
        ));
    }

    #[test]
    fn test_directory_is_not_readable() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!ReadabilityGuard::is_readable(temp_dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_not_readable() {
        use std::os::unix::fs::PermissionsExt;

        // root bypasses permission bits
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locked.xml");
        std::fs::write(&path, "<root/>").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        assert!(!ReadabilityGuard::is_readable(&path));
    }
}
