//! The read-only Filesystem seam (spec.md section 6). This is the only
//! filesystem primitive the core uses: `read`. No write, create, rename,
//! delete, chmod or mkdir call site exists anywhere in this crate -- that
//! absence is the structural invariant spec.md section 4.6 asks for.

/// Outcome of reading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(Vec<u8>),
    NotFound,
    Error(String),
}

/// A read-only file reader. Implementations outside this crate may bound
/// the read with a timeout (spec.md section 5: "ETV reads honor a per-file
/// bounded wait"); this trait itself is synchronous, matching the spec's
/// "all three are synchronous from the core's viewpoint."
pub trait FileReader: Send + Sync {
    fn read(&self, absolute_path: &str) -> ReadOutcome;
}

/// Reads directly from the local filesystem via `std::fs`. The only
/// filesystem primitives called are `std::fs::read` and `Path::exists`
/// (implicitly, via the error kind returned by `read`).
#[derive(Debug, Default)]
pub struct StdFileReader;

impl FileReader for StdFileReader {
    fn read(&self, absolute_path: &str) -> ReadOutcome {
        match std::fs::read(absolute_path) {
            Ok(bytes) => ReadOutcome::Found(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ReadOutcome::NotFound,
            Err(e) => ReadOutcome::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.go");
        std::fs::write(&path, b"package main").unwrap();
        let reader = StdFileReader;
        match reader.read(path.to_str().unwrap()) {
            ReadOutcome::Found(bytes) => assert_eq!(bytes, b"package main"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let reader = StdFileReader;
        assert_eq!(reader.read("/nonexistent/path/f.go"), ReadOutcome::NotFound);
    }
}
