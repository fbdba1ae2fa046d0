//! File content digest probe

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

use crate::error::{ResolutionError, Result};

/// Digest algorithms accepted in `digest(algo:/path)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgo {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgo {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(DigestAlgo::Md5),
            "sha1" => Some(DigestAlgo::Sha1),
            "sha256" => Some(DigestAlgo::Sha256),
            "sha384" => Some(DigestAlgo::Sha384),
            "sha512" => Some(DigestAlgo::Sha512),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgo::Md5 => "md5",
            DigestAlgo::Sha1 => "sha1",
            DigestAlgo::Sha256 => "sha256",
            DigestAlgo::Sha384 => "sha384",
            DigestAlgo::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        let mut data = data;
        // Reading from a slice cannot fail
        self.hex_digest_reader(&mut data).unwrap_or_default()
    }

    /// Lowercase hex digest of everything `reader` yields.
    pub fn hex_digest_reader<R: Read>(&self, reader: &mut R) -> io::Result<String> {
        match self {
            DigestAlgo::Md5 => hash_reader(Md5::new(), reader),
            DigestAlgo::Sha1 => hash_reader(Sha1::new(), reader),
            DigestAlgo::Sha256 => hash_reader(Sha256::new(), reader),
            DigestAlgo::Sha384 => hash_reader(Sha384::new(), reader),
            DigestAlgo::Sha512 => hash_reader(Sha512::new(), reader),
        }
    }
}

fn hash_reader<D: Digest + Write, R: Read>(mut hasher: D, reader: &mut R) -> io::Result<String> {
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
}

/// Split `algo:path`. Without a known algorithm prefix the whole argument is
/// the path and MD5 is used.
pub fn split_digest_arg(arg: &str) -> (DigestAlgo, &str) {
    if let Some((prefix, rest)) = arg.split_once(':') {
        if let Some(algo) = DigestAlgo::from_name(prefix) {
            return (algo, rest);
        }
    }
    (DigestAlgo::Md5, arg)
}

/// Digest of a regular file, `None` when it cannot be opened.
pub fn file_digest(algo: DigestAlgo, path: &Path) -> Result<Option<String>> {
    let fail = |reason: String| ResolutionError::probe("digest", &path.display().to_string(), reason);
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => return Ok(None),
        Err(e) => return Err(fail(e.to_string())),
    };
    if !file.metadata()?.is_file() {
        return Err(fail("not a regular file".to_string()));
    }
    let digest = algo.hex_digest_reader(&mut file).map_err(|e| fail(e.to_string()))?;
    Ok(Some(digest))
}

/// Only equality is meaningful for digests; an empty expected value never
/// matches.
pub fn digest_matches(algo: DigestAlgo, path: &Path, expected: &str, equal: bool) -> Result<bool> {
    if expected.is_empty() || !equal {
        return Ok(false);
    }
    Ok(file_digest(algo, path)?.map_or(false, |actual| actual.eq_ignore_ascii_case(expected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn hello() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_split_digest_arg() {
        assert_eq!(split_digest_arg("sha256:/etc/passwd"), (DigestAlgo::Sha256, "/etc/passwd"));
        assert_eq!(split_digest_arg("/etc/passwd"), (DigestAlgo::Md5, "/etc/passwd"));
        assert_eq!(split_digest_arg("weird:/x"), (DigestAlgo::Md5, "weird:/x"));
    }

    #[test]
    fn test_hex_digests() {
        assert_eq!(DigestAlgo::Md5.hex_digest(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            DigestAlgo::Sha1.hex_digest(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            DigestAlgo::Sha256.hex_digest(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_matches() {
        let file = hello();
        let sha = "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9";
        assert!(digest_matches(DigestAlgo::Sha256, file.path(), sha, true).unwrap());
        assert!(!digest_matches(DigestAlgo::Sha256, file.path(), sha, false).unwrap());
        assert!(!digest_matches(DigestAlgo::Sha256, file.path(), "", true).unwrap());
        assert!(!digest_matches(DigestAlgo::Md5, file.path(), sha, true).unwrap());
    }

    #[test]
    fn test_streamed_digest_matches_slice_digest() {
        let file = hello();
        let mut reader = File::open(file.path()).unwrap();
        assert_eq!(
            DigestAlgo::Sha512.hex_digest_reader(&mut reader).unwrap(),
            DigestAlgo::Sha512.hex_digest(b"hello world")
        );
    }

    #[test]
    fn test_directories_and_devices_are_refused() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(file_digest(DigestAlgo::Sha256, dir.path()).is_err());
        assert!(file_digest(DigestAlgo::Md5, Path::new("/dev/null")).is_err());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let found = file_digest(DigestAlgo::Md5, Path::new("/nonexistent/rpmtx/file")).unwrap();
        assert!(found.is_none());
    }
}
