//! Streaming SHA-256 content hashing.
//!
//! Files are digested through a fixed-size buffer so memory stays constant
//! regardless of file size. The lowercase hex digest is the address key for
//! the media store and the pointer manifest.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const BUF_SIZE: usize = 64 * 1024;

/// Hash a file's bytes, streaming. Returns the lowercase hex digest.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash an in-memory byte slice (unit content hashes).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_and_bytes_agree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sample.bin");
        let data = b"the quick brown fox";
        std::fs::File::create(&path)
            .unwrap()
            .write_all(data)
            .unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(data));
    }

    #[test]
    fn deterministic_across_calls() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sample.txt");
        std::fs::write(&path, "same bytes").unwrap();

        let a = hash_file(&path).unwrap();
        let b = hash_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = hash_file(Path::new("/nonexistent/nothing.bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
