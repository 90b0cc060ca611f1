//! Attachment storage path helpers.
//!
//! Uploaded files are written once under the upload root with a generated
//! unique name and never mutated or overwritten afterwards.

use crate::config;
use rand::Rng;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Create a directory (and all parents) if it doesn't exist, and return the path.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let p = path.as_ref();
    fs::create_dir_all(p)?;
    Ok(p.to_path_buf())
}

/// Global upload root (absolute), from `config::upload_storage_root()`.
/// If relative in env, resolve against current_dir().
pub fn upload_root() -> PathBuf {
    let root = config::upload_storage_root();
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// Generate a collision-free stored filename for an upload, keeping the
/// original extension: `file-{unix_millis}-{rand}{.ext}`.
pub fn attachment_filename(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().r#gen();
    format!("file-{millis}-{nonce:08x}{ext}")
}

/// Absolute path for a stored attachment filename (does not create).
pub fn attachment_path(stored_name: &str) -> PathBuf {
    upload_root().join(stored_name)
}

/// Public URL under which a stored attachment is served back.
pub fn attachment_url(stored_name: &str) -> String {
    format!("/uploads/{stored_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_keeps_extension_lowercased() {
        let name = attachment_filename("Report.PDF");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn filename_without_extension_has_none() {
        let name = attachment_filename("README");
        assert!(!name.contains('.'));
    }

    #[test]
    fn consecutive_names_differ() {
        assert_ne!(attachment_filename("a.png"), attachment_filename("a.png"));
    }
}
