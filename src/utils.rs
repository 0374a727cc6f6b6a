//! Path helpers

use crate::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Extension of generated files
pub const SCAD_EXTENSION: &str = "scad";

/// `model.stl` → `model.scad`, next to the input
pub fn output_path_for<P: AsRef<Path>>(input: P) -> PathBuf {
    input.as_ref().with_extension(SCAD_EXTENSION)
}

/// File stem, as the default module name (sanitized later by the emitter)
pub fn identifier_from_path<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

/// Drop one pair of surrounding quotes, as left by drag-and-drop on some shells
pub fn strip_quotes_from_path(path: &str) -> String {
    if path.starts_with('"') && path.ends_with('"') && path.len() >= 2 {
        path[1..path.len() - 1].to_string()
    } else {
        path.to_string()
    }
}

pub fn date_time_filename(prefix: &str, postfix: &str) -> String {
    let now = chrono::Local::now();
    format!("{}{}{}", prefix, now.format("%Y%m%d_%H%M%S"), postfix)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory removed (with its files) on drop
pub struct TempFolder {
    path: PathBuf,
}

impl TempFolder {
    pub fn new() -> Result<Self> {
        let mut path = env::temp_dir();
        let unique = format!(
            "stl2scad_{}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        path.push(unique);
        fs::create_dir_all(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create temp dir {}: {}", path.display(), e),
            ))
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to `name` inside the folder and return its path
    pub fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

impl Drop for TempFolder {
    fn drop(&mut self) {
        if let Ok(entries) = fs::read_dir(&self.path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    let _ = fs::remove_file(path);
                }
            }
        }
        let _ = fs::remove_dir(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for("parts/bracket.stl"),
            PathBuf::from("parts/bracket.scad")
        );
        assert_eq!(output_path_for("noext"), PathBuf::from("noext.scad"));
    }

    #[test]
    fn test_identifier_from_path() {
        assert_eq!(
            identifier_from_path("/tmp/gear-v2.STL").as_deref(),
            Some("gear-v2")
        );
        assert_eq!(identifier_from_path("/"), None);
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes_from_path("\"a b.stl\""), "a b.stl");
        assert_eq!(strip_quotes_from_path("plain.stl"), "plain.stl");
    }

    #[test]
    fn test_temp_folder_cleanup() {
        let path = {
            let tmp = TempFolder::new().unwrap();
            let file = tmp.write_file("x.stl", b"solid x").unwrap();
            assert!(file.exists());
            tmp.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
