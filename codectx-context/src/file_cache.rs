//! Per-assembler source-line cache (spec §4.2 step 5, §5 "shared-resource
//! policy"). Many readers, single writer; TOCTOU against a drifting file is
//! accepted — freshness is handled by the out-of-scope verification
//! subsystem, not the assembler.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Caches line arrays keyed by project-relative file path. Content-less in
/// the sense that it holds only `Vec<String>` line splits, never a second
/// copy of the raw file bytes.
#[derive(Default)]
pub struct FileLineCache {
    lines: RwLock<HashMap<String, Arc<Vec<String>>>>,
}

impl FileLineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `[start_line, end_line]` (1-indexed, inclusive) from
    /// `file_path`, populating the cache on first access. Returns `None` if
    /// the file cannot be read or `start_line` is out of range — callers
    /// fall back to signature-only rendering (spec §7).
    pub fn read_span(&self, file_path: &str, start_line: u32, end_line: u32) -> Option<String> {
        let lines = self.lines_for(file_path)?;
        let start = usize::try_from(start_line).ok()?.checked_sub(1)?;
        if start >= lines.len() {
            return None;
        }
        let end = usize::try_from(end_line).ok()?.min(lines.len());
        Some(lines[start..end].join("\n"))
    }

    fn lines_for(&self, file_path: &str) -> Option<Arc<Vec<String>>> {
        if let Some(cached) = self.lines.read().get(file_path) {
            return Some(cached.clone());
        }
        let content = std::fs::read_to_string(file_path).ok()?;
        let lines: Arc<Vec<String>> =
            Arc::new(content.lines().map(str::to_string).collect());
        self.lines
            .write()
            .insert(file_path.to_string(), lines.clone());
        Some(lines)
    }

    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_caches_a_span() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "line1\nline2\nline3\nline4").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cache = FileLineCache::new();
        let span = cache.read_span(&path, 2, 3).unwrap();
        assert_eq!(span, "line2\nline3");

        // Second read comes from cache; still correct.
        let span2 = cache.read_span(&path, 1, 1).unwrap();
        assert_eq!(span2, "line1");
    }

    #[test]
    fn out_of_range_start_line_returns_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "only one line").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cache = FileLineCache::new();
        assert!(cache.read_span(&path, 50, 60).is_none());
    }

    #[test]
    fn missing_file_returns_none() {
        let cache = FileLineCache::new();
        assert!(cache.read_span("/no/such/file.rs", 1, 5).is_none());
    }
}
