//! Buffer configuration.
//!
//! Capacity is an explicit construction parameter. When a caller does not
//! pick one, the process-wide default comes from the `BUFOPEN_BUFSIZE`
//! environment variable:
//! - a decimal byte count, optionally suffixed with `k` or `m` (binary units)
//! - anything unparsable, or zero, falls back to [`DEFAULT_CAPACITY`]
//!
//! `BUFOPEN_SCRATCH_DIR` overrides where pre-append flushes stage their
//! scratch files (default: the directory of the file being modified).

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Buffer capacity used when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 4096;

const CAPACITY_ENV: &str = "BUFOPEN_BUFSIZE";
const SCRATCH_DIR_ENV: &str = "BUFOPEN_SCRATCH_DIR";

// 0 = unresolved.
static CACHED_CAPACITY: AtomicUsize = AtomicUsize::new(0);

/// Parse a capacity string such as `"4096"`, `"8k"` or `"1M"`.
pub fn parse_capacity_loose(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let (digits, scale) = match raw.as_bytes().last()? {
        b'k' | b'K' => (&raw[..raw.len() - 1], 1024),
        b'm' | b'M' => (&raw[..raw.len() - 1], 1024 * 1024),
        _ => (raw, 1),
    };
    let n: usize = digits.trim().parse().ok()?;
    n.checked_mul(scale).filter(|&v| v > 0)
}

/// Process-wide default capacity (reads the env var on first call, caches
/// thereafter).
#[must_use]
pub fn default_capacity() -> usize {
    let cached = CACHED_CAPACITY.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let resolved = std::env::var(CAPACITY_ENV)
        .ok()
        .and_then(|v| parse_capacity_loose(&v))
        .unwrap_or(DEFAULT_CAPACITY);
    CACHED_CAPACITY.store(resolved, Ordering::Release);
    resolved
}

/// Per-handle buffer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Size of each of the two buffers, in bytes. Clamped to at least 1.
    pub capacity: usize,
    /// Directory for pre-append scratch files. `None` means "next to the
    /// target file".
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            scratch_dir: None,
        }
    }
}

impl BufferConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scratch_dir: None,
        }
    }

    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Default capacity plus the scratch-directory override, if set.
    pub fn from_env() -> Self {
        Self {
            capacity: default_capacity(),
            scratch_dir: std::env::var_os(SCRATCH_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_suffixed_capacities() {
        assert_eq!(parse_capacity_loose("4096"), Some(4096));
        assert_eq!(parse_capacity_loose(" 16 "), Some(16));
        assert_eq!(parse_capacity_loose("8k"), Some(8192));
        assert_eq!(parse_capacity_loose("8K"), Some(8192));
        assert_eq!(parse_capacity_loose("1M"), Some(1024 * 1024));
    }

    #[test]
    fn parse_rejects_garbage_and_zero() {
        assert_eq!(parse_capacity_loose(""), None);
        assert_eq!(parse_capacity_loose("k"), None);
        assert_eq!(parse_capacity_loose("0"), None);
        assert_eq!(parse_capacity_loose("-4"), None);
        assert_eq!(parse_capacity_loose("lots"), None);
        assert_eq!(parse_capacity_loose(&format!("{}m", usize::MAX)), None);
    }

    #[test]
    fn cached_capacity_is_process_sticky() {
        let previous = CACHED_CAPACITY.swap(123, Ordering::SeqCst);
        assert_eq!(default_capacity(), 123);
        assert_eq!(BufferConfig::default().capacity, 123);
        CACHED_CAPACITY.store(previous, Ordering::SeqCst);
    }

    #[test]
    fn with_capacity_clamps_to_one() {
        assert_eq!(BufferConfig::with_capacity(0).capacity, 1);
        assert_eq!(BufferConfig::with_capacity(7).capacity, 7);
    }

    #[test]
    fn scratch_dir_builder() {
        let cfg = BufferConfig::with_capacity(8).scratch_dir("/tmp");
        assert_eq!(cfg.scratch_dir, Some(PathBuf::from("/tmp")));
    }
}
