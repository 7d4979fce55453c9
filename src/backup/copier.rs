//! Injected capabilities: the file-copy primitive and the clock
//!
//! The backup manager never copies bytes or reads the time directly; it goes
//! through these traits so hosts (and tests) can substitute their own.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

/// Copies the full contents of one file to another path
///
/// Implementations may leave a partial `to` behind on error; callers always
/// copy to a temporary name and clean up.
pub trait FileCopier {
    /// Copy `from` to `to`, returning the number of bytes copied
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// Copier backed by the platform copy primitive, flushed to disk
#[derive(Debug, Clone, Copy, Default)]
pub struct StdCopier;

impl FileCopier for StdCopier {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let bytes = fs::copy(from, to)?;
        // Durable before the rename makes it visible
        File::open(to)?.sync_all()?;
        Ok(bytes)
    }
}

/// Source of "now" for backup stamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
