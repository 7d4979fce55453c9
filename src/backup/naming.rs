//! Backup file naming
//!
//! Maps a working-file identity plus a creation stamp to a backup file name
//! and back. Names look like `scene_20251127-143022-123456-000.blend`: the
//! identity key, an underscore, a fixed-width stamp token, then the working
//! file's original extension. Because the token is fixed-width and zero
//! padded, sorting names lexicographically sorts them by creation time.
//!
//! No I/O happens here.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BackupError, BackupResult};

/// Length of the stamp token: `YYYYMMDD-HHMMSS-ffffff-nnn`
const TOKEN_LEN: usize = 26;

/// Suffix given to in-progress copies; never decodes as a backup
pub const TEMP_SUFFIX: &str = ".sidecopy-tmp";

/// Hex digits of the parent-directory hash kept in a path-hash key
const PATH_HASH_LEN: usize = 8;

/// How backups of different working files are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityMode {
    /// Group by file stem only; same-named files in different directories
    /// share one backup set
    Stem,
    /// Group by stem plus a hash of the absolute parent directory
    #[default]
    PathHash,
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stem => write!(f, "stem"),
            Self::PathHash => write!(f, "path-hash"),
        }
    }
}

impl std::str::FromStr for IdentityMode {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stem" => Ok(Self::Stem),
            "path-hash" | "pathhash" | "hash" => Ok(Self::PathHash),
            other => Err(BackupError::Config(format!(
                "Unknown identity mode '{}' (expected 'stem' or 'path-hash')",
                other
            ))),
        }
    }
}

/// The logical file a backup belongs to
///
/// Two working files share a backup group exactly when their identities are
/// equal. The extension is part of the identity, so `scene.blend` and
/// `scene.txt` never share a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkingFileIdentity {
    key: String,
    extension: Option<String>,
}

impl WorkingFileIdentity {
    pub fn new(key: impl Into<String>, extension: Option<&str>) -> Self {
        Self {
            key: key.into(),
            extension: extension.filter(|e| !e.is_empty()).map(str::to_string),
        }
    }

    /// Derive the identity of a working file
    ///
    /// `path` should be absolute when `mode` is `PathHash`, otherwise the
    /// hash depends on the current directory. A path that is itself a backup
    /// name has its stamp suffix stripped first.
    pub fn derive(path: &Path, mode: IdentityMode) -> BackupResult<Self> {
        let malformed = || BackupError::MalformedName(path.display().to_string());
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(malformed)?;
        let extension = match path.extension() {
            Some(ext) => Some(ext.to_str().ok_or_else(malformed)?),
            None => None,
        };

        let stem = strip_stamp_suffix(stem).unwrap_or(stem);

        let key = match mode {
            IdentityMode::Stem => stem.to_string(),
            IdentityMode::PathHash => {
                let parent = path.parent().unwrap_or_else(|| Path::new(""));
                format!("{}-{}", stem, parent_hash(parent))
            }
        };

        Ok(Self::new(key, extension))
    }

    /// Group key used as the file name prefix
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }
}

impl fmt::Display for WorkingFileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}.{}", self.key, ext),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Creation time of a backup plus a same-instant disambiguator
///
/// Ordering is by time, then by `seq`, which matches file name order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackupStamp {
    created_at: DateTime<Utc>,
    seq: u16,
}

impl BackupStamp {
    /// Highest collision counter that fits the three-digit field
    pub const MAX_SEQ: u16 = 999;

    /// A stamp at `at`, truncated to microsecond resolution
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            created_at: truncate_to_micros(at),
            seq: 0,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn seq(&self) -> u16 {
        self.seq
    }

    /// The smallest stamp strictly after this one
    pub fn successor(&self) -> Self {
        if self.seq < Self::MAX_SEQ {
            Self {
                created_at: self.created_at,
                seq: self.seq + 1,
            }
        } else {
            Self {
                created_at: self.created_at + Duration::microseconds(1),
                seq: 0,
            }
        }
    }

    fn token(&self) -> String {
        format!(
            "{}-{:06}-{:03}",
            self.created_at.format("%Y%m%d-%H%M%S"),
            micros_of(&self.created_at),
            self.seq
        )
    }
}

/// Stamp for a new backup taken at `now`
///
/// Guarantees the result sorts after `newest`, even when the clock has not
/// advanced (or went backwards) since that backup was made.
pub fn next_stamp(now: DateTime<Utc>, newest: Option<BackupStamp>) -> BackupStamp {
    let candidate = BackupStamp::new(now);
    match newest {
        Some(newest) if candidate <= newest => newest.successor(),
        _ => candidate,
    }
}

/// Build the backup file name for `identity` at `stamp`
pub fn encode(identity: &WorkingFileIdentity, stamp: &BackupStamp) -> String {
    match identity.extension() {
        Some(ext) => format!("{}_{}.{}", identity.key(), stamp.token(), ext),
        None => format!("{}_{}", identity.key(), stamp.token()),
    }
}

/// Parse a backup file name back into its identity and stamp
///
/// Fails with `MalformedName` for anything `encode` could not have produced,
/// including in-progress temporary files.
pub fn decode(file_name: &str) -> BackupResult<(WorkingFileIdentity, BackupStamp)> {
    let malformed = || BackupError::MalformedName(file_name.to_string());

    if is_temp_name(file_name) {
        return Err(malformed());
    }

    if let Some((key, stamp)) = split_stamp(file_name) {
        return Ok((WorkingFileIdentity::new(key, None), stamp));
    }

    let (base, ext) = file_name.rsplit_once('.').ok_or_else(malformed)?;
    if ext.is_empty() {
        return Err(malformed());
    }
    let (key, stamp) = split_stamp(base).ok_or_else(malformed)?;
    Ok((WorkingFileIdentity::new(key, Some(ext)), stamp))
}

/// Name of the in-progress file that will be renamed to `final_name`
pub fn temp_name_for(final_name: &str) -> String {
    format!(".{}{}", final_name, TEMP_SUFFIX)
}

pub fn is_temp_name(file_name: &str) -> bool {
    file_name.ends_with(TEMP_SUFFIX)
}

/// Final name an in-progress file was going to be renamed to
pub fn temp_target(file_name: &str) -> Option<&str> {
    file_name.strip_prefix('.')?.strip_suffix(TEMP_SUFFIX)
}

/// Split `<key>_<token>` into its key and parsed stamp
fn split_stamp(base: &str) -> Option<(&str, BackupStamp)> {
    if base.len() < TOKEN_LEN + 2 || !base.is_char_boundary(base.len() - TOKEN_LEN) {
        return None;
    }
    let (head, token) = base.split_at(base.len() - TOKEN_LEN);
    let key = head.strip_suffix('_')?;
    if key.is_empty() {
        return None;
    }
    Some((key, parse_token(token)?))
}

fn strip_stamp_suffix(stem: &str) -> Option<&str> {
    split_stamp(stem).map(|(key, _)| key)
}

fn parse_token(token: &str) -> Option<BackupStamp> {
    let bytes = token.as_bytes();
    if bytes.len() != TOKEN_LEN {
        return None;
    }
    let well_formed = bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 15 | 22 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| -> Option<u32> { token[range].parse().ok() };

    let year = digits(0..4)? as i32;
    let month = digits(4..6)?;
    let day = digits(6..8)?;
    let hour = digits(9..11)?;
    let minute = digits(11..13)?;
    let second = digits(13..15)?;
    let micros = digits(16..22)?;
    let seq = digits(23..26)? as u16;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micros)?;
    let created_at = DateTime::from_naive_utc_and_offset(NaiveDateTime::new(date, time), Utc);

    Some(BackupStamp { created_at, seq })
}

fn parent_hash(parent: &Path) -> String {
    let digest = Sha256::digest(parent.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..PATH_HASH_LEN].to_string()
}

fn micros_of(at: &DateTime<Utc>) -> u32 {
    // Leap seconds report nanoseconds past 1e9; clamp to keep six digits
    (at.nanosecond() / 1_000).min(999_999)
}

fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(micros_of(&at) * 1_000).unwrap_or(at)
}
