//! Backup set manager
//!
//! Owns all directory I/O over a backup root: enumerating the backups of a
//! working file, creating new ones, and evicting the oldest past the
//! retention count. Nothing is cached; every call re-reads the directory, so
//! files added or removed behind our back are simply picked up next time.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::copier::{Clock, FileCopier, StdCopier, SystemClock};
use super::naming::{self, BackupStamp, IdentityMode, WorkingFileIdentity};
use crate::error::{BackupError, BackupResult};
use crate::storage::file_io::{copy_atomic, Overwrite};

/// Opaque handle to a backup, stable across listings
///
/// It is the backup's file name; it is re-resolved against the directory on
/// every use rather than trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackupId(String);

impl BackupId {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self(file_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackupId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One retained backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    identity: WorkingFileIdentity,
    stamp: BackupStamp,
    path: PathBuf,
    size_bytes: u64,
}

impl BackupEntry {
    pub fn id(&self) -> BackupId {
        BackupId::new(self.file_name())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn identity(&self) -> &WorkingFileIdentity {
        &self.identity
    }

    pub fn stamp(&self) -> BackupStamp {
        self.stamp
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.stamp.created_at()
    }

    /// Absolute path inside the backup root
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// The backups of one working file, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    identity: WorkingFileIdentity,
    entries: Vec<BackupEntry>,
}

impl BackupSet {
    pub fn identity(&self) -> &WorkingFileIdentity {
        &self.identity
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackupEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<&BackupEntry> {
        self.entries.first()
    }

    pub fn latest(&self) -> Option<&BackupEntry> {
        self.entries.last()
    }
}

/// What a retention pass removed, and what it could not
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted: Vec<PathBuf>,
    /// Always `BackupError::EvictionFailed`
    pub failures: Vec<BackupError>,
}

impl EvictionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of `create_backup`
#[derive(Debug)]
pub struct CreateOutcome {
    /// The new backup; `None` when backups are disabled (retention 0)
    pub entry: Option<BackupEntry>,
    pub eviction: EvictionReport,
}

impl CreateOutcome {
    fn disabled() -> Self {
        Self {
            entry: None,
            eviction: EvictionReport::default(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.entry.is_none()
    }
}

/// Where a working file's backups live, for display
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub identity: WorkingFileIdentity,
    pub backup_root: PathBuf,
    pub count: usize,
}

/// Manages the backup sets stored in one backup root
pub struct BackupSetManager<C = StdCopier, K = SystemClock> {
    backup_root: PathBuf,
    identity_mode: IdentityMode,
    pub(crate) copier: C,
    clock: K,
}

impl BackupSetManager {
    /// Create a manager using the platform copier and the system clock
    pub fn new(backup_root: impl Into<PathBuf>, identity_mode: IdentityMode) -> Self {
        Self::with_capabilities(backup_root, identity_mode, StdCopier, SystemClock)
    }
}

impl<C: FileCopier, K: Clock> BackupSetManager<C, K> {
    pub fn with_capabilities(
        backup_root: impl Into<PathBuf>,
        identity_mode: IdentityMode,
        copier: C,
        clock: K,
    ) -> Self {
        Self {
            backup_root: backup_root.into(),
            identity_mode,
            copier,
            clock,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn identity_mode(&self) -> IdentityMode {
        self.identity_mode
    }

    /// Identity of the working file at `source`
    ///
    /// Fails with `UnsupportedWorkingFile` when no backup name can be built
    /// from the path (no file name, or one that is not valid UTF-8).
    pub fn identity_of(&self, source: &Path) -> BackupResult<WorkingFileIdentity> {
        WorkingFileIdentity::derive(&absolutize(source), self.identity_mode)
            .map_err(|_| BackupError::unsupported_file(source))
    }

    /// List the backups of `source`, oldest first
    ///
    /// An empty set is fine; a missing or unreadable root is not.
    pub fn list_backups(&self, source: &Path) -> BackupResult<BackupSet> {
        let identity = self.identity_of(source)?;
        let entries = self.scan(&identity)?;
        Ok(BackupSet { identity, entries })
    }

    /// Most recent backup of `source`, if any
    pub fn latest(&self, source: &Path) -> BackupResult<Option<BackupEntry>> {
        Ok(self.list_backups(source)?.entries.pop())
    }

    /// Re-resolve `id` against the directory as it is now
    ///
    /// Fails with `BackupNotFound` if the file is gone, or if the id names a
    /// backup of some other working file.
    pub fn resolve(&self, source: &Path, id: &BackupId) -> BackupResult<BackupEntry> {
        let not_found = || BackupError::BackupNotFound(id.to_string());

        // Plain file names only; no traversal out of the root
        if Path::new(id.as_str()).file_name().and_then(|n| n.to_str()) != Some(id.as_str()) {
            return Err(not_found());
        }

        let identity = self.identity_of(source)?;
        let (decoded, stamp) = naming::decode(id.as_str()).map_err(|_| not_found())?;
        if decoded != identity {
            return Err(not_found());
        }

        let path = self.backup_root.join(id.as_str());
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(BackupEntry {
                identity,
                stamp,
                path,
                size_bytes: meta.len(),
            }),
            _ => Err(not_found()),
        }
    }

    /// Copy `source` into the backup root, then evict past `retention`
    ///
    /// `retention == 0` disables backups: nothing is touched and the outcome
    /// carries no entry. The working file is only ever read. Eviction
    /// problems are reported in the outcome and never undo the new backup.
    pub fn create_backup(&self, source: &Path, retention: u32) -> BackupResult<CreateOutcome> {
        if retention == 0 {
            debug!(source = %source.display(), "backups disabled, skipping");
            return Ok(CreateOutcome::disabled());
        }

        match fs::metadata(source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(BackupError::copy_failed(
                    source,
                    &self.backup_root,
                    "source is not a regular file",
                ))
            }
            Err(e) => return Err(BackupError::copy_failed(source, &self.backup_root, e)),
        }

        let identity = self.identity_of(source)?;

        fs::create_dir_all(&self.backup_root)
            .map_err(|e| BackupError::root_unavailable(&self.backup_root, e))?;

        self.sweep_stale_temps(&identity);
        let existing = self.scan(&identity)?;

        let mut stamp = naming::next_stamp(self.clock.now(), existing.last().map(|e| e.stamp));
        let mut dest = self.backup_root.join(naming::encode(&identity, &stamp));
        // Something that is not one of our backups may hold the name
        while dest.exists() {
            stamp = stamp.successor();
            dest = self.backup_root.join(naming::encode(&identity, &stamp));
        }

        let size_bytes = copy_atomic(&self.copier, source, &dest, Overwrite::Forbid)
            .map_err(|e| BackupError::copy_failed(source, &dest, e))?;

        let entry = BackupEntry {
            identity: identity.clone(),
            stamp,
            path: dest,
            size_bytes,
        };
        info!(
            source = %source.display(),
            backup = %entry.path.display(),
            bytes = size_bytes,
            "created backup"
        );

        // Fresh listing: the directory may have changed during the copy
        let eviction = match self.scan(&identity) {
            Ok(entries) => {
                let keep = Some(entry.path.as_path());
                evict_oldest(entries, retention as usize, keep)
            }
            Err(e) => {
                warn!(error = %e, "could not re-list backups for eviction");
                EvictionReport {
                    evicted: Vec::new(),
                    failures: vec![BackupError::EvictionFailed {
                        path: self.backup_root.clone(),
                        reason: e.to_string(),
                    }],
                }
            }
        };

        Ok(CreateOutcome {
            entry: Some(entry),
            eviction,
        })
    }

    /// Delete the oldest backups of `source` until at most `retention` remain
    ///
    /// A retention of 0 means backups are disabled, not "delete everything";
    /// the set is left alone.
    pub fn enforce_retention(&self, source: &Path, retention: u32) -> BackupResult<EvictionReport> {
        if retention == 0 {
            return Ok(EvictionReport::default());
        }
        let identity = self.identity_of(source)?;
        let entries = self.scan(&identity)?;
        Ok(evict_oldest(entries, retention as usize, None))
    }

    /// Number of backups that a retention pass would delete
    pub fn excess_count(&self, source: &Path, retention: u32) -> BackupResult<usize> {
        if retention == 0 {
            return Ok(0);
        }
        Ok(self
            .list_backups(source)?
            .len()
            .saturating_sub(retention as usize))
    }

    /// Identity, root and entry count for `source`
    ///
    /// A root that does not exist yet simply has no backups.
    pub fn group_summary(&self, source: &Path) -> BackupResult<GroupSummary> {
        let identity = self.identity_of(source)?;
        let count = if self.backup_root.exists() {
            self.scan(&identity)?.len()
        } else {
            0
        };
        Ok(GroupSummary {
            identity,
            backup_root: self.backup_root.clone(),
            count,
        })
    }

    /// Enumerate the root and keep the entries belonging to `identity`
    fn scan(&self, identity: &WorkingFileIdentity) -> BackupResult<Vec<BackupEntry>> {
        let dir = fs::read_dir(&self.backup_root)
            .map_err(|e| BackupError::root_unavailable(&self.backup_root, e))?;

        let mut entries = Vec::new();
        for dir_entry in dir {
            let dir_entry = match dir_entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        root = %self.backup_root.display(),
                        error = %e,
                        "unreadable directory entry"
                    );
                    continue;
                }
            };

            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let (decoded, stamp) = match naming::decode(name) {
                Ok(parsed) => parsed,
                Err(_) => {
                    debug!(name, "ignoring non-backup file");
                    continue;
                }
            };
            if &decoded != identity {
                continue;
            }

            let path = dir_entry.path();
            // May have vanished since read_dir returned it
            let meta = match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };

            entries.push(BackupEntry {
                identity: decoded,
                stamp,
                path,
                size_bytes: meta.len(),
            });
        }

        entries.sort_by(|a, b| a.stamp.cmp(&b.stamp));
        debug!(%identity, count = entries.len(), "listed backups");
        Ok(entries)
    }

    /// Remove in-progress copies of `identity` left behind by an interrupted run
    ///
    /// Saves of one working file are never concurrent, so any temp file for
    /// this identity found before a new copy starts is an orphan.
    fn sweep_stale_temps(&self, identity: &WorkingFileIdentity) {
        let Ok(dir) = fs::read_dir(&self.backup_root) else {
            return;
        };

        for dir_entry in dir.flatten() {
            let file_name = dir_entry.file_name();
            let Some(target) = file_name.to_str().and_then(naming::temp_target) else {
                continue;
            };
            match naming::decode(target) {
                Ok((decoded, _)) if &decoded == identity => {}
                _ => continue,
            }

            let path = dir_entry.path();
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed stale temp file"),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "could not remove stale temp file"
                    );
                }
            }
        }
    }
}

/// Remove the oldest entries so that `retention` remain
///
/// `entries` must be sorted oldest first. Exactly the excess entries are
/// attempted; a failure is recorded and never compensated for by deleting a
/// newer backup instead.
fn evict_oldest(
    entries: Vec<BackupEntry>,
    retention: usize,
    keep: Option<&Path>,
) -> EvictionReport {
    let excess = entries.len().saturating_sub(retention);
    let mut report = EvictionReport::default();

    for entry in entries.into_iter().take(excess) {
        if Some(entry.path.as_path()) == keep {
            continue;
        }
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                info!(backup = %entry.path.display(), "evicted backup");
                report.evicted.push(entry.path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(backup = %entry.path.display(), "already removed");
                report.evicted.push(entry.path);
            }
            Err(e) => {
                warn!(
                    backup = %entry.path.display(),
                    error = %e,
                    "failed to evict backup"
                );
                report.failures.push(BackupError::EvictionFailed {
                    path: entry.path,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Absolute form of `path` with the parent directory's symlinks resolved
///
/// The file itself need not exist.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Clock that advances by a fixed step on every read
    pub(crate) struct StepClock {
        next: Cell<DateTime<Utc>>,
        step: Duration,
    }

    impl StepClock {
        pub(crate) fn new(step: Duration) -> Self {
            Self {
                next: Cell::new(Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()),
                step,
            }
        }

        fn set(&self, at: DateTime<Utc>) {
            self.next.set(at);
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let now = self.next.get();
            self.next.set(now + self.step);
            now
        }
    }

    /// Writes part of the file and then fails, like a crash mid-copy
    struct InterruptedCopier;

    impl FileCopier for InterruptedCopier {
        fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
            let bytes = fs::read(from)?;
            fs::write(to, &bytes[..bytes.len() / 2])?;
            Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "copy interrupted",
            ))
        }
    }

    struct Fixture {
        temp: TempDir,
        manager: BackupSetManager<StdCopier, StepClock>,
    }

    impl Fixture {
        fn new(mode: IdentityMode) -> Self {
            let temp = TempDir::new().unwrap();
            let manager = BackupSetManager::with_capabilities(
                temp.path().join("backups"),
                mode,
                StdCopier,
                StepClock::new(Duration::seconds(1)),
            );
            Self { temp, manager }
        }

        fn working_file(&self, relative: &str, content: &[u8]) -> PathBuf {
            let path = self.temp.path().join("work").join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn create(&self, source: &Path, retention: u32) -> BackupEntry {
            self.manager
                .create_backup(source, retention)
                .unwrap()
                .entry
                .unwrap()
        }
    }

    #[test]
    fn test_create_backup_creates_missing_root() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"v1");
        assert!(!fx.manager.backup_root().exists());

        let entry = fx.create(&source, 3);

        assert!(fx.manager.backup_root().is_dir());
        assert_eq!(fs::read(entry.path()).unwrap(), b"v1");
        let set = fx.manager.list_backups(&source).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.latest().unwrap(), &entry);
    }

    #[test]
    fn test_retention_keeps_most_recent_three() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"t1");

        let t1 = fx.create(&source, 3);
        let mut kept = Vec::new();
        for content in [b"t2", b"t3", b"t4"] {
            fs::write(&source, content).unwrap();
            kept.push(fx.create(&source, 3));
        }

        let set = fx.manager.list_backups(&source).unwrap();
        assert_eq!(set.entries(), kept.as_slice());
        assert!(!t1.path().exists());
        let contents: Vec<Vec<u8>> = set.iter().map(|e| fs::read(e.path()).unwrap()).collect();
        assert_eq!(contents, [b"t2", b"t3", b"t4"]);
    }

    #[test]
    fn test_retention_bound_for_various_counts() {
        for retention in 1..=4u32 {
            let fx = Fixture::new(IdentityMode::Stem);
            let source = fx.working_file("scene.blend", b"data");

            let created: Vec<BackupEntry> = (0..6).map(|_| fx.create(&source, retention)).collect();

            let set = fx.manager.list_backups(&source).unwrap();
            assert_eq!(set.len(), retention as usize);
            assert_eq!(set.entries(), &created[6 - retention as usize..]);
        }
    }

    #[test]
    fn test_create_reports_evictions() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");

        let first = fx.create(&source, 1);
        let outcome = fx.manager.create_backup(&source, 1).unwrap();

        assert_eq!(outcome.eviction.evicted, vec![first.path().to_path_buf()]);
        assert!(outcome.eviction.is_clean());
    }

    #[test]
    fn test_retention_zero_is_a_no_op() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");

        let outcome = fx.manager.create_backup(&source, 0).unwrap();

        assert!(outcome.is_disabled());
        assert!(!fx.manager.backup_root().exists());
    }

    #[test]
    fn test_listing_is_idempotent() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        for _ in 0..3 {
            fx.create(&source, 5);
        }

        let first = fx.manager.list_backups(&source).unwrap();
        let second = fx.manager.list_backups(&source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_identity_isolation() {
        let fx = Fixture::new(IdentityMode::Stem);
        let foo = fx.working_file("foo.ext", b"foo");
        let bar = fx.working_file("bar.ext", b"bar");

        let bar_entry = fx.create(&bar, 1);
        for _ in 0..3 {
            fx.create(&foo, 1);
        }

        let foo_set = fx.manager.list_backups(&foo).unwrap();
        assert_eq!(foo_set.len(), 1);
        assert!(foo_set.iter().all(|e| e.identity().key() == "foo"));

        let bar_set = fx.manager.list_backups(&bar).unwrap();
        assert_eq!(bar_set.entries(), &[bar_entry]);
    }

    #[test]
    fn test_stem_mode_shares_group_across_directories() {
        let fx = Fixture::new(IdentityMode::Stem);
        let a = fx.working_file("a/scene.blend", b"a");
        let b = fx.working_file("b/scene.blend", b"b");

        fx.create(&a, 5);
        fx.create(&b, 5);

        assert_eq!(fx.manager.list_backups(&a).unwrap().len(), 2);
    }

    #[test]
    fn test_path_hash_mode_separates_directories() {
        let fx = Fixture::new(IdentityMode::PathHash);
        let a = fx.working_file("a/scene.blend", b"a");
        let b = fx.working_file("b/scene.blend", b"b");

        fx.create(&a, 1);
        fx.create(&b, 1);
        fx.create(&a, 1);

        assert_eq!(fx.manager.list_backups(&a).unwrap().len(), 1);
        let b_set = fx.manager.list_backups(&b).unwrap();
        assert_eq!(b_set.len(), 1);
        assert_eq!(fs::read(b_set.latest().unwrap().path()).unwrap(), b"b");
    }

    #[test]
    fn test_unrelated_files_are_ignored_and_kept() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        let root = fx.manager.backup_root().to_path_buf();
        fs::create_dir_all(&root).unwrap();

        let notes = root.join("notes.txt");
        let blend1 = root.join("scene.blend1");
        let dir_lookalike = root.join("scene_20250101-000000-000000-000.blend");
        fs::write(&notes, "keep me").unwrap();
        fs::write(&blend1, "legacy backup").unwrap();
        fs::create_dir(&dir_lookalike).unwrap();

        for _ in 0..3 {
            fx.create(&source, 1);
        }

        assert_eq!(fx.manager.list_backups(&source).unwrap().len(), 1);
        assert!(notes.exists());
        assert!(blend1.exists());
        assert!(dir_lookalike.is_dir());
    }

    #[test]
    fn test_interrupted_copy_leaves_no_visible_entry() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("backups");
        let source = temp.path().join("scene.blend");
        fs::write(&source, b"0123456789").unwrap();

        let good = BackupSetManager::with_capabilities(
            &root,
            IdentityMode::Stem,
            StdCopier,
            StepClock::new(Duration::seconds(1)),
        );
        let prior = good.create_backup(&source, 5).unwrap().entry.unwrap();

        let failing = BackupSetManager::with_capabilities(
            &root,
            IdentityMode::Stem,
            InterruptedCopier,
            StepClock::new(Duration::seconds(1)),
        );
        let err = failing.create_backup(&source, 5).unwrap_err();
        assert!(matches!(err, BackupError::CopyFailed { .. }));

        let set = good.list_backups(&source).unwrap();
        assert_eq!(set.entries(), &[prior.clone()]);
        assert_eq!(fs::read(prior.path()).unwrap(), b"0123456789");
        assert_eq!(fs::read_dir(&root).unwrap().count(), 1);
    }

    #[test]
    fn test_leftover_temp_file_is_invisible() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        let entry = fx.create(&source, 5);

        // A process killed between copy and rename leaves this behind
        let future = naming::encode(
            entry.identity(),
            &BackupStamp::new(entry.created_at() + Duration::hours(1)),
        );
        let root = fx.manager.backup_root();
        fs::write(root.join(naming::temp_name_for(&future)), b"partial").unwrap();

        let set = fx.manager.list_backups(&source).unwrap();
        assert_eq!(set.entries(), &[entry]);
    }

    #[test]
    fn test_list_missing_root_fails() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");

        let err = fx.manager.list_backups(&source).unwrap_err();
        assert!(err.is_root_unavailable());
    }

    #[test]
    fn test_list_empty_root_is_empty() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        fs::create_dir_all(fx.manager.backup_root()).unwrap();

        let set = fx.manager.list_backups(&source).unwrap();
        assert!(set.is_empty());
        assert!(fx.manager.latest(&source).unwrap().is_none());
    }

    #[test]
    fn test_create_fails_when_root_is_a_file() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        let root = fx.manager.backup_root();
        fs::write(root, b"not a directory").unwrap();

        let err = fx.manager.create_backup(&source, 3).unwrap_err();
        assert!(err.is_root_unavailable());
        assert_eq!(fs::read(&source).unwrap(), b"data");
    }

    #[test]
    fn test_create_missing_source_fails() {
        let fx = Fixture::new(IdentityMode::Stem);
        let missing = fx.temp.path().join("work").join("missing.blend");

        let err = fx.manager.create_backup(&missing, 3).unwrap_err();
        assert!(matches!(err, BackupError::CopyFailed { .. }));
    }

    #[test]
    fn test_same_instant_saves_get_distinct_names() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        let frozen = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let mut names = Vec::new();
        for _ in 0..3 {
            fx.manager.clock.set(frozen);
            names.push(fx.create(&source, 10).file_name());
        }

        assert_eq!(fx.manager.list_backups(&source).unwrap().len(), 3);
        names.dedup();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_clock_going_backwards_keeps_new_backup_newest() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"old");
        fx.create(&source, 1);

        fx.manager
            .clock
            .set(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
        fs::write(&source, b"new").unwrap();
        let newest = fx.create(&source, 1);

        let set = fx.manager.list_backups(&source).unwrap();
        assert_eq!(set.entries(), &[newest.clone()]);
        assert_eq!(fs::read(newest.path()).unwrap(), b"new");
    }

    #[test]
    fn test_enforce_retention_standalone() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");
        for _ in 0..5 {
            fx.create(&source, 10);
        }

        assert_eq!(fx.manager.excess_count(&source, 2).unwrap(), 3);
        let report = fx.manager.enforce_retention(&source, 2).unwrap();
        assert_eq!(report.evicted.len(), 3);
        assert_eq!(fx.manager.list_backups(&source).unwrap().len(), 2);

        let untouched = fx.manager.enforce_retention(&source, 0).unwrap();
        assert!(untouched.evicted.is_empty());
        assert_eq!(fx.manager.list_backups(&source).unwrap().len(), 2);
    }

    #[test]
    fn test_eviction_failure_is_reported_not_compensated() {
        let temp = TempDir::new().unwrap();
        let identity = WorkingFileIdentity::new("scene", Some("blend"));
        let stamp = |secs| BackupStamp::new(Utc.timestamp_opt(secs, 0).unwrap());

        // remove_file on a directory fails, even for root
        let stuck = temp.path().join("stuck");
        fs::create_dir(&stuck).unwrap();
        let middle = temp.path().join("middle");
        fs::write(&middle, b"m").unwrap();
        let newest = temp.path().join("newest");
        fs::write(&newest, b"n").unwrap();

        let entry = |secs, path: &Path| BackupEntry {
            identity: identity.clone(),
            stamp: stamp(secs),
            path: path.to_path_buf(),
            size_bytes: 1,
        };
        let entries = vec![entry(1, &stuck), entry(2, &middle), entry(3, &newest)];

        let report = evict_oldest(entries, 1, None);

        assert_eq!(report.evicted, vec![middle.clone()]);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert!(matches!(failure, BackupError::EvictionFailed { .. }));
        assert!(!failure.is_fatal());
        assert!(stuck.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_resolve_rejects_stale_foreign_and_traversal_ids() {
        let fx = Fixture::new(IdentityMode::Stem);
        let scene = fx.working_file("scene.blend", b"scene");
        let other = fx.working_file("other.blend", b"other");

        let entry = fx.create(&scene, 5);
        let foreign = fx.create(&other, 5);

        let resolve = |id: &BackupId| fx.manager.resolve(&scene, id);
        let traversal = BackupId::new(format!("../{}", entry.file_name()));

        assert_eq!(resolve(&entry.id()).unwrap(), entry);
        assert!(resolve(&foreign.id()).unwrap_err().is_not_found());
        assert!(resolve(&traversal).unwrap_err().is_not_found());

        fs::remove_file(entry.path()).unwrap();
        assert!(resolve(&entry.id()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_group_summary() {
        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.working_file("scene.blend", b"data");

        let empty = fx.manager.group_summary(&source).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.identity.to_string(), "scene.blend");

        fx.create(&source, 5);
        fx.create(&source, 5);
        assert_eq!(fx.manager.group_summary(&source).unwrap().count, 2);
    }

    #[test]
    fn test_path_without_file_name_is_unsupported() {
        let fx = Fixture::new(IdentityMode::Stem);
        fs::create_dir_all(fx.manager.backup_root()).unwrap();
        let root_dir = Path::new("/");

        let err = fx.manager.list_backups(root_dir).unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedWorkingFile { .. }));

        let id = BackupId::new("scene_20250101-000000-000000-000.blend");
        let err = fx.manager.resolve(root_dir, &id).unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedWorkingFile { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_name_is_unsupported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fx = Fixture::new(IdentityMode::Stem);
        let source = fx.temp.path().join(OsStr::from_bytes(b"sc\xffene.blend"));
        fs::write(&source, b"data").unwrap();

        let err = fx.manager.create_backup(&source, 3).unwrap_err();

        assert!(matches!(err, BackupError::UnsupportedWorkingFile { .. }));
        assert!(err.is_fatal());
        assert!(!fx.manager.backup_root().exists());
    }

    #[test]
    fn test_create_sweeps_orphaned_temp_files() {
        let fx = Fixture::new(IdentityMode::Stem);
        let scene = fx.working_file("scene.blend", b"scene");
        let other = fx.working_file("other.blend", b"other");
        let entry = fx.create(&scene, 5);
        let foreign = fx.create(&other, 5);

        let root = fx.manager.backup_root();
        let orphan = root.join(naming::temp_name_for(&entry.file_name()));
        let unrelated = root.join(naming::temp_name_for(&foreign.file_name()));
        fs::write(&orphan, b"partial").unwrap();
        fs::write(&unrelated, b"partial").unwrap();

        fx.create(&scene, 5);

        assert!(!orphan.exists());
        assert!(unrelated.exists());
        assert_eq!(fx.manager.list_backups(&scene).unwrap().len(), 2);
    }
}
