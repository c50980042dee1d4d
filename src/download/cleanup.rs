//! Download directory sweeper.
//!
//! Every file the bot writes lives in one directory. A periodic sweep removes
//! files older than the retention window; the startup and shutdown sweeps
//! remove everything. Files of a request that is still being processed are
//! protected by a lease, so neither sweep can pull a file out from under an
//! upload in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Active leases keyed by file-name prefix.
#[derive(Debug, Clone, Default)]
pub struct LeaseRegistry {
    active: Arc<DashMap<String, usize>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protects every file whose name starts with `prefix` until the lease drops.
    pub fn acquire(&self, prefix: impl Into<String>) -> FileLease {
        let prefix = prefix.into();
        *self.active.entry(prefix.clone()).or_insert(0) += 1;
        FileLease {
            registry: self.clone(),
            prefix,
        }
    }

    pub fn is_leased(&self, file_name: &str) -> bool {
        self.active.iter().any(|entry| file_name.starts_with(entry.key().as_str()))
    }

    /// Number of distinct leased prefixes.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    fn release(&self, prefix: &str) {
        // drop the entry only once the last lease is gone
        if let Some(mut count) = self.active.get_mut(prefix) {
            *count = count.saturating_sub(1);
        }
        self.active.remove_if(prefix, |_, count| *count == 0);
    }
}

/// RAII guard returned by [`LeaseRegistry::acquire`].
#[derive(Debug)]
pub struct FileLease {
    registry: LeaseRegistry,
    prefix: String,
}

impl FileLease {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        self.registry.release(&self.prefix);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped_leased: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct Sweeper {
    dir: PathBuf,
    retention: Duration,
    leases: LeaseRegistry,
}

impl Sweeper {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration, leases: LeaseRegistry) -> Self {
        Self {
            dir: dir.into(),
            retention,
            leases,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Removes unleased files older than the retention window.
    pub fn sweep(&self) -> SweepReport {
        let now = SystemTime::now();
        let retention = self.retention;
        self.sweep_where(|modified| {
            now.duration_since(modified)
                .map(|age| age > retention)
                .unwrap_or(false)
        })
    }

    /// Removes every unleased file regardless of age.
    pub fn sweep_all(&self) -> SweepReport {
        self.sweep_where(|_| true)
    }

    fn sweep_where(&self, expired: impl Fn(SystemTime) -> bool) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                log::warn!("Cannot read download dir {}: {}", self.dir.display(), e);
                report.errors += 1;
                return report;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            let Ok(meta) = entry.metadata() else {
                report.errors += 1;
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            report.scanned += 1;

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.leases.is_leased(&name) {
                report.skipped_leased += 1;
                continue;
            }

            let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
            if !expired(modified) {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    log::debug!("🗑️ Removed {}", entry.path().display());
                    report.deleted += 1;
                }
                // someone else got there first
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", entry.path().display(), e);
                    report.errors += 1;
                }
            }
        }

        if report.deleted > 0 || report.errors > 0 {
            log::info!(
                "🧹 Sweep of {}: {} scanned, {} deleted, {} leased, {} errors",
                self.dir.display(),
                report.scanned,
                report.deleted,
                report.skipped_leased,
                report.errors
            );
        }
        report
    }

    /// Periodic sweep until `cancel` fires. The first sweep runs one interval after start.
    pub fn spawn(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            log::info!(
                "🧹 Sweeper started: every {}s, retention {}s",
                interval.as_secs(),
                self.retention.as_secs()
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sweeper = self.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                            log::error!("Sweep task failed: {}", e);
                        }
                    }
                }
            }
            log::info!("🧹 Sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn test_lease_lifecycle() {
        let leases = LeaseRegistry::new();
        let a = leases.acquire("abc");
        let b = leases.acquire("abc");
        assert!(leases.is_leased("abc_video.mp4"));
        assert!(!leases.is_leased("xyz_video.mp4"));
        drop(a);
        assert!(leases.is_leased("abc_video.mp4"));
        drop(b);
        assert!(!leases.is_leased("abc_video.mp4"));
        assert_eq!(leases.active(), 0);
    }

    #[test]
    fn test_sweep_respects_retention() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "fresh.mp4");

        let sweeper = Sweeper::new(dir.path(), Duration::from_secs(3600), LeaseRegistry::new());
        let report = sweeper.sweep();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.deleted, 0);

        let sweeper = Sweeper::new(dir.path(), Duration::ZERO, LeaseRegistry::new());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sweeper.sweep().deleted, 1);
        assert!(!dir.path().join("fresh.mp4").exists());
    }

    #[test]
    fn test_sweep_all_skips_leased_and_dirs() {
        let dir = tempdir().unwrap();
        let leases = LeaseRegistry::new();
        touch(dir.path(), "req1_a.mp4");
        touch(dir.path(), "req2_b.mp3");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let _lease = leases.acquire("req1");

        let report = Sweeper::new(dir.path(), Duration::from_secs(3600), leases).sweep_all();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.skipped_leased, 1);
        assert!(dir.path().join("req1_a.mp4").exists());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.mp4");
        let sweeper = Sweeper::new(dir.path(), Duration::ZERO, LeaseRegistry::new());
        assert_eq!(sweeper.sweep_all().deleted, 1);
        assert_eq!(sweeper.sweep_all(), SweepReport::default());
    }

    #[test]
    fn test_missing_dir_is_empty_report() {
        let dir = tempdir().unwrap();
        let sweeper = Sweeper::new(dir.path().join("nope"), Duration::ZERO, LeaseRegistry::new());
        assert_eq!(sweeper.sweep_all(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_stops_on_cancel() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "old.mp4");
        let cancel = CancellationToken::new();
        let handle = Sweeper::new(dir.path(), Duration::ZERO, LeaseRegistry::new())
            .spawn(Duration::from_millis(20), cancel.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(!dir.path().join("old.mp4").exists());
    }
}
