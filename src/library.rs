//! Folder scanning: discovers audio files, reads them, and turns each one
//! into a [`ScannedTrack`] on a bounded worker pool.

use crate::config::ScanOptions;
use crate::model::{ReconciledMetadata, ScannedTrack, SkippedFile, SourceRecord};
use crate::providers::{MetadataProvider, default_providers};
use crate::reconcile::{ReconcileOptions, reconcile_with};
use anyhow::{Context, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Runs every provider over a file and reconciles their answers.
pub struct Extractor {
    providers: Vec<Box<dyn MetadataProvider>>,
    options: ReconcileOptions,
}

impl Extractor {
    pub fn new(options: ReconcileOptions) -> Self {
        Self::with_providers(default_providers(), options)
    }

    pub fn with_providers(
        providers: Vec<Box<dyn MetadataProvider>>,
        options: ReconcileOptions,
    ) -> Self {
        Self { providers, options }
    }

    pub fn sources(&self, path: &Path, bytes: &[u8]) -> Vec<SourceRecord> {
        self.providers
            .iter()
            .filter_map(|provider| {
                let record = provider.read(path, bytes);
                if record.is_none() {
                    debug!(
                        path = %path.display(),
                        source = provider.kind().label(),
                        "provider found nothing"
                    );
                }
                record
            })
            .collect()
    }

    pub fn extract(&self, path: &Path, bytes: &[u8]) -> ReconciledMetadata {
        let sources = self.sources(path, bytes);
        debug!(path = %path.display(), sources = sources.len(), "reconciling metadata");
        reconcile_with(&sources, &self.options)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ReconcileOptions::default())
    }
}

/// Cancellation handle shared with a running scan. Cancelling stops new
/// files from being dispatched; files already being read finish normally.
#[derive(Debug, Default)]
pub struct ScanControl {
    cancelled: AtomicBool,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    Started { total_files: usize },
    FileScanned { path: PathBuf },
    FileSkipped { path: PathBuf, reason: String },
    Finished { scanned: usize, skipped: usize, cancelled: bool },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub tracks: Vec<ScannedTrack>,
    pub skipped: Vec<SkippedFile>,
    pub cancelled: bool,
}

pub fn discover_audio_files(root: &Path, options: &ScanOptions) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).follow_links(options.follow_links);
    if let Some(max_depth) = options.max_depth {
        walker = walker.max_depth(max_depth);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| options.accepts_extension(ext))
        })
        .collect();
    files.sort();
    files
}

pub fn scan_file(
    path: &Path,
    extractor: &Extractor,
    options: &ScanOptions,
) -> Result<ScannedTrack> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let metadata = extractor.extract(path, &bytes);
    let display_title = display_title(path, &metadata);
    let content_hash = options.content_hash.then(|| content_hash(&bytes));

    Ok(ScannedTrack {
        path: path.to_path_buf(),
        display_title,
        metadata,
        file_size: bytes.len() as u64,
        content_hash,
    })
}

/// Scan every audio file under `root`. Unreadable files are reported in
/// [`ScanReport::skipped`] and never abort the scan.
pub fn scan_library<F>(
    root: &Path,
    extractor: &Extractor,
    options: &ScanOptions,
    control: &ScanControl,
    progress: F,
) -> Result<ScanReport>
where
    F: Fn(ScanProgress) + Sync,
{
    let files = discover_audio_files(root, options);
    info!(root = %root.display(), files = files.len(), "library scan started");
    progress(ScanProgress::Started {
        total_files: files.len(),
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .context("failed to build scan worker pool")?;

    let outcomes: Vec<Option<Result<ScannedTrack>>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                if control.is_cancelled() {
                    return None;
                }
                let outcome = scan_file(path, extractor, options);
                match &outcome {
                    Ok(_) => progress(ScanProgress::FileScanned { path: path.clone() }),
                    Err(err) => progress(ScanProgress::FileSkipped {
                        path: path.clone(),
                        reason: format!("{err:#}"),
                    }),
                }
                Some(outcome)
            })
            .collect()
    });

    let mut report = ScanReport::default();
    for (path, outcome) in files.into_iter().zip(outcomes) {
        match outcome {
            None => report.cancelled = true,
            Some(Ok(track)) => report.tracks.push(track),
            Some(Err(err)) => {
                let reason = format!("{err:#}");
                warn!(path = %path.display(), error = %reason, "skipping file");
                report.skipped.push(SkippedFile { path, reason });
            }
        }
    }

    info!(
        scanned = report.tracks.len(),
        skipped = report.skipped.len(),
        cancelled = report.cancelled,
        "library scan finished"
    );
    progress(ScanProgress::Finished {
        scanned: report.tracks.len(),
        skipped: report.skipped.len(),
        cancelled: report.cancelled,
    });
    Ok(report)
}

fn display_title(path: &Path, metadata: &ReconciledMetadata) -> String {
    metadata
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("unknown")
                .to_string()
        })
}

/// Hex SHA-256 of the whole file.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize().as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedTag, SourceKind};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FixedProvider(SourceRecord);

    impl MetadataProvider for FixedProvider {
        fn kind(&self) -> SourceKind {
            self.0.kind
        }

        fn read(&self, _path_hint: &Path, _bytes: &[u8]) -> Option<SourceRecord> {
            Some(self.0.clone())
        }
    }

    fn fixed(kind: SourceKind, title: &str) -> Box<dyn MetadataProvider> {
        Box::new(FixedProvider(SourceRecord::new(
            kind,
            ParsedTag {
                title: Some(title.to_string()),
                ..ParsedTag::default()
            },
        )))
    }

    #[test]
    fn scan_filters_non_audio_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.mp3"), b"x").expect("write mp3");
        fs::write(dir.path().join("b.txt"), b"x").expect("write txt");
        fs::write(dir.path().join("C.FLAC"), b"x").expect("write flac");

        let files = discover_audio_files(dir.path(), &ScanOptions::default());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("C.FLAC"));
        assert!(files[1].ends_with("a.mp3"));
    }

    #[test]
    fn max_depth_limits_discovery() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("deep");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join("top.mp3"), b"x").expect("write");
        fs::write(nested.join("inner.mp3"), b"x").expect("write");

        let options = ScanOptions {
            max_depth: Some(1),
            ..ScanOptions::default()
        };
        let files = discover_audio_files(dir.path(), &options);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("top.mp3"));
    }

    #[test]
    fn untagged_file_falls_back_to_file_stem() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("My Song.mp3");
        fs::write(&path, b"not really audio").expect("write");

        let track = scan_file(&path, &Extractor::default(), &ScanOptions::default()).expect("scan");
        assert_eq!(track.display_title, "My Song");
        assert_eq!(track.metadata.title, None);
        assert_eq!(track.file_size, 16);
        let expected = content_hash(b"not really audio");
        assert_eq!(track.content_hash.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn extractor_applies_provider_priority() {
        let extractor = Extractor::with_providers(
            vec![
                fixed(SourceKind::FrameDecoder, "decoded"),
                fixed(SourceKind::Native, "native"),
            ],
            ReconcileOptions::default(),
        );
        let metadata = extractor.extract(Path::new("x.mp3"), b"");
        assert_eq!(metadata.title.as_deref(), Some("native"));
    }

    #[test]
    fn missing_file_is_an_error_with_context() {
        let dir = tempdir().expect("tempdir");
        let err = scan_file(
            &dir.path().join("gone.mp3"),
            &Extractor::default(),
            &ScanOptions::default(),
        )
        .expect_err("error");
        assert!(
            err.to_string().contains("failed to read"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn cancelled_scan_dispatches_nothing() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.mp3"), b"x").expect("write");
        fs::write(dir.path().join("b.mp3"), b"x").expect("write");

        let control = ScanControl::new();
        control.cancel();
        let events = Mutex::new(Vec::new());
        let report = scan_library(
            dir.path(),
            &Extractor::default(),
            &ScanOptions::default(),
            &control,
            |event| events.lock().expect("lock").push(event),
        )
        .expect("scan");

        assert!(report.cancelled);
        assert!(report.tracks.is_empty());
        let events = events.into_inner().expect("events");
        let started = ScanProgress::Started { total_files: 2 };
        assert_eq!(events.first(), Some(&started));
        assert_eq!(
            events.last(),
            Some(&ScanProgress::Finished {
                scanned: 0,
                skipped: 0,
                cancelled: true
            })
        );
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
