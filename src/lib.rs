//! Audio tag extraction for the music library.
//!
//! Bytes of one file go through several [`providers`], the answers are merged
//! by [`reconcile`], and every merged record carries a [`StableId`] derived
//! from its content so playlist references survive rescans and file moves.
//!
//! ```no_run
//! use std::path::Path;
//! use tune_tags::config::ScanOptions;
//! use tune_tags::library::{Extractor, ScanControl, scan_library};
//!
//! let options = ScanOptions::default();
//! let extractor = Extractor::new(options.reconcile.clone());
//! let report = scan_library(Path::new("/music"), &extractor, &options, &ScanControl::new(), |_| {})?;
//! for track in &report.tracks {
//!     println!("{} {}", track.metadata.stable_id, track.display_title);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod id3;
pub mod identity;
pub mod library;
pub mod model;
pub mod providers;
pub mod reconcile;

pub use id3::decode;
pub use identity::compute_id;
pub use model::{ParsedTag, ReconciledMetadata, SourceKind, SourceRecord, StableId};
pub use reconcile::reconcile;
