//! Content-derived track identity.
//!
//! Library rows get new surrogate keys on every rescan and paths change when
//! files move, so anything that must outlive those events (playlist entries,
//! cross-device merges) refers to a track by [`StableId`] instead. The id only
//! depends on title, artist, album and duration.

use crate::model::StableId;
use sha2::{Digest, Sha256};

const MISSING_DURATION: &[u8] = b"none";

pub fn compute_id(
    title: Option<&str>,
    artist: Option<&str>,
    album: Option<&str>,
    duration_secs: Option<f64>,
) -> StableId {
    let mut hasher = Sha256::new();
    for field in [title, artist, album] {
        let field = field.unwrap_or_default().as_bytes();
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    match duration_secs {
        Some(seconds) => hasher.update(canonical_bits(seconds).to_be_bytes()),
        None => hasher.update(MISSING_DURATION),
    }
    StableId::from_hex(hex::encode(hasher.finalize().as_slice()))
}

// Values that compare equal must hash equal.
fn canonical_bits(seconds: f64) -> u64 {
    if seconds.is_nan() {
        f64::NAN.to_bits()
    } else if seconds == 0.0 {
        0.0f64.to_bits()
    } else {
        seconds.to_bits()
    }
}
