use crate::identity::compute_id;
use crate::model::{Field, ReconciledMetadata, SourceKind, SourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ALBUM_SEPARATOR: &str = " - ";

/// Tuning for the album heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Download-site credits removed from comments before they are
    /// considered as an album name.
    #[serde(default = "default_credit_markers")]
    pub credit_markers: Vec<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            credit_markers: default_credit_markers(),
        }
    }
}

fn default_credit_markers() -> Vec<String> {
    vec![
        String::from("Downloaded from MP3Juices"),
        String::from("Downloaded via SoundLoaders"),
    ]
}

pub fn reconcile(sources: &[SourceRecord]) -> ReconciledMetadata {
    reconcile_with(sources, &ReconcileOptions::default())
}

pub fn reconcile_with(sources: &[SourceRecord], options: &ReconcileOptions) -> ReconciledMetadata {
    let mut ordered: Vec<&SourceRecord> = sources.iter().collect();
    ordered.sort_by_key(|source| source.rank());

    let mut fields = ordered_merge(ordered.iter().map(|source| source.tag.text_fields()));

    if !fields.contains_key(&Field::Album) {
        let album = fields
            .get(&Field::Comment)
            .and_then(|comment| album_from_comment(comment, &options.credit_markers))
            .or_else(|| fields.get(&Field::AlbumArtist).cloned());
        if let Some(album) = album {
            fields.insert(Field::Album, album);
        }
    }

    let year = fields.get(&Field::Year).and_then(|raw| normalize_year(raw));
    let duration_secs = ordered
        .iter()
        .filter_map(|source| source.duration_secs)
        .find(|seconds| seconds.is_finite() && *seconds >= 0.0);
    let artwork = artwork_from(&ordered, SourceKind::Native)
        .or_else(|| artwork_from(&ordered, SourceKind::FrameDecoder));

    let stable_id = compute_id(
        fields.get(&Field::Title).map(String::as_str),
        fields.get(&Field::Artist).map(String::as_str),
        fields.get(&Field::Album).map(String::as_str),
        duration_secs,
    );

    ReconciledMetadata {
        title: fields.remove(&Field::Title),
        artist: fields.remove(&Field::Artist),
        album: fields.remove(&Field::Album),
        album_artist: fields.remove(&Field::AlbumArtist),
        genre: fields.remove(&Field::Genre),
        year,
        comment: fields.remove(&Field::Comment),
        duration_secs,
        artwork,
        stable_id,
    }
}

/// Keep the first non-empty value seen for each key. Candidate lists are
/// visited in the order given, so earlier lists take priority.
pub fn ordered_merge<'a, K, C, S>(candidates: C) -> BTreeMap<K, String>
where
    K: Ord,
    C: IntoIterator<Item = S>,
    S: IntoIterator<Item = (K, &'a str)>,
{
    let mut merged = BTreeMap::new();
    for source in candidates {
        for (key, value) in source {
            if value.is_empty() {
                continue;
            }
            merged.entry(key).or_insert_with(|| value.to_string());
        }
    }
    merged
}

/// Album guess from a free-form comment. Takes the text before the first
/// `" - "`, or the whole comment when it has no separator and is not a URL.
pub fn album_from_comment(comment: &str, credit_markers: &[String]) -> Option<String> {
    let mut cleaned = comment.to_string();
    for marker in credit_markers.iter().filter(|marker| !marker.is_empty()) {
        cleaned = cleaned.replace(marker.as_str(), "");
    }
    let cleaned = cleaned.trim();

    if let Some((before, _)) = cleaned.split_once(ALBUM_SEPARATOR) {
        let before = before.trim();
        return (!before.is_empty()).then(|| before.to_string());
    }

    if cleaned.is_empty() || looks_like_url(cleaned) {
        return None;
    }
    Some(cleaned.to_string())
}

fn looks_like_url(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("://") || lower.starts_with("www.")
}

/// Digits of `raw` as a positive year. `"2001-04-17"` becomes `20010417`.
pub fn normalize_year(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<i32>().ok().filter(|year| *year > 0)
}

fn artwork_from(sources: &[&SourceRecord], kind: SourceKind) -> Option<Vec<u8>> {
    sources
        .iter()
        .filter(|source| source.kind == kind)
        .find_map(|source| source.tag.artwork.clone().filter(|bytes| !bytes.is_empty()))
}
