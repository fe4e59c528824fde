//! Metadata providers feeding the reconciler.
//!
//! Each provider looks at the same in-memory file and reports what it could
//! read as a [`SourceRecord`]. Providers never fail; anything they cannot
//! read is simply absent.

use crate::id3;
use crate::model::{ParsedTag, SourceKind, SourceRecord};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::ItemKey;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use tracing::debug;

pub trait MetadataProvider: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// `path_hint` is only used for format hints, never for identity.
    fn read(&self, path_hint: &Path, bytes: &[u8]) -> Option<SourceRecord>;
}

/// All built-in providers, highest priority first.
pub fn default_providers() -> Vec<Box<dyn MetadataProvider>> {
    vec![
        Box::new(ContainerProvider),
        Box::new(TagLibraryProvider),
        Box::new(FrameDecoderProvider),
    ]
}

fn finish(kind: SourceKind, tag: ParsedTag, duration_secs: Option<f64>) -> Option<SourceRecord> {
    if tag.is_empty() && duration_secs.is_none() {
        return None;
    }
    Some(SourceRecord::new(kind, tag).with_duration(duration_secs))
}

/// Container-level metadata and duration through symphonia's probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerProvider;

impl MetadataProvider for ContainerProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::Native
    }

    fn read(&self, path_hint: &Path, bytes: &[u8]) -> Option<SourceRecord> {
        let source = MediaSourceStream::new(
            Box::new(Cursor::new(bytes.to_vec())),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        if let Some(extension) = path_hint.extension().and_then(OsStr::to_str) {
            hint.with_extension(extension);
        }

        let mut probed = match get_probe().format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(probed) => probed,
            Err(err) => {
                debug!(path = %path_hint.display(), error = %err, "container probe failed");
                return None;
            }
        };

        let mut tag = ParsedTag::default();
        let container_metadata = probed.format.metadata();
        if let Some(revision) = container_metadata.current() {
            absorb_revision(&mut tag, revision);
        }
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                absorb_revision(&mut tag, revision);
            }
        }

        let duration_secs = probed
            .format
            .default_track()
            .and_then(|track| codec_duration_secs(&track.codec_params));

        finish(self.kind(), tag, duration_secs)
    }
}

fn absorb_revision(tag: &mut ParsedTag, revision: &MetadataRevision) {
    let tags = revision.tags();
    let text_slots: [(&mut Option<String>, StandardTagKey, &[&str]); 7] = [
        (&mut tag.title, StandardTagKey::TrackTitle, &["title"]),
        (&mut tag.artist, StandardTagKey::Artist, &["artist"]),
        (&mut tag.album, StandardTagKey::Album, &["album"]),
        (
            &mut tag.album_artist,
            StandardTagKey::AlbumArtist,
            &["albumartist", "album_artist", "album artist"],
        ),
        (&mut tag.genre, StandardTagKey::Genre, &["genre"]),
        (&mut tag.year, StandardTagKey::Date, &["date", "year"]),
        (&mut tag.comment, StandardTagKey::Comment, &["comment"]),
    ];
    for (slot, standard_key, fallback_keys) in text_slots {
        fill(slot, || tag_value(tags, standard_key, fallback_keys));
    }
    fill(&mut tag.artwork, || {
        revision
            .visuals()
            .iter()
            .find(|visual| !visual.data.is_empty())
            .map(|visual| visual.data.to_vec())
    });
}

fn fill<T>(slot: &mut Option<T>, value: impl FnOnce() -> Option<T>) {
    if slot.is_none() {
        *slot = value();
    }
}

fn tag_value(
    tags: &[symphonia::core::meta::Tag],
    standard_key: StandardTagKey,
    fallback_keys: &[&str],
) -> Option<String> {
    let from_standard = tags
        .iter()
        .find(|tag| tag.std_key == Some(standard_key))
        .map(|tag| tag.value.to_string());

    let from_fallback = || {
        tags.iter()
            .find(|tag| {
                fallback_keys
                    .iter()
                    .any(|key| tag.key.eq_ignore_ascii_case(key))
            })
            .map(|tag| tag.value.to_string())
    };

    from_standard.or_else(from_fallback).and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then_some(trimmed.to_string())
    })
}

fn codec_duration_secs(codec_params: &CodecParameters) -> Option<f64> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(time.seconds as f64 + time.frac);
    }

    codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
        .map(|(frame_count, sample_rate)| frame_count as f64 / sample_rate as f64)
}

/// Tags and audio properties through lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagLibraryProvider;

impl MetadataProvider for TagLibraryProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::TagLibrary
    }

    fn read(&self, path_hint: &Path, bytes: &[u8]) -> Option<SourceRecord> {
        let tagged_file = match Probe::new(Cursor::new(bytes))
            .guess_file_type()
            .map_err(lofty::error::LoftyError::from)
            .and_then(|probe| probe.read())
        {
            Ok(tagged_file) => tagged_file,
            Err(err) => {
                debug!(
                    path = %path_hint.display(),
                    error = %err,
                    "tag library could not read file"
                );
                return None;
            }
        };

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(parsed_from_lofty)
            .unwrap_or_default();

        let duration = tagged_file.properties().duration();
        let duration_secs = (!duration.is_zero()).then(|| duration.as_secs_f64());

        finish(self.kind(), tag, duration_secs)
    }
}

fn parsed_from_lofty(tag: &Tag) -> ParsedTag {
    let mut parsed = ParsedTag::default();
    for item in tag.items() {
        let Some(text) = item.value().text() else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let slot = match item.key() {
            ItemKey::TrackTitle => &mut parsed.title,
            ItemKey::TrackArtist => &mut parsed.artist,
            ItemKey::AlbumTitle => &mut parsed.album,
            ItemKey::AlbumArtist => &mut parsed.album_artist,
            ItemKey::Genre => &mut parsed.genre,
            ItemKey::Year | ItemKey::RecordingDate => &mut parsed.year,
            ItemKey::Comment => &mut parsed.comment,
            _ => continue,
        };
        fill(slot, || Some(text.to_string()));
    }
    parsed
}

/// The built-in ID3v2 decoder, used as the last resort.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoderProvider;

impl MetadataProvider for FrameDecoderProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::FrameDecoder
    }

    fn read(&self, path_hint: &Path, bytes: &[u8]) -> Option<SourceRecord> {
        let Some(tag) = id3::decode(bytes) else {
            debug!(path = %path_hint.display(), "no ID3v2 tag");
            return None;
        };
        Some(SourceRecord::new(self.kind(), tag))
    }
}
