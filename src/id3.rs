//! ID3v2 frame decoder.
//!
//! Everything here is a free function over byte slices. Malformed input never
//! errors: a bad header yields `None`, a bad frame ends the frame loop and
//! keeps whatever was decoded before it, and an unknown text encoding drops
//! only the field it belongs to.

use crate::model::ParsedTag;
use std::borrow::Cow;
use tracing::trace;

pub const MAGIC: &[u8; 3] = b"ID3";
pub const HEADER_LEN: usize = 10;

const FLAG_UNSYNCHRONIZED: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;

/// Frame header shape, chosen once per tag from the major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// ID3v2.2: 3-byte ids, 24-bit sizes, no frame flags.
    V2,
    /// ID3v2.3 and ID3v2.4: 4-byte ids, 32-bit sizes, 2 flag bytes.
    V3V4 { synchsafe_sizes: bool },
}

impl FrameLayout {
    pub fn from_major(major: u8) -> Option<Self> {
        match major {
            2 => Some(Self::V2),
            3 => Some(Self::V3V4 {
                synchsafe_sizes: false,
            }),
            4 => Some(Self::V3V4 {
                synchsafe_sizes: true,
            }),
            _ => None,
        }
    }

    pub fn header_len(self) -> usize {
        match self {
            Self::V2 => 6,
            Self::V3V4 { .. } => 10,
        }
    }

    pub fn id_len(self) -> usize {
        match self {
            Self::V2 => 3,
            Self::V3V4 { .. } => 4,
        }
    }

    fn frame_size(self, header: &[u8]) -> usize {
        match self {
            Self::V2 => {
                let bytes = &header[3..6];
                ((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | (bytes[2] as u32)) as usize
            }
            Self::V3V4 { synchsafe_sizes } => {
                let bytes = [header[4], header[5], header[6], header[7]];
                if synchsafe_sizes {
                    synchsafe_u32(bytes) as usize
                } else {
                    u32::from_be_bytes(bytes) as usize
                }
            }
        }
    }

    fn frame_flags(self, header: &[u8]) -> u16 {
        match self {
            Self::V2 => 0,
            Self::V3V4 { .. } => u16::from_be_bytes([header[8], header[9]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub major: u8,
    pub minor: u8,
    pub flags: u8,
    /// Body length as declared, excluding the 10-byte header.
    pub size: usize,
    pub layout: FrameLayout,
}

impl TagHeader {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..HEADER_LEN)?;
        if !header.starts_with(MAGIC) {
            return None;
        }
        let major = header[3];
        let layout = FrameLayout::from_major(major)?;
        Some(Self {
            major,
            minor: header[4],
            flags: header[5],
            size: synchsafe_u32([header[6], header[7], header[8], header[9]]) as usize,
            layout,
        })
    }

    pub fn unsynchronized(&self) -> bool {
        self.flags & FLAG_UNSYNCHRONIZED != 0
    }

    pub fn has_extended_header(&self) -> bool {
        self.flags & FLAG_EXTENDED_HEADER != 0
    }
}

/// One frame as it appears on the wire, borrowed from the tag body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame<'a> {
    pub id: String,
    pub size: usize,
    pub flags: u16,
    pub payload: &'a [u8],
}

/// Iterator over the frames of a tag body. Ends at padding, a blank id, or
/// the first frame whose declared size does not fit.
pub struct Frames<'a> {
    body: &'a [u8],
    pos: usize,
    layout: FrameLayout,
    done: bool,
}

pub fn frames(body: &[u8], layout: FrameLayout) -> Frames<'_> {
    Frames {
        body,
        pos: 0,
        layout,
        done: false,
    }
}

impl<'a> Frames<'a> {
    fn stop(&mut self, reason: &'static str) -> Option<RawFrame<'a>> {
        if self.pos < self.body.len() {
            trace!(
                offset = self.pos,
                remaining = self.body.len() - self.pos,
                reason,
                "frame loop stopped"
            );
        }
        self.done = true;
        None
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = RawFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header_len = self.layout.header_len();
        let remaining = self.body.len().saturating_sub(self.pos);
        if remaining < header_len {
            return self.stop("not enough bytes for a frame header");
        }

        let header = &self.body[self.pos..self.pos + header_len];
        let id_bytes = &header[..self.layout.id_len()];
        if id_bytes.iter().all(|byte| *byte == 0 || *byte == b' ') {
            return self.stop("blank frame id");
        }

        let size = self.layout.frame_size(header);
        let data_start = self.pos + header_len;
        if size == 0 || size > self.body.len() - data_start {
            return self.stop("frame size out of bounds");
        }

        let payload = &self.body[data_start..data_start + size];
        let frame = RawFrame {
            id: String::from_utf8_lossy(id_bytes).into_owned(),
            size,
            flags: self.layout.frame_flags(header),
            payload,
        };
        self.pos = data_start + size;
        Some(frame)
    }
}

/// Decode the ID3v2 tag at the start of `bytes`.
///
/// Returns `None` when there is no tag or when no supported field could be
/// decoded from it.
pub fn decode(bytes: &[u8]) -> Option<ParsedTag> {
    let header = TagHeader::parse(bytes)?;

    let end = HEADER_LEN.saturating_add(header.size).min(bytes.len());
    let raw_body = &bytes[HEADER_LEN..end];
    let body: Cow<'_, [u8]> = if header.unsynchronized() {
        Cow::Owned(remove_unsync(raw_body))
    } else {
        Cow::Borrowed(raw_body)
    };
    let body = skip_extended_header(&body, &header)?;

    let mut tag = ParsedTag::default();
    for frame in frames(body, header.layout) {
        apply_frame(&mut tag, &frame);
    }

    if tag.is_empty() {
        trace!(
            major = header.major,
            "tag header present but no fields decoded"
        );
        return None;
    }
    Some(tag)
}

fn skip_extended_header<'a>(body: &'a [u8], header: &TagHeader) -> Option<&'a [u8]> {
    if !header.has_extended_header() {
        return Some(body);
    }
    let size = body.get(..4)?;
    let size = [size[0], size[1], size[2], size[3]];
    // v2.4 counts the size field itself, v2.3 does not.
    let skip = if header.major >= 4 {
        (synchsafe_u32(size) as usize).max(4)
    } else {
        (u32::from_be_bytes(size) as usize).saturating_add(4)
    };
    body.get(skip..)
}

fn apply_frame(tag: &mut ParsedTag, frame: &RawFrame<'_>) {
    let payload = frame.payload;
    match frame.id.as_str() {
        "TIT2" | "TT2" => fill(&mut tag.title, || decode_text_frame(payload)),
        "TPE1" | "TP1" => fill(&mut tag.artist, || decode_text_frame(payload)),
        "TALB" | "TAL" => fill(&mut tag.album, || decode_text_frame(payload)),
        "TPE2" | "TP2" => fill(&mut tag.album_artist, || decode_text_frame(payload)),
        "TCON" | "TCO" => fill(&mut tag.genre, || decode_text_frame(payload)),
        "TYER" | "TDRC" | "TYE" => fill(&mut tag.year, || decode_text_frame(payload)),
        "TXXX" | "TXX" => fill(&mut tag.album, || {
            let (description, value) = decode_user_text_frame(payload)?;
            description
                .to_lowercase()
                .contains("album")
                .then_some(value)
        }),
        "COMM" | "COM" => fill(&mut tag.comment, || decode_comment_frame(payload)),
        "APIC" => fill(&mut tag.artwork, || Some(payload.to_vec())),
        _ => {}
    }
}

fn fill<T>(slot: &mut Option<T>, value: impl FnOnce() -> Option<T>) {
    if slot.is_none() {
        *slot = value();
    }
}

/// Text encoding selector found in the first byte of text-bearing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Latin1,
    Utf16WithBom,
    Utf16Be,
    Utf8,
}

impl TextEncoding {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Latin1),
            1 => Some(Self::Utf16WithBom),
            2 => Some(Self::Utf16Be),
            3 => Some(Self::Utf8),
            _ => None,
        }
    }

    fn is_wide(self) -> bool {
        matches!(self, Self::Utf16WithBom | Self::Utf16Be)
    }

    /// Split at the first terminator: one NUL for 8-bit encodings, an
    /// aligned NUL pair for UTF-16.
    fn split_terminated(self, bytes: &[u8]) -> Option<(&[u8], &[u8])> {
        if self.is_wide() {
            let idx = bytes
                .chunks_exact(2)
                .position(|pair| pair[0] == 0 && pair[1] == 0)?
                * 2;
            Some((&bytes[..idx], &bytes[idx + 2..]))
        } else {
            let idx = bytes.iter().position(|byte| *byte == 0)?;
            Some((&bytes[..idx], &bytes[idx + 1..]))
        }
    }

    /// Decode up to the first terminator (or the end of `bytes`).
    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes
                .iter()
                .take_while(|byte| **byte != 0)
                .map(|byte| char::from(*byte))
                .collect(),
            Self::Utf16WithBom => decode_utf16_with_bom(bytes),
            Self::Utf16Be => decode_utf16(bytes, true),
            Self::Utf8 => {
                let end = bytes
                    .iter()
                    .position(|byte| *byte == 0)
                    .unwrap_or(bytes.len());
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
        }
    }
}

fn split_encoding(payload: &[u8]) -> Option<(TextEncoding, &[u8])> {
    let (&selector, rest) = payload.split_first()?;
    let encoding = TextEncoding::from_byte(selector);
    if encoding.is_none() {
        trace!(selector, "unsupported text encoding");
    }
    Some((encoding?, rest))
}

fn clean_text(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == text.len() {
        return Some(text);
    }
    Some(trimmed.to_string())
}

fn decode_text_frame(payload: &[u8]) -> Option<String> {
    let (encoding, rest) = split_encoding(payload)?;
    clean_text(encoding.decode(&remove_unsync(rest)))
}

/// `(description, value)` of a user-defined text frame.
fn decode_user_text_frame(payload: &[u8]) -> Option<(String, String)> {
    let (encoding, rest) = split_encoding(payload)?;
    let rest = remove_unsync(rest);
    let (description, value) = encoding.split_terminated(&rest)?;
    let description = encoding.decode(description);
    let value = clean_text(encoding.decode(value))?;
    Some((description, value))
}

fn decode_comment_frame(payload: &[u8]) -> Option<String> {
    let (encoding, rest) = split_encoding(payload)?;
    let after_language = rest.get(3..)?;
    let (_, body) = encoding.split_terminated(after_language)?;
    clean_text(encoding.decode(body))
}

/// Image bytes inside an APIC payload, past the MIME type, picture type and
/// description. [`decode`] keeps the whole payload as artwork; this is for
/// callers that need the image alone.
pub fn picture_data(payload: &[u8]) -> Option<&[u8]> {
    let (encoding, rest) = split_encoding(payload)?;
    let mime_end = rest.iter().position(|byte| *byte == 0)?;
    // MIME terminator, then the picture type byte.
    let after_type = rest.get(mime_end + 2..)?;
    let (_, data) = encoding.split_terminated(after_type)?;
    (!data.is_empty()).then_some(data)
}

fn decode_utf16_with_bom(bytes: &[u8]) -> String {
    if bytes.len() >= 2 {
        if bytes[0] == 0xFE && bytes[1] == 0xFF {
            return decode_utf16(&bytes[2..], true);
        }
        if bytes[0] == 0xFF && bytes[1] == 0xFE {
            return decode_utf16(&bytes[2..], false);
        }
    }
    decode_utf16(bytes, false)
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let mut units = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let value = if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        };
        if value == 0 {
            break;
        }
        units.push(value);
    }
    String::from_utf16_lossy(&units)
}

/// Concatenate the low 7 bits of each byte, most significant first.
pub fn synchsafe_u32(bytes: [u8; 4]) -> u32 {
    ((bytes[0] as u32) & 0x7f) << 21
        | ((bytes[1] as u32) & 0x7f) << 14
        | ((bytes[2] as u32) & 0x7f) << 7
        | ((bytes[3] as u32) & 0x7f)
}

/// Collapse every `FF 00` pair into a single `FF`.
pub fn remove_unsync(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        out.push(byte);
        if byte == 0xFF && bytes.get(idx + 1) == Some(&0x00) {
            idx += 2;
        } else {
            idx += 1;
        }
    }
    out
}
