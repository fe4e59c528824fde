#![allow(dead_code)]

/// Builds ID3v2 tags byte by byte for tests.
pub struct TagWriter {
    major: u8,
    flags: u8,
    body: Vec<u8>,
}

impl TagWriter {
    pub fn new(major: u8) -> Self {
        assert!(
            (2..=4).contains(&major),
            "unsupported major version {major}"
        );
        Self {
            major,
            flags: 0,
            body: Vec::new(),
        }
    }

    pub fn unsynchronized(mut self) -> Self {
        self.flags |= 0x80;
        self
    }

    pub fn frame(mut self, id: &str, payload: &[u8]) -> Self {
        self.body.extend(self.frame_header(id, payload.len()));
        self.body.extend_from_slice(payload);
        self
    }

    /// Frame whose header declares `declared_size` regardless of payload.
    pub fn frame_with_size(mut self, id: &str, declared_size: usize, payload: &[u8]) -> Self {
        self.body.extend(self.frame_header(id, declared_size));
        self.body.extend_from_slice(payload);
        self
    }

    pub fn text(self, id: &str, encoding: u8, text: &str) -> Self {
        let mut payload = vec![encoding];
        payload.extend(encode_text(encoding, text));
        self.frame(id, &payload)
    }

    pub fn user_text(self, id: &str, encoding: u8, description: &str, value: &str) -> Self {
        let mut payload = vec![encoding];
        payload.extend(encode_text(encoding, description));
        payload.extend(terminator(encoding));
        payload.extend(encode_text(encoding, value));
        self.frame(id, &payload)
    }

    pub fn comment(self, id: &str, encoding: u8, description: &str, body: &str) -> Self {
        let mut payload = vec![encoding];
        payload.extend_from_slice(b"eng");
        payload.extend(encode_text(encoding, description));
        payload.extend(terminator(encoding));
        payload.extend(encode_text(encoding, body));
        self.frame(id, &payload)
    }

    pub fn picture(self, mime: &str, description: &str, data: &[u8]) -> Self {
        self.frame("APIC", &picture_payload(mime, description, data))
    }

    pub fn padding(mut self, len: usize) -> Self {
        self.body.extend(std::iter::repeat_n(0u8, len));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let body = if self.flags & 0x80 != 0 {
            add_unsync(&self.body)
        } else {
            self.body
        };
        let mut out = b"ID3".to_vec();
        out.extend_from_slice(&[self.major, 0, self.flags]);
        out.extend_from_slice(&synchsafe(body.len()));
        out.extend(body);
        out
    }

    fn frame_header(&self, id: &str, size: usize) -> Vec<u8> {
        let mut out = id.as_bytes().to_vec();
        match self.major {
            2 => {
                assert_eq!(id.len(), 3, "v2.2 frame ids are 3 bytes");
                out.extend_from_slice(&(size as u32).to_be_bytes()[1..]);
            }
            3 => {
                assert_eq!(id.len(), 4, "v2.3 frame ids are 4 bytes");
                out.extend_from_slice(&(size as u32).to_be_bytes());
                out.extend_from_slice(&[0, 0]);
            }
            _ => {
                assert_eq!(id.len(), 4, "v2.4 frame ids are 4 bytes");
                out.extend_from_slice(&synchsafe(size));
                out.extend_from_slice(&[0, 0]);
            }
        }
        out
    }
}

pub fn synchsafe(value: usize) -> [u8; 4] {
    [
        ((value >> 21) & 0x7f) as u8,
        ((value >> 14) & 0x7f) as u8,
        ((value >> 7) & 0x7f) as u8,
        (value & 0x7f) as u8,
    ]
}

/// Latin-1 APIC payload with picture type 3 (front cover).
pub fn picture_payload(mime: &str, description: &str, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0];
    payload.extend_from_slice(mime.as_bytes());
    payload.push(0);
    payload.push(3);
    payload.extend_from_slice(description.as_bytes());
    payload.push(0);
    payload.extend_from_slice(data);
    payload
}

/// Insert a zero after every `FF`.
pub fn add_unsync(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 8);
    for byte in bytes {
        out.push(*byte);
        if *byte == 0xFF {
            out.push(0);
        }
    }
    out
}

pub fn encode_text(encoding: u8, text: &str) -> Vec<u8> {
    match encoding {
        0 => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).expect("latin-1 text"))
            .collect(),
        1 => {
            let mut out = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        2 => text
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect(),
        _ => text.as_bytes().to_vec(),
    }
}

pub fn terminator(encoding: u8) -> Vec<u8> {
    match encoding {
        1 | 2 => vec![0, 0],
        _ => vec![0],
    }
}
