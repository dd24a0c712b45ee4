use crate::error::*;
use byteorder::{ByteOrder, BE};
use std::fmt;

/// Four-character chunk tag. Shorter names are padded with trailing spaces.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct Tag([u8; 4]);

pub const MDHD: Tag = Tag::new(*b"MDhd");
pub const MDPG: Tag = Tag::new(*b"MDpg");
pub const MTRK: Tag = Tag::new(*b"MTrk");

impl Tag {
    pub const fn new(tag: [u8; 4]) -> Self {
        Self(tag)
    }

    pub fn data(&self) -> &[u8; 4] {
        &self.0
    }

    /// Music header, in either of its two spellings.
    pub fn is_header(self) -> bool {
        self == MDHD || self == MDPG
    }

    /// Tags that only appear inside a resource and never name one.
    pub fn is_inner(self) -> bool {
        self.is_header() || self == MTRK
    }

    pub fn format(self) -> Format {
        match &self.0 {
            b"ADL " => Format::Adlib,
            b"ROL " => Format::Roland,
            b"GMD " => Format::GeneralMidi,
            b"MAC " => Format::Mac,
            b"SPK " => Format::Speaker,
            _ => Format::Unknown,
        }
    }
}

impl std::convert::TryFrom<&[u8]> for Tag {
    type Error = ResError;

    fn try_from(value: &[u8]) -> Result<Self> {
        let tag: [u8; 4] = value.try_into().map_err(|_| ResError::InvalidTag)?;

        // graphic characters, then nothing but padding
        let name = tag.iter().position(|&b| b == b' ').unwrap_or(4);
        if name == 0
            || !tag[..name].iter().all(u8::is_ascii_graphic)
            || !tag[name..].iter().all(|&b| b == b' ')
        {
            return Err(ResError::InvalidTag);
        }
        Ok(Self(tag))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tag").field(&self.to_string()).finish()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
    }
}

/// Hardware family a resource was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Adlib,
    Roland,
    GeneralMidi,
    Mac,
    Speaker,
    Unknown,
}

impl Format {
    pub fn is_mt32(self) -> bool {
        matches!(self, Format::Roland)
    }

    /// Roland and Mac data use General MIDI program numbers.
    pub fn is_gm(self) -> bool {
        matches!(self, Format::Roland | Format::GeneralMidi | Format::Mac)
    }
}

/// Splits one `(tag, BE32 length, payload)` record off the front of `data`.
///
/// Unlike IFF, odd-sized chunks are not padded.
pub fn read_chunk<'a>(data: &mut &'a [u8]) -> Result<(Tag, &'a [u8])> {
    if data.len() < 8 {
        return Err(ResError::TruncatedHeader);
    }
    let tag = Tag::try_from(&data[0..4])?;
    let size = BE::read_u32(&data[4..8]);

    let available = data.len() - 8;
    if available < size as usize {
        return Err(ResError::TruncatedChunk {
            declared: size,
            available,
        });
    }
    let (payload, rest) = data[8..].split_at(size as usize);
    *data = rest;

    Ok((tag, payload))
}

/// Writes a chunk record. Used to assemble resources in tests and tools.
pub fn write_chunk(out: &mut Vec<u8>, tag: Tag, payload: &[u8]) {
    out.extend_from_slice(tag.data());
    let mut size = [0; 4];
    BE::write_u32(&mut size, payload.len() as u32);
    out.extend_from_slice(&size);
    out.extend_from_slice(payload);
}
