//! Tagged chunk container used by iMUSE music resources.
//!
//! A resource is one outer chunk whose tag names the format family (`ADL `,
//! `ROL `, `GMD `, ...). Its payload is a flat list of further chunks: an
//! `MDhd` (or `MDpg`) header followed by one or more `MTrk` tracks.

mod error;
pub use error::*;
mod types;
pub use types::*;

#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    pub family: Tag,
    pub format: Format,
    body: &'a [u8],
}

impl<'a> Resource<'a> {
    pub fn read(data: &'a [u8]) -> Result<Self> {
        let mut data = data;
        let (family, body) = read_chunk(&mut data)?;
        if family.is_inner() {
            return Err(ResError::NotAFamily(family));
        }

        Ok(Self {
            family,
            format: family.format(),
            body,
        })
    }

    pub fn chunks(&self) -> Chunks<'a> {
        Chunks { data: self.body }
    }

    /// Returns the payload of the `index`-th chunk tagged `id`.
    ///
    /// The scan stops silently at the first malformed chunk.
    pub fn find(&self, id: Tag, index: usize) -> Option<&'a [u8]> {
        self.chunks()
            .map_while(|chunk| chunk.ok())
            .filter(|(chunk_id, _)| *chunk_id == id)
            .nth(index)
            .map(|(_, data)| data)
    }

    pub fn header(&self) -> Result<&'a [u8]> {
        self.find(MDHD, 0)
            .or_else(|| self.find(MDPG, 0))
            .ok_or(ResError::MissingHeader)
    }

    pub fn track(&self, index: usize) -> Option<&'a [u8]> {
        self.find(MTRK, index)
    }

    pub fn track_count(&self) -> usize {
        self.chunks()
            .map_while(|chunk| chunk.ok())
            .filter(|(id, _)| *id == MTRK)
            .count()
    }
}

/// Iterator over the inner chunks of a resource.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<(Tag, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let chunk = read_chunk(&mut self.data);
        if chunk.is_err() {
            self.data = &[];
        }
        Some(chunk)
    }
}
