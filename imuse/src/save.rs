//! Versioned binary save format.
//!
//! The same field list is used to write and to read: every `sync_*` call
//! either stores the value or overwrites it with the stored one. Fields
//! added later carry the version they appeared in and are skipped when an
//! older save is read, keeping their current value.

use crate::{Error, Result};
use byteorder::{ByteOrder, BE};

pub const SAVE_MAGIC: &[u8; 4] = b"IMUS";
pub const CURRENT_VERSION: u32 = 3;

pub trait Serializer {
    fn version(&self) -> u32;
    fn is_loading(&self) -> bool;

    /// Writes the bytes, or fills them in when loading.
    fn sync_bytes(&mut self, bytes: &mut [u8]) -> Result<()>;

    fn sync_u8(&mut self, value: &mut u8, since: u32) -> Result<()> {
        if self.version() < since {
            return Ok(());
        }
        let mut buf = [*value];
        self.sync_bytes(&mut buf)?;
        *value = buf[0];
        Ok(())
    }

    fn sync_i8(&mut self, value: &mut i8, since: u32) -> Result<()> {
        let mut raw = *value as u8;
        self.sync_u8(&mut raw, since)?;
        *value = raw as i8;
        Ok(())
    }

    fn sync_bool(&mut self, value: &mut bool, since: u32) -> Result<()> {
        let mut raw = *value as u8;
        self.sync_u8(&mut raw, since)?;
        *value = raw != 0;
        Ok(())
    }

    fn sync_u16(&mut self, value: &mut u16, since: u32) -> Result<()> {
        if self.version() < since {
            return Ok(());
        }
        let mut buf = [0; 2];
        BE::write_u16(&mut buf, *value);
        self.sync_bytes(&mut buf)?;
        *value = BE::read_u16(&buf);
        Ok(())
    }

    fn sync_i16(&mut self, value: &mut i16, since: u32) -> Result<()> {
        let mut raw = *value as u16;
        self.sync_u16(&mut raw, since)?;
        *value = raw as i16;
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32, since: u32) -> Result<()> {
        if self.version() < since {
            return Ok(());
        }
        let mut buf = [0; 4];
        BE::write_u32(&mut buf, *value);
        self.sync_bytes(&mut buf)?;
        *value = BE::read_u32(&buf);
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32, since: u32) -> Result<()> {
        let mut raw = *value as u32;
        self.sync_u32(&mut raw, since)?;
        *value = raw as i32;
        Ok(())
    }

    /// Pool link stored as index + 1, with 0 for none.
    fn sync_link(&mut self, link: &mut Option<usize>, bound: usize, since: u32) -> Result<()> {
        let mut raw = link.map_or(0, |i| i as u8 + 1);
        self.sync_u8(&mut raw, since)?;
        *link = match raw {
            0 => None,
            i if (i as usize) <= bound => Some(i as usize - 1),
            _ => return Err(Error::CorruptSave("link out of range")),
        };
        Ok(())
    }
}

/// Serializer writing the current version.
#[derive(Debug, Clone)]
pub struct SaveWriter {
    data: Vec<u8>,
}

impl Default for SaveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveWriter {
    pub fn new() -> Self {
        let mut data = SAVE_MAGIC.to_vec();
        let mut version = [0; 4];
        BE::write_u32(&mut version, CURRENT_VERSION);
        data.extend_from_slice(&version);
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Serializer for SaveWriter {
    fn version(&self) -> u32 {
        CURRENT_VERSION
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn sync_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }
}

/// Serializer reading any version up to the current one.
#[derive(Debug, Clone)]
pub struct SaveReader<'a> {
    data: &'a [u8],
    version: u32,
}

impl<'a> SaveReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::SaveTruncated);
        }
        if &data[0..4] != SAVE_MAGIC {
            return Err(Error::BadMagic);
        }
        let version = BE::read_u32(&data[4..8]);
        if version == 0 || version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(Self {
            data: &data[8..],
            version,
        })
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl Serializer for SaveReader<'_> {
    fn version(&self) -> u32 {
        self.version
    }

    fn is_loading(&self) -> bool {
        true
    }

    fn sync_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        if self.data.len() < bytes.len() {
            return Err(Error::SaveTruncated);
        }
        let (head, rest) = self.data.split_at(bytes.len());
        bytes.copy_from_slice(head);
        self.data = rest;
        Ok(())
    }
}
