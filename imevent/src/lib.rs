//! Decoder for the MIDI-style event stream stored in `MTrk` chunks.
//!
//! A track is a delta time followed by alternating events and delta times.
//! Channel-voice and meta events follow Standard MIDI, without running
//! status. System exclusive blocks carry the vendor extension decoded by
//! [`SysEx`].

pub mod event;
pub use event::Event;
pub mod sysex;
pub use sysex::SysEx;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("stream ends in the middle of an event")]
    Truncated,
    #[error("invalid status byte 0x{0:02x}")]
    InvalidStatus(u8),
    #[error("variable-length quantity longer than 4 bytes")]
    VarTooLong,
}

pub type Result<T> = std::result::Result<T, EventError>;

/// Reads a variable-length quantity, returning the value and the bytes read.
pub fn read_var(data: &[u8]) -> Result<(u32, usize)> {
    let mut value = 0u32;
    for (i, b) in data.iter().take(4).enumerate() {
        value = (value << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if data.len() < 4 {
        Err(EventError::Truncated)
    } else {
        Err(EventError::VarTooLong)
    }
}

pub fn write_var(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 4];
    let mut len = 0;
    let mut rest = value & 0x0fff_ffff;
    loop {
        groups[len] = (rest & 0x7f) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | more);
    }
}
