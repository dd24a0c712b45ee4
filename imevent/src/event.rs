use super::{read_var, EventError, Result, SysEx};
use byteorder::{ByteOrder, BE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Release a note.
    NoteOff { channel: u8, note: u8 },
    /// Start a note. A zero velocity is decoded as `NoteOff`.
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Polyphonic key pressure. Carried in the data but never acted upon.
    Aftertouch { channel: u8 },
    /// Controller change.
    Controller { channel: u8, controller: u8, value: u8 },
    /// Program change.
    ProgramChange { channel: u8, program: u8 },
    /// Channel pressure, ignored like aftertouch.
    ChannelPressure { channel: u8 },
    /// Pitch wheel position, centred on zero (-8192..=8191).
    PitchBend { channel: u8, value: i16 },

    /// Vendor system exclusive block.
    SysEx(SysEx),

    /// End of the track. Playback of the sound stops here.
    EndOfTrack,
    /// Set tempo, in microseconds per beat.
    Tempo(u32),
    /// Any other meta event. Skipped.
    Meta(u8),
}

fn need(data: &[u8], len: usize) -> Result<()> {
    if data.len() < len {
        Err(EventError::Truncated)
    } else {
        Ok(())
    }
}

impl Event {
    /// Returns both the event and the amount of bytes read.
    pub fn read(data: &[u8]) -> Result<(Self, usize)> {
        use Event::*;

        let status = *data.first().ok_or(EventError::Truncated)?;
        let channel = status & 0x0f;

        match status >> 4 {
            0x8 => {
                need(data, 3)?;
                Ok((NoteOff { channel, note: data[1] }, 3))
            }
            0x9 => {
                need(data, 3)?;
                let (note, velocity) = (data[1], data[2]);
                if velocity == 0 {
                    Ok((NoteOff { channel, note }, 3))
                } else {
                    Ok((NoteOn { channel, note, velocity }, 3))
                }
            }
            0xa => {
                need(data, 3)?;
                Ok((Aftertouch { channel }, 3))
            }
            0xb => {
                need(data, 3)?;
                let (controller, value) = (data[1], data[2]);
                Ok((Controller { channel, controller, value }, 3))
            }
            0xc => {
                need(data, 2)?;
                Ok((ProgramChange { channel, program: data[1] }, 2))
            }
            0xd => {
                need(data, 2)?;
                Ok((ChannelPressure { channel }, 2))
            }
            0xe => {
                need(data, 3)?;
                let raw = ((data[2] & 0x7f) as i16) << 7 | (data[1] & 0x7f) as i16;
                Ok((PitchBend { channel, value: raw - 0x2000 }, 3))
            }

            0xf => match channel {
                0x0 => {
                    let (len, size) = read_var(&data[1..])?;
                    let start = 1 + size;
                    let end = start + len as usize;
                    need(data, end)?;
                    Ok((SysEx(super::SysEx::read(&data[start..end])), end))
                }
                0xf => {
                    need(data, 2)?;
                    match data[1] {
                        0x2f => {
                            // the length byte is optional in practice
                            let size = read_var(&data[2..])
                                .map(|(len, size)| 2 + size + len as usize)
                                .unwrap_or(2);
                            Ok((EndOfTrack, size.min(data.len())))
                        }
                        0x51 => {
                            need(data, 6)?;
                            Ok((Tempo(BE::read_u24(&data[3..6])), 6))
                        }
                        kind => {
                            let (len, size) = read_var(&data[2..])?;
                            let end = 2 + size + len as usize;
                            need(data, end)?;
                            Ok((Meta(kind), end))
                        }
                    }
                }
                _ => Err(EventError::InvalidStatus(status)),
            },

            _ => Err(EventError::InvalidStatus(status)),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Event::EndOfTrack)
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Event::NoteOn { .. } | Event::NoteOff { .. })
    }
}
