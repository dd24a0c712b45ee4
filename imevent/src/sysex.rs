use byteorder::{ByteOrder, BE};

/// Manufacturer byte that opens every vendor block.
pub const IMUSE_SYSEX_ID: u8 = 0x7d;

/// Vendor system exclusive command.
///
/// Most payloads are nibble-encoded: each data byte is carried as two bytes
/// holding the high and low nibble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysEx {
    /// Block from another manufacturer. Ignored.
    Foreign,

    /// Allocate and configure the part serving a channel.
    PartSetup {
        channel: u8,
        on: bool,
        reverb: bool,
        /// Priority adjustment on top of the player's priority.
        priority: i8,
        volume: u8,
        pan: i8,
        /// -128 marks an untransposed part.
        transpose: i8,
        /// Set together with the -128 transpose on General MIDI data.
        percussion: bool,
        detune: i8,
        pitchbend_factor: u8,
        program: u8,
    },
    /// Release the part serving a channel.
    ShutdownPart { channel: u8 },
    /// Marks the start of the song. Nothing to do.
    StartOfSong,

    /// Instrument definition for one part. The blob is driver specific.
    PartInstrument { channel: u8, data: Vec<u8> },
    /// Instrument definition stored in a global slot, later selected by
    /// program changes on non-GM data.
    GlobalInstrument { slot: u8, data: Vec<u8> },
    /// Adjust a driver parameter of a part.
    ParamAdjust { channel: u8, param: u16, value: u16 },

    /// Jump to a position, gated by the jump hook.
    HookJump { cmd: u8, track: u16, beat: u16, tick: u16 },
    /// Change the player transpose, gated by the transpose hook.
    HookTranspose { cmd: u8, relative: bool, value: i8 },
    /// Switch a part on or off, gated by that channel's hook.
    HookPartOnOff { channel: u8, cmd: u8, on: bool },
    /// Set a part volume, gated by that channel's hook.
    HookPartVolume { channel: u8, cmd: u8, volume: u8 },
    /// Set a part program, gated by that channel's hook.
    HookPartProgram { channel: u8, cmd: u8, program: u8 },
    /// Change a part transpose, gated by that channel's hook.
    HookPartTranspose { channel: u8, cmd: u8, relative: bool, value: i8 },

    /// Marker bytes, each one checked against the command queue.
    Marker(Vec<u8>),

    /// Loop `count` times from the `from` position back to the `to` position.
    SetLoop {
        count: u16,
        to_beat: u16,
        to_tick: u16,
        from_beat: u16,
        from_tick: u16,
    },
    /// Cancel the pending loop.
    ClearLoop,

    /// Select a 16-bit bank/program for a part.
    SetInstrument { channel: u8, instrument: u16 },

    /// Known code whose payload is too short.
    Malformed(u8),
    /// Unknown code.
    Unknown(u8),
}

/// Joins pairs of nibbles into bytes. A trailing odd byte is dropped.
pub fn decode_nibbles(src: &[u8]) -> Vec<u8> {
    src.chunks_exact(2)
        .map(|pair| (pair[0] & 0x0f) << 4 | (pair[1] & 0x0f))
        .collect()
}

pub fn encode_nibbles(src: &[u8]) -> Vec<u8> {
    src.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

/// Decoded nibble payload with at least `len` bytes.
fn nibbles(src: &[u8], len: usize) -> Option<Vec<u8>> {
    let buf = decode_nibbles(src);
    if buf.len() < len {
        None
    } else {
        Some(buf)
    }
}

impl SysEx {
    /// Decodes a system exclusive payload (the bytes after the length).
    pub fn read(data: &[u8]) -> Self {
        match data {
            [IMUSE_SYSEX_ID, code, rest @ ..] => {
                Self::read_vendor(*code, rest).unwrap_or(SysEx::Malformed(*code))
            }
            _ => SysEx::Foreign,
        }
    }

    fn read_vendor(code: u8, p: &[u8]) -> Option<Self> {
        use SysEx::*;

        let channel = p.first().map(|c| c & 0x0f);

        Some(match code {
            0 => {
                let b = nibbles(p.get(1..)?, 8)?;
                PartSetup {
                    channel: channel?,
                    on: b[0] & 0x01 != 0,
                    reverb: b[0] & 0x02 != 0,
                    priority: b[1] as i8,
                    volume: b[2],
                    pan: (b[3] as i16 - 0x40) as i8,
                    transpose: b[4] as i8,
                    percussion: b[4] == 0x80,
                    detune: b[5] as i8,
                    pitchbend_factor: b[6],
                    program: b[7],
                }
            }
            1 => ShutdownPart { channel: channel? },
            2 => StartOfSong,

            16 => PartInstrument {
                channel: channel?,
                data: decode_nibbles(p.get(2..)?),
            },
            17 => GlobalInstrument {
                slot: *p.get(2)?,
                data: decode_nibbles(p.get(3..)?),
            },
            33 => {
                let b = nibbles(p.get(2..)?, 4)?;
                ParamAdjust {
                    channel: channel?,
                    param: BE::read_u16(&b[0..2]),
                    value: BE::read_u16(&b[2..4]),
                }
            }

            48 => {
                let b = nibbles(p.get(1..)?, 7)?;
                HookJump {
                    cmd: b[0],
                    track: BE::read_u16(&b[1..3]),
                    beat: BE::read_u16(&b[3..5]),
                    tick: BE::read_u16(&b[5..7]),
                }
            }
            49 => {
                let b = nibbles(p.get(1..)?, 3)?;
                HookTranspose {
                    cmd: b[0],
                    relative: b[1] != 0,
                    value: b[2] as i8,
                }
            }
            50 => {
                let b = nibbles(p.get(1..)?, 2)?;
                HookPartOnOff {
                    channel: channel?,
                    cmd: b[0],
                    on: b[1] != 0,
                }
            }
            51 => {
                let b = nibbles(p.get(1..)?, 2)?;
                HookPartVolume {
                    channel: channel?,
                    cmd: b[0],
                    volume: b[1],
                }
            }
            52 => {
                let b = nibbles(p.get(1..)?, 2)?;
                HookPartProgram {
                    channel: channel?,
                    cmd: b[0],
                    program: b[1],
                }
            }
            53 => {
                let b = nibbles(p.get(1..)?, 3)?;
                HookPartTranspose {
                    channel: channel?,
                    cmd: b[0],
                    relative: b[1] != 0,
                    value: b[2] as i8,
                }
            }

            64 => Marker(p.get(1..).unwrap_or_default().to_vec()),

            80 => {
                let b = nibbles(p.get(1..)?, 10)?;
                SetLoop {
                    count: BE::read_u16(&b[0..2]),
                    to_beat: BE::read_u16(&b[2..4]),
                    to_tick: BE::read_u16(&b[4..6]),
                    from_beat: BE::read_u16(&b[6..8]),
                    from_tick: BE::read_u16(&b[8..10]),
                }
            }
            81 => ClearLoop,

            96 => {
                let n = p.get(1..5)?;
                let instrument = (n[0] as u16 & 0x0f) << 12
                    | (n[1] as u16 & 0x0f) << 8
                    | (n[2] as u16 & 0x0f) << 4
                    | (n[3] as u16 & 0x0f);
                SetInstrument {
                    channel: channel?,
                    instrument,
                }
            }

            _ => Unknown(code),
        })
    }
}
