use crate::engine::Part;
use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;

/// Base tempo used when neither the driver nor the config names one.
pub const DEFAULT_BASE_TEMPO: u32 = 0x4A0000;

bitflags! {
    /// Effective part parameters that changed since the last notification.
    pub struct ChangeFlags: u8 {
        /// Transpose, detune or pitch bend.
        const MOD = 0x01;
        const VOLUME = 0x02;
        const PEDAL = 0x04;
        const MODWHEEL = 0x08;
        const PAN = 0x10;
        const EFFECT_LEVEL = 0x20;
        const PROGRAM = 0x40;
        const CHORUS = 0x80;
        const ALL = 0xff;
    }
}

/// One bit per channel for each of the 128 notes.
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveNotes([u16; 128]);

impl Default for ActiveNotes {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self([0; 128])
    }

    pub fn set(&mut self, channel: u8, note: u8) {
        self.0[(note & 0x7f) as usize] |= 1 << (channel & 0x0f);
    }

    pub fn unset(&mut self, channel: u8, note: u8) {
        self.0[(note & 0x7f) as usize] &= !(1 << (channel & 0x0f));
    }

    pub fn contains(&self, channel: u8, note: u8) -> bool {
        self.0[(note & 0x7f) as usize] & 1 << (channel & 0x0f) != 0
    }

    pub fn clear(&mut self) {
        self.0 = [0; 128];
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&mask| mask == 0)
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|mask| mask.count_ones() as usize).sum()
    }

    /// Set bits as `(channel, note)` pairs, ordered by note.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0.iter().enumerate().flat_map(|(note, &mask)| {
            (0..16u8)
                .filter(move |channel| mask & 1 << channel != 0)
                .map(move |channel| (channel, note as u8))
        })
    }
}

impl fmt::Debug for ActiveNotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Synthesizer backend.
///
/// Parts are named by their index in the engine's part pool. `part` carries
/// the current effective values, so a driver never needs to look back into
/// the engine.
pub trait Driver {
    fn part_key_on(&mut self, id: usize, part: &Part, note: u8, velocity: u8);
    fn part_key_off(&mut self, id: usize, part: &Part, note: u8);

    /// The parameters named in `what` have new effective values.
    fn part_changed(&mut self, id: usize, part: &Part, what: ChangeFlags);

    /// Silence the part and release whatever voices it holds.
    fn part_off(&mut self, id: usize, part: &Part);

    /// Set the bit of every note still sounding on the part, on the part's
    /// channel.
    fn part_update_active(&mut self, id: usize, part: &Part, active: &mut ActiveNotes);

    /// Raw driver parameter carried by the music data.
    fn part_set_param(&mut self, _id: usize, _part: &Part, _param: u16, _value: u16) {}

    /// Instrument definition for one part.
    fn part_set_instrument(&mut self, _id: usize, _part: &Part, _data: &[u8]) {}

    /// Select a previously stored global instrument on a part.
    fn part_load_global_instrument(&mut self, _id: usize, _part: &Part, _slot: u8) {}

    fn set_global_instrument(&mut self, _slot: u8, _data: &[u8]) {}

    /// Part priorities changed.
    fn update_pris(&mut self) {}

    /// Microseconds per timer call multiplied by the ticks per beat.
    ///
    /// A player at a tempo equal to this value advances one tick per call.
    fn base_tempo(&self) -> u32 {
        DEFAULT_BASE_TEMPO
    }

    /// Called once at the end of every engine timer call.
    fn on_timer(&mut self) {}
}

/// Loaded music resources, by sound number.
pub trait SoundSource {
    fn sound(&self, id: u16) -> Option<&[u8]>;
}

impl SoundSource for HashMap<u16, Vec<u8>> {
    fn sound(&self, id: u16) -> Option<&[u8]> {
        self.get(&id).map(Vec::as_slice)
    }
}
