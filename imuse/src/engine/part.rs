use super::*;

/// Shared synthesizer channel, assigned to one MIDI channel of one player.
///
/// Local values come from the music data; effective values combine them with
/// the owning player's settings and are what a driver should use.
#[derive(Debug, Clone)]
pub struct Part {
    pub(crate) player: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,

    pub(crate) channel: u8,
    pub(crate) on: bool,
    pub(crate) percussion: bool,
    pub(crate) mt32_emulate: bool,

    pub(crate) vol: u8,
    pub(crate) vol_eff: u8,
    pub(crate) pan: i8,
    pub(crate) pan_eff: i8,
    /// -128 keeps the part untransposed.
    pub(crate) transpose: i8,
    pub(crate) transpose_eff: i8,
    pub(crate) detune: i8,
    pub(crate) detune_eff: i8,
    pub(crate) pri: i8,
    pub(crate) pri_eff: u8,

    pub(crate) pitchbend: i16,
    pub(crate) pitchbend_factor: u8,
    pub(crate) program: u8,
    pub(crate) bank: u8,
    pub(crate) modwheel: u8,
    pub(crate) pedal: bool,
    pub(crate) effect_level: u8,
    pub(crate) chorus: u8,
}

impl Default for Part {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves `a` by whole octaves until it lies within `low..=high`.
pub(crate) fn transpose_clamp(mut a: i32, low: i32, high: i32) -> i32 {
    if low > a {
        a += (low - a + 11) / 12 * 12;
    }
    if high < a {
        a -= (a - high + 11) / 12 * 12;
    }
    a
}

impl Part {
    pub(crate) fn new() -> Self {
        Self {
            player: None,
            next: None,
            prev: None,
            channel: 0,
            on: false,
            percussion: false,
            mt32_emulate: false,
            vol: 127,
            vol_eff: 0,
            pan: 0,
            pan_eff: 0,
            transpose: 0,
            transpose_eff: 0,
            detune: 0,
            detune_eff: 0,
            pri: 0,
            pri_eff: 0,
            pitchbend: 0,
            pitchbend_factor: 2,
            program: 255,
            bank: 0,
            modwheel: 0,
            pedal: false,
            effect_level: 64,
            chorus: 0,
        }
    }

    pub fn owner(&self) -> Option<usize> {
        self.player
    }
    pub fn channel(&self) -> u8 {
        self.channel
    }
    pub fn is_on(&self) -> bool {
        self.on
    }
    pub fn is_percussion(&self) -> bool {
        self.percussion
    }
    /// The owner plays Roland data on a General MIDI backend.
    pub fn mt32_emulate(&self) -> bool {
        self.mt32_emulate
    }

    pub fn volume(&self) -> u8 {
        self.vol
    }
    pub fn effective_volume(&self) -> u8 {
        self.vol_eff
    }
    pub fn pan(&self) -> i8 {
        self.pan
    }
    pub fn effective_pan(&self) -> i8 {
        self.pan_eff
    }
    pub fn transpose(&self) -> i8 {
        self.transpose
    }
    pub fn effective_transpose(&self) -> i8 {
        self.transpose_eff
    }
    pub fn detune(&self) -> i8 {
        self.detune
    }
    pub fn effective_detune(&self) -> i8 {
        self.detune_eff
    }
    pub fn priority(&self) -> i8 {
        self.pri
    }
    pub fn effective_priority(&self) -> u8 {
        self.pri_eff
    }

    /// Wheel position scaled by the bend factor.
    pub fn pitchbend(&self) -> i16 {
        self.pitchbend
    }
    pub fn pitchbend_factor(&self) -> u8 {
        self.pitchbend_factor
    }
    pub fn program(&self) -> u8 {
        self.program
    }
    pub fn bank(&self) -> u8 {
        self.bank
    }
    pub fn modwheel(&self) -> u8 {
        self.modwheel
    }
    pub fn pedal(&self) -> bool {
        self.pedal
    }
    pub fn effect_level(&self) -> u8 {
        self.effect_level
    }
    pub fn chorus(&self) -> u8 {
        self.chorus
    }

    /// Resets the part for a new channel of `owner`.
    pub(crate) fn setup(&mut self, channel: u8, owner: &Player) -> ChangeFlags {
        let (player, next, prev) = (self.player, self.next, self.prev);
        *self = Self {
            player,
            next,
            prev,
            channel,
            on: true,
            percussion: owner.is_gm && channel == 9,
            mt32_emulate: owner.mt32_emulate,
            ..Self::new()
        };
        self.refresh(owner)
    }

    /// Recomputes every effective value from the local ones.
    pub(crate) fn refresh(&mut self, owner: &Player) -> ChangeFlags {
        self.set_vol(self.vol, owner);
        self.set_pan(self.pan, owner);
        self.set_transpose(self.transpose, owner);
        self.set_detune(self.detune, owner);
        self.set_pri(self.pri, owner);
        ChangeFlags::ALL
    }

    pub(crate) fn set_vol(&mut self, vol: u8, owner: &Player) -> ChangeFlags {
        self.vol = vol.min(127);
        self.vol_eff = ((self.vol as u32 + 1) * owner.vol_eff as u32 >> 7) as u8;
        ChangeFlags::VOLUME
    }

    pub(crate) fn set_pan(&mut self, pan: i8, owner: &Player) -> ChangeFlags {
        self.pan = pan;
        self.pan_eff = (pan as i32 + owner.pan as i32).clamp(-64, 63) as i8;
        ChangeFlags::PAN
    }

    pub(crate) fn set_transpose(&mut self, transpose: i8, owner: &Player) -> ChangeFlags {
        self.transpose = transpose;
        self.transpose_eff = if transpose == -128 {
            0
        } else {
            transpose_clamp(transpose as i32 + owner.transpose as i32, -12, 12) as i8
        };
        ChangeFlags::MOD
    }

    pub(crate) fn set_detune(&mut self, detune: i8, owner: &Player) -> ChangeFlags {
        self.detune = detune;
        self.detune_eff = (detune as i32 + owner.detune as i32).clamp(-128, 127) as i8;
        ChangeFlags::MOD
    }

    /// Priority changes are not a driver parameter; callers follow up with
    /// [`Driver::update_pris`].
    pub(crate) fn set_pri(&mut self, pri: i8, owner: &Player) -> ChangeFlags {
        self.pri = pri;
        self.pri_eff = (pri as i32 + owner.priority as i32).clamp(0, 255) as u8;
        ChangeFlags::empty()
    }

    pub(crate) fn set_pitchbend(&mut self, value: i16) -> ChangeFlags {
        self.pitchbend = (value as i32 * self.pitchbend_factor as i32 >> 6) as i16;
        ChangeFlags::MOD
    }

    /// Factors above 12 semitones are ignored.
    pub(crate) fn set_pitchbend_factor(&mut self, factor: u8) -> ChangeFlags {
        if factor > 12 {
            return ChangeFlags::empty();
        }
        self.pitchbend_factor = factor;
        self.set_pitchbend(0)
    }

    pub(crate) fn set_program(&mut self, program: u8, bank: u8) -> ChangeFlags {
        if self.program == program && self.bank == bank {
            return ChangeFlags::empty();
        }
        self.program = program;
        self.bank = bank;
        ChangeFlags::PROGRAM
    }

    pub(crate) fn set_modwheel(&mut self, value: u8) -> ChangeFlags {
        self.modwheel = value;
        ChangeFlags::MODWHEEL
    }

    pub(crate) fn set_pedal(&mut self, on: bool) -> ChangeFlags {
        self.pedal = on;
        ChangeFlags::PEDAL
    }

    pub(crate) fn set_effect_level(&mut self, level: u8) -> ChangeFlags {
        self.effect_level = level;
        ChangeFlags::EFFECT_LEVEL
    }

    pub(crate) fn set_chorus(&mut self, level: u8) -> ChangeFlags {
        self.chorus = level;
        ChangeFlags::CHORUS
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Index of a part for a request of the given priority.
    ///
    /// A free part is preferred. Otherwise the first part with the lowest
    /// effective priority is taken from its owner, if that priority is below
    /// the request. The returned part is free.
    pub fn allocate_part(&mut self, priority: u8) -> Option<usize> {
        let mut best = None;
        let mut best_pri = u8::MAX;
        for (i, part) in self.parts.iter().enumerate() {
            if part.player.is_none() {
                return Some(i);
            }
            if best.is_none() || part.pri_eff < best_pri {
                best = Some(i);
                best_pri = part.pri_eff;
            }
        }

        match best {
            Some(i) if best_pri < priority => {
                self.part_uninit(i);
                Some(i)
            }
            _ => {
                debug!("denying part request at priority {}", priority);
                None
            }
        }
    }

    /// The part serving `channel` of a player, without allocating.
    pub(crate) fn find_part(&self, p: usize, channel: u8) -> Option<usize> {
        let mut cur = self.players[p].parts;
        while let Some(i) = cur {
            if self.parts[i].channel == channel {
                return Some(i);
            }
            cur = self.parts[i].next;
        }
        None
    }

    /// The part serving `channel` of a player, allocated on first use.
    pub(crate) fn get_part(&mut self, p: usize, channel: u8) -> Option<usize> {
        if let Some(i) = self.find_part(p, channel) {
            return Some(i);
        }

        let i = match self.allocate_part(self.players[p].priority) {
            Some(i) => i,
            None => {
                debug!(
                    "sound {}: no part available for channel {}",
                    self.players[p].id, channel
                );
                return None;
            }
        };
        self.part_setup(i, p, channel);
        Some(i)
    }

    fn part_setup(&mut self, i: usize, p: usize, channel: u8) {
        let head = self.players[p].parts;
        if let Some(head) = head {
            self.parts[head].prev = Some(i);
        }
        let part = &mut self.parts[i];
        part.player = Some(p);
        part.next = head;
        part.prev = None;
        self.players[p].parts = Some(i);

        self.update_part(i, |part, owner| part.setup(channel, owner));
        self.driver.update_pris();
    }

    /// Silences a part and returns it to the pool.
    pub(crate) fn part_uninit(&mut self, i: usize) {
        let p = match self.parts[i].player {
            Some(p) => p,
            None => return,
        };
        self.driver.part_off(i, &self.parts[i]);

        let (prev, next) = (self.parts[i].prev, self.parts[i].next);
        if let Some(next) = next {
            self.parts[next].prev = prev;
        }
        match prev {
            Some(prev) => self.parts[prev].next = next,
            None => {
                assert_eq!(
                    self.players[p].parts,
                    Some(i),
                    "part {} is not the head of player {}'s list",
                    i,
                    p
                );
                self.players[p].parts = next;
            }
        }

        let part = &mut self.parts[i];
        part.player = None;
        part.next = None;
        part.prev = None;
        part.on = false;
    }

    pub(crate) fn uninit_parts(&mut self, p: usize) {
        while let Some(i) = self.players[p].parts {
            self.part_uninit(i);
        }
    }

    pub(crate) fn part_set_onoff(&mut self, i: usize, on: bool) {
        if self.parts[i].player.is_none() || self.parts[i].on == on {
            return;
        }
        self.parts[i].on = on;
        if !on {
            self.driver.part_off(i, &self.parts[i]);
        }
        if !self.parts[i].percussion {
            self.driver.update_pris();
        }
    }

    pub(crate) fn part_set_pri(&mut self, i: usize, pri: i8) {
        self.update_part(i, |part, owner| part.set_pri(pri, owner));
        self.driver.update_pris();
    }

    pub(crate) fn part_key_on(&mut self, i: usize, note: u8, velocity: u8) {
        self.driver.part_key_on(i, &self.parts[i], note, velocity);
    }

    pub(crate) fn part_key_off(&mut self, i: usize, note: u8) {
        self.driver.part_key_off(i, &self.parts[i], note);
    }

    /// Switches off the sustain pedal on every part of a player.
    pub(crate) fn turn_off_pedals(&mut self, p: usize) {
        let mut cur = self.players[p].parts;
        while let Some(i) = cur {
            cur = self.parts[i].next;
            if self.parts[i].pedal {
                self.update_part(i, |part, _| part.set_pedal(false));
            }
        }
    }

    /// Silences every part of a player without releasing them.
    pub(crate) fn turn_off_parts(&mut self, p: usize) {
        let mut cur = self.players[p].parts;
        while let Some(i) = cur {
            cur = self.parts[i].next;
            self.driver.part_off(i, &self.parts[i]);
        }
    }
}
