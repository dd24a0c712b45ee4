use super::hook::{self, HookDatas};
use super::*;
use imevent::{read_var, Event, EventError, SysEx};
use log::trace;

/// Playback state of one sound.
#[derive(Debug, Clone)]
pub struct Player {
    pub(crate) active: bool,
    /// Replaying a stretch of the track without sounding notes.
    pub(crate) scanning: bool,
    /// Set when the current event batch must stop, after a jump or a stop.
    pub(crate) abort: bool,

    pub(crate) id: u16,
    pub(crate) priority: u8,
    pub(crate) volume: u8,
    pub(crate) vol_eff: u8,
    pub(crate) vol_chan: u16,
    pub(crate) pan: i8,
    pub(crate) transpose: i8,
    pub(crate) detune: i8,
    pub(crate) mt32_emulate: bool,
    pub(crate) is_gm: bool,

    /// Microseconds per beat.
    pub(crate) tempo: u32,
    pub(crate) tempo_eff: u32,
    pub(crate) speed: u8,
    /// Ticks per timer call, 16.16 fixed point.
    pub(crate) timer_speed: u32,
    pub(crate) timer_counter: u32,

    pub(crate) track_index: u16,
    /// Byte offset of the next event in the current track.
    pub(crate) song_offset: usize,
    pub(crate) cur_pos: u32,
    pub(crate) next_pos: u32,
    pub(crate) beat_index: u32,
    pub(crate) tick_index: u32,
    pub(crate) ticks_per_beat: u32,

    pub(crate) loop_counter: u16,
    pub(crate) loop_to_beat: u16,
    pub(crate) loop_to_tick: u16,
    pub(crate) loop_from_beat: u16,
    pub(crate) loop_from_tick: u16,

    pub(crate) hook: HookDatas,
    /// Head of the list of parts owned by this player.
    pub(crate) parts: Option<usize>,
    /// Notes held at the end of a scan.
    pub(crate) active_notes: ActiveNotes,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub(crate) fn new() -> Self {
        Self {
            active: false,
            scanning: false,
            abort: false,
            id: 0,
            priority: 0,
            volume: 127,
            vol_eff: 0,
            vol_chan: 0xffff,
            pan: 0,
            transpose: 0,
            detune: 0,
            mt32_emulate: false,
            is_gm: false,
            tempo: DEFAULT_TEMPO,
            tempo_eff: 0,
            speed: DEFAULT_SPEED,
            timer_speed: 0,
            timer_counter: 0,
            track_index: 0,
            song_offset: 0,
            cur_pos: 0,
            next_pos: 0,
            beat_index: 1,
            tick_index: 0,
            ticks_per_beat: TICKS_PER_BEAT,
            loop_counter: 0,
            loop_to_beat: 1,
            loop_to_tick: 0,
            loop_from_beat: 1,
            loop_from_tick: 0,
            hook: HookDatas::default(),
            parts: None,
            active_notes: ActiveNotes::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn id(&self) -> u16 {
        self.id
    }
    pub fn priority(&self) -> u8 {
        self.priority
    }
    pub fn volume(&self) -> u8 {
        self.volume
    }
    /// Volume after the volume channel and master volume are applied.
    pub fn effective_volume(&self) -> u8 {
        self.vol_eff
    }
    pub fn volume_channel(&self) -> u16 {
        self.vol_chan
    }
    pub fn pan(&self) -> i8 {
        self.pan
    }
    pub fn transpose(&self) -> i8 {
        self.transpose
    }
    pub fn detune(&self) -> i8 {
        self.detune
    }
    pub fn speed(&self) -> u8 {
        self.speed
    }
    pub fn tempo(&self) -> u32 {
        self.tempo
    }
    pub fn is_gm(&self) -> bool {
        self.is_gm
    }
    pub fn mt32_emulate(&self) -> bool {
        self.mt32_emulate
    }
    pub fn track(&self) -> u16 {
        self.track_index
    }
    /// Ticks since the start of the track.
    pub fn position(&self) -> u32 {
        self.cur_pos
    }
    /// 1-based beat of the current position.
    pub fn beat(&self) -> u32 {
        self.beat_index
    }
    pub fn tick(&self) -> u32 {
        self.tick_index
    }
    pub fn loop_counter(&self) -> u16 {
        self.loop_counter
    }

    /// Moves the position forward, carrying ticks into beats.
    fn advance(&mut self, ticks: u32) {
        self.cur_pos = self.cur_pos.wrapping_add(ticks);
        self.tick_index += ticks;
        if self.tick_index >= self.ticks_per_beat {
            self.beat_index += self.tick_index / self.ticks_per_beat;
            self.tick_index %= self.ticks_per_beat;
        }
    }

    /// Places the position at an absolute tick of the track.
    pub(crate) fn set_position(&mut self, pos: u32) {
        self.cur_pos = pos;
        self.beat_index = 1 + pos / self.ticks_per_beat;
        self.tick_index = pos % self.ticks_per_beat;
    }

    fn loop_reached(&self) -> bool {
        self.loop_counter > 0
            && (self.beat_index, self.tick_index)
                >= (self.loop_from_beat as u32, self.loop_from_tick as u32)
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    pub(crate) fn start_player(&mut self, p: usize, id: u16) -> Result<()> {
        let format = {
            let data = self.sounds.sound(id).ok_or(Error::SoundNotFound(id))?;
            let res = Resource::read(data)?;
            res.header()?;
            res.format
        };

        let player = &mut self.players[p];
        *player = Player {
            active: true,
            id,
            priority: DEFAULT_PRIORITY,
            mt32_emulate: format.is_mt32() && !self.config.native_mt32,
            is_gm: format.is_gm(),
            ..Player::new()
        };
        self.set_player_vol(p, 127)?;
        self.start_seq(p)
    }

    fn start_seq(&mut self, p: usize) -> Result<()> {
        let id = self.players[p].id;
        let (delta, size) = {
            let track = self.track(id, 0).ok_or(Error::TrackNotFound(0))?;
            read_var(track)?
        };

        self.set_tempo(p, DEFAULT_TEMPO);
        let player = &mut self.players[p];
        player.track_index = 0;
        player.song_offset = size;
        player.timer_counter = 0;
        player.next_pos = delta;
        player.set_position(delta);
        debug!("sound {}: started", id);
        Ok(())
    }

    /// Stops a player and releases everything it holds.
    pub(crate) fn clear_player(&mut self, p: usize) {
        self.players[p].abort = true;
        self.cancel_volume_fade(p);
        self.release_sustained(p);
        self.uninit_parts(p);
        if self.players[p].active {
            debug!("sound {}: stopped", self.players[p].id);
        }
        self.players[p].active = false;
        self.players[p].scanning = false;
    }

    pub(crate) fn set_tempo(&mut self, p: usize, tempo: u32) {
        if tempo == 0 {
            return;
        }
        let mut i = self.game_tempo;
        let mut j = tempo;
        while (i | j) & 0xffff_0000 != 0 {
            i >>= 1;
            j >>= 1;
        }
        let j = j.max(1);

        let player = &mut self.players[p];
        player.tempo = tempo;
        player.tempo_eff = (i << 16) / j;
        let speed = player.speed;
        self.set_speed(p, speed);
    }

    pub(crate) fn set_speed(&mut self, p: usize, speed: u8) {
        let player = &mut self.players[p];
        player.speed = speed;
        let timer_speed = (player.tempo_eff as u64 * speed as u64) >> 7;
        player.timer_speed = timer_speed.min(u32::MAX as u64) as u32;
    }

    pub(crate) fn set_player_vol(&mut self, p: usize, volume: u8) -> Result<()> {
        if volume > 127 {
            return Err(Error::InvalidArgument(volume as i32));
        }
        let chan_vol = self.channel_volume(self.players[p].vol_chan) as u32;
        let player = &mut self.players[p];
        player.volume = volume;
        player.vol_eff = ((chan_vol * (volume as u32 + 1)) >> 7).min(255) as u8;
        self.update_parts(p, |part, owner| part.set_vol(part.vol, owner));
        Ok(())
    }

    pub(crate) fn set_player_pan(&mut self, p: usize, pan: i8) {
        self.players[p].pan = pan;
        self.update_parts(p, |part, owner| part.set_pan(part.pan, owner));
    }

    pub(crate) fn set_player_detune(&mut self, p: usize, detune: i8) {
        self.players[p].detune = detune;
        self.update_parts(p, |part, owner| part.set_detune(part.detune, owner));
    }

    pub(crate) fn set_player_priority(&mut self, p: usize, priority: u8) {
        self.players[p].priority = priority;
        self.update_parts(p, |part, owner| part.set_pri(part.pri, owner));
        self.driver.update_pris();
    }

    /// Absolute values must lie within two octaves. Relative changes are
    /// folded back into -7..=7 by octaves.
    pub(crate) fn set_player_transpose(&mut self, p: usize, relative: bool, value: i32) -> Result<()> {
        if !(-24..=24).contains(&value) {
            return Err(Error::InvalidArgument(value));
        }
        let value = if relative {
            part::transpose_clamp(self.players[p].transpose as i32 + value, -7, 7)
        } else {
            value
        };
        self.players[p].transpose = value as i8;
        self.update_parts(p, |part, owner| part.set_transpose(part.transpose, owner));
        Ok(())
    }

    fn part_set_transpose(&mut self, p: usize, channel: u8, relative: bool, value: i8) {
        let i = match self.get_part(p, channel) {
            Some(i) => i,
            None => return,
        };
        let value = if relative {
            part::transpose_clamp(self.parts[i].transpose as i32 + value as i32, -7, 7) as i8
        } else {
            value
        };
        self.update_part(i, |part, owner| part.set_transpose(value, owner));
    }

    /// The loop must span at least one whole beat.
    pub(crate) fn set_loop(
        &mut self,
        p: usize,
        count: u16,
        to_beat: u16,
        to_tick: u16,
        from_beat: u16,
        from_tick: u16,
    ) -> Result<()> {
        if to_beat as u32 + 1 >= from_beat as u32 {
            return Err(Error::InvalidArgument(from_beat as i32));
        }
        let player = &mut self.players[p];
        player.loop_to_beat = to_beat.max(1);
        player.loop_to_tick = to_tick;
        player.loop_from_beat = from_beat;
        player.loop_from_tick = from_tick;
        player.loop_counter = count;
        Ok(())
    }

    pub(crate) fn clear_loop(&mut self, p: usize) {
        self.players[p].loop_counter = 0;
    }

    /// Player parameter as reported to scripts.
    pub(crate) fn get_param(&self, p: usize, param: i32, chan: i32) -> i32 {
        let player = &self.players[p];
        match param {
            0 => player.id as i32,
            1 => player.priority as i32,
            2 => player.volume as i32,
            3 => player.pan as i32,
            4 => player.transpose as i32,
            5 => player.detune as i32,
            6 => player.speed as i32,
            7 => player.track_index as i32,
            8 => player.beat_index as i32,
            9 => player.tick_index as i32,
            10 => player.loop_counter as i32,
            11 => player.loop_to_beat as i32,
            12 => player.loop_to_tick as i32,
            13 => player.loop_from_beat as i32,
            14 => player.loop_from_tick as i32,
            15..=17 => {
                let chan = match u8::try_from(chan) {
                    Ok(chan) if chan < 16 => chan,
                    _ => return -1,
                };
                match self.find_part(p, chan) {
                    Some(i) => {
                        let part = &self.parts[i];
                        match param {
                            15 => part.on as i32,
                            16 => part.vol as i32,
                            _ => part.program as i32,
                        }
                    }
                    None => 129,
                }
            }
            18..=23 => player.hook.query(param, chan),
            _ => -1,
        }
    }

    /// Advances a player by one timer call and runs the events that became
    /// due.
    pub(crate) fn sequencer_timer(&mut self, p: usize) {
        let player = &mut self.players[p];
        let counter = player.timer_counter as u64 + player.timer_speed as u64;
        player.timer_counter = (counter & 0xffff) as u32;
        player.advance((counter >> 16) as u32);

        if player.loop_reached() {
            player.loop_counter -= 1;
            let (track, beat, tick) = (player.track_index, player.loop_to_beat, player.loop_to_tick);
            if let Err(err) = self.jump(p, track, beat as u32, tick as u32) {
                warn!("sound {}: loop failed: {}", self.players[p].id, err);
            }
        }

        let player = &mut self.players[p];
        if !player.active || player.next_pos > player.cur_pos {
            return;
        }
        player.abort = false;
        while self.players[p].next_pos <= self.players[p].cur_pos {
            if !self.parse_next(p) {
                return;
            }
        }
    }

    fn decode_next(&self, p: usize) -> Result<(Event, usize)> {
        let player = &self.players[p];
        let track = self
            .track(player.id, player.track_index)
            .ok_or(Error::TrackNotFound(player.track_index))?;
        let data = track.get(player.song_offset..).ok_or(EventError::Truncated)?;
        Ok(Event::read(data)?)
    }

    fn decode_delta(&self, p: usize) -> Result<(u32, usize)> {
        let player = &self.players[p];
        let track = self
            .track(player.id, player.track_index)
            .ok_or(Error::TrackNotFound(player.track_index))?;
        let data = track.get(player.song_offset..).ok_or(EventError::Truncated)?;
        Ok(read_var(data)?)
    }

    /// Moves the cursor past the next event and its delta, then runs it.
    ///
    /// The cursor always names an unplayed event, so a jump taken by the
    /// event itself starts from a consistent position. Returns false when
    /// the batch has to stop: the player ended, was stopped, or jumped
    /// elsewhere.
    pub(crate) fn parse_next(&mut self, p: usize) -> bool {
        let id = self.players[p].id;
        let pos = self.players[p].next_pos;
        let event = match self.decode_next(p) {
            Ok((event, size)) => {
                self.players[p].song_offset += size;
                event
            }
            Err(err) => {
                warn!("sound {}: {}", id, err);
                self.clear_player(p);
                return false;
            }
        };

        if !event.is_end() {
            match self.decode_delta(p) {
                Ok((delta, size)) => {
                    let player = &mut self.players[p];
                    player.song_offset += size;
                    player.next_pos = player.next_pos.wrapping_add(delta);
                }
                Err(err) => {
                    warn!("sound {}: {}", id, err);
                    self.clear_player(p);
                    return false;
                }
            }
        }
        trace!("sound {} @{}: {:x?}", id, pos, event);

        self.execute_event(p, event);
        self.players[p].active && !self.players[p].abort
    }

    fn execute_event(&mut self, p: usize, event: Event) {
        match event {
            Event::NoteOn { channel, note, velocity } => {
                if self.players[p].scanning {
                    self.players[p].active_notes.set(channel, note);
                } else {
                    self.key_on(p, channel, note, velocity);
                }
            }
            Event::NoteOff { channel, note } => {
                if self.players[p].scanning {
                    self.players[p].active_notes.unset(channel, note);
                } else {
                    self.key_off(p, channel, note);
                }
            }
            Event::Controller { channel, controller, value } => {
                self.controller(p, channel, controller, value)
            }
            Event::ProgramChange { channel, program } => {
                let i = match self.get_part(p, channel) {
                    Some(i) => i,
                    None => return,
                };
                if self.players[p].is_gm {
                    if program < 128 {
                        self.update_part(i, |part, _| part.set_program(program, 0));
                    }
                } else if program < 32 {
                    self.driver.part_load_global_instrument(i, &self.parts[i], program);
                }
            }
            Event::PitchBend { channel, value } => {
                if let Some(i) = self.get_part(p, channel) {
                    self.update_part(i, |part, _| part.set_pitchbend(value));
                }
            }
            Event::SysEx(sysex) => self.sysex(p, sysex),
            Event::EndOfTrack => self.clear_player(p),
            Event::Tempo(tempo) => self.set_tempo(p, tempo),
            Event::Aftertouch { .. } | Event::ChannelPressure { .. } | Event::Meta(_) => {}
        }
    }

    pub(crate) fn key_on(&mut self, p: usize, channel: u8, note: u8, velocity: u8) {
        let i = match self.get_part(p, channel) {
            Some(i) => i,
            None => return,
        };
        if !self.parts[i].on {
            return;
        }
        self.retire_sustained(p, channel, note);
        self.part_key_on(i, note, velocity);
    }

    pub(crate) fn key_off(&mut self, p: usize, channel: u8, note: u8) {
        if let Some(i) = self.find_part(p, channel) {
            if self.parts[i].on {
                self.part_key_off(i, note);
            }
        }
    }

    fn controller(&mut self, p: usize, channel: u8, controller: u8, value: u8) {
        let i = match self.get_part(p, channel) {
            Some(i) => i,
            None => return,
        };
        let centred = (value as i16 - 0x40) as i8;

        match controller {
            1 => self.update_part(i, |part, _| part.set_modwheel(value)),
            7 => self.update_part(i, |part, owner| part.set_vol(value, owner)),
            10 => self.update_part(i, |part, owner| part.set_pan(centred, owner)),
            16 => self.update_part(i, |part, _| part.set_pitchbend_factor(value)),
            17 => self.update_part(i, |part, owner| part.set_detune(centred, owner)),
            18 => self.part_set_pri(i, centred),
            64 => self.update_part(i, |part, _| part.set_pedal(value != 0)),
            91 => self.update_part(i, |part, _| part.set_effect_level(value)),
            93 => self.update_part(i, |part, _| part.set_chorus(value)),
            _ => warn!(
                "sound {}: unhandled controller {} on channel {}",
                self.players[p].id, controller, channel
            ),
        }
    }

    fn sysex(&mut self, p: usize, sysex: SysEx) {
        let id = self.players[p].id;
        match sysex {
            SysEx::Foreign | SysEx::StartOfSong => {}

            SysEx::PartSetup {
                channel,
                on,
                reverb,
                priority,
                volume,
                pan,
                transpose,
                percussion,
                detune,
                pitchbend_factor,
                program,
            } => {
                let i = match self.get_part(p, channel) {
                    Some(i) => i,
                    None => return,
                };
                self.part_set_onoff(i, on);
                self.update_part(i, |part, owner| {
                    part.percussion = owner.is_gm && percussion;
                    let mut what = part.set_effect_level(if reverb { 127 } else { 0 })
                        | part.set_pri(priority, owner)
                        | part.set_vol(volume, owner)
                        | part.set_pan(pan, owner)
                        | part.set_transpose(transpose, owner)
                        | part.set_detune(detune, owner)
                        | part.set_pitchbend_factor(pitchbend_factor);
                    if !part.percussion {
                        what |= part.set_program(program, 0);
                    }
                    what
                });
                self.driver.update_pris();
            }
            SysEx::ShutdownPart { channel } => {
                if let Some(i) = self.find_part(p, channel) {
                    self.part_uninit(i);
                }
            }

            SysEx::PartInstrument { channel, data } => {
                if let Some(i) = self.get_part(p, channel) {
                    self.driver.part_set_instrument(i, &self.parts[i], &data);
                }
            }
            SysEx::GlobalInstrument { slot, data } => {
                self.driver.set_global_instrument(slot, &data);
            }
            SysEx::ParamAdjust { channel, param, value } => {
                if let Some(i) = self.get_part(p, channel) {
                    self.driver.part_set_param(i, &self.parts[i], param, value);
                }
            }
            SysEx::SetInstrument { channel, instrument } => {
                if let Some(i) = self.get_part(p, channel) {
                    let (program, bank) = ((instrument & 0x7f) as u8, (instrument >> 8) as u8);
                    self.update_part(i, |part, _| part.set_program(program, bank));
                }
            }

            SysEx::HookJump { cmd, track, beat, tick } => {
                if self.players[p].scanning {
                    return;
                }
                if hook::fire(&mut self.players[p].hook.jump, cmd) {
                    if let Err(err) = self.jump(p, track, beat as u32, tick as u32) {
                        warn!("sound {}: hooked jump failed: {}", id, err);
                    }
                }
            }
            SysEx::HookTranspose { cmd, relative, value } => {
                if hook::fire(&mut self.players[p].hook.transpose, cmd) {
                    if let Err(err) = self.set_player_transpose(p, relative, value as i32) {
                        warn!("sound {}: hooked transpose failed: {}", id, err);
                    }
                }
            }
            SysEx::HookPartOnOff { channel, cmd, on } => {
                if hook::fire(&mut self.players[p].hook.part_onoff[channel as usize], cmd) {
                    if let Some(i) = self.get_part(p, channel) {
                        self.part_set_onoff(i, on);
                    }
                }
            }
            SysEx::HookPartVolume { channel, cmd, volume } => {
                if hook::fire(&mut self.players[p].hook.part_volume[channel as usize], cmd) {
                    if let Some(i) = self.get_part(p, channel) {
                        self.update_part(i, |part, owner| part.set_vol(volume, owner));
                    }
                }
            }
            SysEx::HookPartProgram { channel, cmd, program } => {
                if hook::fire(&mut self.players[p].hook.part_program[channel as usize], cmd) {
                    if let Some(i) = self.get_part(p, channel) {
                        self.update_part(i, |part, _| part.set_program(program, 0));
                    }
                }
            }
            SysEx::HookPartTranspose { channel, cmd, relative, value } => {
                if hook::fire(&mut self.players[p].hook.part_transpose[channel as usize], cmd) {
                    self.part_set_transpose(p, channel, relative, value);
                }
            }

            SysEx::Marker(data) => {
                for b in data {
                    self.handle_marker(id, b);
                }
            }

            SysEx::SetLoop { count, to_beat, to_tick, from_beat, from_tick } => {
                if let Err(err) = self.set_loop(p, count, to_beat, to_tick, from_beat, from_tick) {
                    debug!("sound {}: ignoring loop: {}", id, err);
                }
            }
            SysEx::ClearLoop => self.clear_loop(p),

            SysEx::Malformed(code) => warn!("sound {}: truncated sysex {}", id, code),
            SysEx::Unknown(code) => warn!("sound {}: unknown sysex {}", id, code),
        }
    }
}
