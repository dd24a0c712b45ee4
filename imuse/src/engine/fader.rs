use super::*;

/// Linear volume ramp for one player, stepped every eighth timer call.
///
/// The per-step change is split into a whole part and a remainder that is
/// accumulated Bresenham style, so the ramp lands exactly on the target
/// after `time` steps.
#[derive(Debug, Clone, Default)]
pub(crate) struct VolumeFader {
    pub(crate) active: bool,
    pub(crate) player: usize,
    pub(crate) curvol: u8,
    pub(crate) speed_hi: i16,
    pub(crate) speed_lo: u16,
    pub(crate) speed_lo_max: u16,
    pub(crate) speed_lo_counter: u16,
    pub(crate) num_steps: u16,
    pub(crate) direction: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaderStep {
    Hold,
    Volume(u8),
    /// The ramp reached zero. The player should stop.
    Silent,
}

impl VolumeFader {
    pub(crate) fn start(player: usize, from: u8, to: u8, time: u16) -> Self {
        let diff = to as i32 - from as i32;
        let time = time.max(1);
        Self {
            active: true,
            player,
            curvol: from,
            speed_hi: (diff / time as i32) as i16,
            speed_lo: (diff.abs() % time as i32) as u16,
            speed_lo_max: time,
            speed_lo_counter: 0,
            num_steps: time,
            direction: if diff < 0 { -1 } else { 1 },
        }
    }

    pub(crate) fn step(&mut self) -> FaderStep {
        let mut newvol = self.curvol as i32 + self.speed_hi as i32;

        let counter = self.speed_lo_counter as u32 + self.speed_lo as u32;
        if counter >= self.speed_lo_max as u32 {
            self.speed_lo_counter = (counter - self.speed_lo_max as u32) as u16;
            newvol += self.direction as i32;
        } else {
            self.speed_lo_counter = counter as u16;
        }

        let newvol = newvol.clamp(0, 127) as u8;
        let mut result = FaderStep::Hold;
        if newvol != self.curvol {
            self.curvol = newvol;
            if newvol == 0 {
                self.active = false;
                return FaderStep::Silent;
            }
            result = FaderStep::Volume(newvol);
        }

        self.num_steps = self.num_steps.saturating_sub(1);
        if self.num_steps == 0 {
            self.active = false;
        }
        result
    }

    /// Runs a copy of the ramp to its end and reports whether it ends in
    /// silence.
    pub(crate) fn fades_to_silence(&self) -> bool {
        let mut probe = self.clone();
        while probe.active {
            if probe.step() == FaderStep::Silent {
                return true;
            }
        }
        false
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Ramps a player's volume to `volume` over `time` fader steps.
    ///
    /// A time of 0 sets the volume at once, and so does a request that finds
    /// every fader busy.
    pub(crate) fn fade_vol(&mut self, p: usize, volume: u8, time: u16) -> Result<()> {
        if volume > 127 {
            return Err(Error::InvalidArgument(volume as i32));
        }
        self.cancel_volume_fade(p);
        if time == 0 {
            return self.set_player_vol(p, volume);
        }

        let f = match self.faders.iter().position(|f| !f.active) {
            Some(f) => f,
            None => {
                warn!("sound {}: no volume fader available", self.players[p].id);
                return self.set_player_vol(p, volume);
            }
        };
        self.faders[f] = VolumeFader::start(p, self.players[p].volume, volume, time);
        self.active_faders = true;
        Ok(())
    }

    pub(crate) fn cancel_volume_fade(&mut self, p: usize) {
        for fader in self.faders.iter_mut() {
            if fader.active && fader.player == p {
                fader.active = false;
            }
        }
    }

    /// The player has a fade running that will stop it.
    pub(crate) fn is_fading_out(&self, p: usize) -> bool {
        self.faders
            .iter()
            .any(|f| f.active && f.player == p && f.direction < 0 && f.fades_to_silence())
    }

    pub(crate) fn expire_volume_faders(&mut self) {
        self.fader_counter = self.fader_counter.wrapping_add(1);
        if self.fader_counter & 7 != 0 || !self.active_faders {
            return;
        }

        self.active_faders = false;
        for f in 0..MAX_FADERS {
            if !self.faders[f].active {
                continue;
            }
            self.active_faders = true;

            let p = self.faders[f].player;
            match self.faders[f].step() {
                FaderStep::Hold => {}
                FaderStep::Volume(volume) => {
                    if let Err(err) = self.set_player_vol(p, volume) {
                        warn!("sound {}: {}", self.players[p].id, err);
                    }
                }
                FaderStep::Silent => self.clear_player(p),
            }
        }
    }
}
