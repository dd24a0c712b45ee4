mod command;
mod fader;
mod hook;
mod part;
mod player;
mod queue;
mod save;
mod seek;
mod sustain;

pub use part::Part;
pub use player::Player;

use crate::driver::{ActiveNotes, ChangeFlags, Driver, SoundSource};
use crate::{EngineConfig, Error, Result};
use fader::VolumeFader;
use imres::Resource;
use log::{debug, warn};
use queue::CommandQueue;
use sustain::SustainPool;

pub const MAX_PLAYERS: usize = 8;
pub const MAX_PARTS: usize = 32;
pub const MAX_FADERS: usize = 8;
pub const MAX_SUSTAINING: usize = 24;
pub const QUEUE_SIZE: usize = 64;
pub const VOLUME_CHANNELS: usize = 8;

pub const TICKS_PER_BEAT: u32 = 480;
/// Microseconds per beat until the data sets a tempo.
const DEFAULT_TEMPO: u32 = 500_000;
const DEFAULT_SPEED: u8 = 128;
/// Priority of a player started by `start_sound`.
const DEFAULT_PRIORITY: u8 = 0x80;
/// Velocity of notes replayed after a jump or scan.
const REPLAY_VELOCITY: u8 = 80;

/// The sequencer. Owns every pool and drives them from [`Engine::on_timer`].
pub struct Engine<D, S> {
    driver: D,
    sounds: S,
    config: EngineConfig,

    players: [Player; MAX_PLAYERS],
    parts: [Part; MAX_PARTS],
    faders: [VolumeFader; MAX_FADERS],
    sustain: SustainPool,
    queue: CommandQueue,
    /// Notes currently held by sustain entries.
    active_notes: ActiveNotes,

    game_tempo: u32,
    master_volume: u8,
    music_volume: u8,
    channel_volume: [u16; VOLUME_CHANNELS],
    channel_volume_eff: [u16; VOLUME_CHANNELS],
    volchan_table: [u16; VOLUME_CHANNELS],

    paused: bool,
    locked: u32,
    fader_counter: u8,
    active_faders: bool,
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    pub fn new(driver: D, sounds: S, config: EngineConfig) -> Self {
        let game_tempo = config.base_tempo.unwrap_or_else(|| driver.base_tempo());
        let mut engine = Self {
            driver,
            sounds,
            master_volume: config.master_volume,
            music_volume: config.music_volume,
            config,

            players: std::array::from_fn(|_| Player::new()),
            parts: std::array::from_fn(|_| Part::new()),
            faders: std::array::from_fn(|_| VolumeFader::default()),
            sustain: SustainPool::new(),
            queue: CommandQueue::new(),
            active_notes: ActiveNotes::new(),

            game_tempo,
            channel_volume: [127; VOLUME_CHANNELS],
            channel_volume_eff: [0; VOLUME_CHANNELS],
            volchan_table: [127; VOLUME_CHANNELS],

            paused: false,
            locked: 0,
            fader_counter: 0,
            active_faders: false,
        };
        engine.update_channel_volumes();
        engine
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
    pub fn sounds(&self) -> &S {
        &self.sounds
    }
    /// Resources can be added or replaced here. Removing one that is still
    /// playing stops its player on the next tick.
    pub fn sounds_mut(&mut self) -> &mut S {
        &mut self.sounds
    }
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
    /// First active player of a sound.
    pub fn player(&self, id: u16) -> Option<&Player> {
        self.find_player(id).map(|p| &self.players[p])
    }
    /// Notes held by sustain entries.
    pub fn active_notes(&self) -> &ActiveNotes {
        &self.active_notes
    }
    pub fn sustaining_notes(&self) -> usize {
        self.sustain.len()
    }
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn find_player(&self, id: u16) -> Option<usize> {
        self.players.iter().position(|p| p.active && p.id == id)
    }

    /// Payload of a track of a loaded sound.
    fn track(&self, id: u16, index: u16) -> Option<&[u8]> {
        let data = self.sounds.sound(id)?;
        Resource::read(data).ok()?.track(index as usize)
    }

    /// Holds off [`on_timer`](Self::on_timer) until the matching
    /// [`unlock`](Self::unlock).
    pub fn lock(&mut self) {
        self.locked += 1;
    }

    pub fn unlock(&mut self) {
        self.locked = self.locked.saturating_sub(1);
    }

    /// Starts a sound on a free player, preempting a lower priority one if
    /// all are busy. With `recycle_players` a sound already playing restarts
    /// on its own player.
    pub fn start_sound(&mut self, id: u16) -> bool {
        let has_header = self
            .sounds
            .sound(id)
            .map(|data| Resource::read(data).and_then(|res| res.header().map(|_| ())));
        match has_header {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                warn!("sound {}: {}", id, err);
                return false;
            }
            None => {
                warn!("sound {} is not loaded", id);
                return false;
            }
        }

        let running = if self.config.recycle_players {
            self.find_player(id)
        } else {
            None
        };
        let p = match running.or_else(|| self.allocate_player(DEFAULT_PRIORITY)) {
            Some(p) => p,
            None => return false,
        };
        self.clear_player(p);

        match self.start_player(p, id) {
            Ok(()) => true,
            Err(err) => {
                warn!("sound {}: {}", id, err);
                self.players[p].active = false;
                false
            }
        }
    }

    /// Returns 0 if a player of the sound was stopped, -1 otherwise.
    pub fn stop_sound(&mut self, id: u16) -> i32 {
        let mut result = -1;
        for p in 0..MAX_PLAYERS {
            if self.players[p].active && self.players[p].id == id {
                self.clear_player(p);
                result = 0;
            }
        }
        result
    }

    pub fn stop_all_sounds(&mut self) -> i32 {
        for p in 0..MAX_PLAYERS {
            if self.players[p].active {
                self.clear_player(p);
            }
        }
        0
    }

    /// 1 while a player of the sound is running, 2 while a queued command
    /// would start it, 0 otherwise.
    ///
    /// A player whose fade would end in silence is stopped here and does not
    /// count as running.
    pub fn get_sound_status(&mut self, id: u16) -> i32 {
        for p in 0..MAX_PLAYERS {
            if !self.players[p].active || self.players[p].id != id {
                continue;
            }
            if self.is_fading_out(p) {
                debug!("sound {}: fading out, stopping early", id);
                self.clear_player(p);
                continue;
            }
            return 1;
        }
        self.queue.sound_status(id)
    }

    /// Half beats into its track of the furthest advanced player, 0 when
    /// nothing plays. Scripts poll this to sync with the music.
    pub fn music_timer(&self) -> u32 {
        self.players
            .iter()
            .filter(|player| player.active)
            .map(|player| player.position() * 2 / TICKS_PER_BEAT)
            .max()
            .unwrap_or(0)
    }

    /// Index of a player slot for a request of the given priority.
    ///
    /// Only the first `limit_players` slots are used. A free slot is
    /// preferred. Otherwise the first player with the lowest priority is
    /// returned, if that priority is below the request or players are
    /// recycled.
    pub fn allocate_player(&self, priority: u8) -> Option<usize> {
        let limit = self.config.limit_players.clamp(1, MAX_PLAYERS);
        let mut best = None;
        let mut best_pri = u8::MAX;
        for (p, player) in self.players[..limit].iter().enumerate() {
            if !player.active {
                return Some(p);
            }
            if player.priority < best_pri {
                best = Some(p);
                best_pri = player.priority;
            }
        }

        if best_pri < priority || self.config.recycle_players {
            best
        } else {
            debug!("denying player request at priority {}", priority);
            None
        }
    }

    /// Advances every player by one timer call.
    pub fn on_timer(&mut self) {
        if self.locked > 0 || self.paused {
            return;
        }
        self.lock();

        for p in 0..MAX_PLAYERS {
            if self.players[p].active {
                self.sequencer_timer(p);
            }
        }
        self.expire_sustain_notes();
        self.expire_volume_faders();
        self.driver.on_timer();

        self.unlock();
    }

    pub fn pause(&mut self, paused: bool) {
        self.lock();
        self.paused = paused;
        self.update_volumes();
        self.unlock();
    }

    pub fn master_volume(&self) -> u8 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume;
        self.update_volumes();
    }

    pub fn music_volume(&self) -> u8 {
        self.music_volume
    }

    pub fn set_music_volume(&mut self, volume: u8) {
        self.music_volume = volume;
        self.update_volumes();
    }

    pub fn set_channel_volume(&mut self, chan: u16, volume: u16) -> Result<()> {
        if chan as usize >= VOLUME_CHANNELS || volume > 127 {
            return Err(Error::InvalidArgument(volume as i32));
        }
        self.channel_volume[chan as usize] = volume;
        self.update_volumes();
        Ok(())
    }

    /// Sets how many players may share volume channel `chan`. A limit of 8
    /// or more lifts the limit.
    pub fn set_volchan_entry(&mut self, chan: u16, limit: u16) -> Result<()> {
        if chan as usize >= VOLUME_CHANNELS {
            return Err(Error::InvalidArgument(chan as i32));
        }
        self.volchan_table[chan as usize] = limit;
        Ok(())
    }

    /// Moves the players of a sound to a volume channel.
    ///
    /// When the channel is at its limit, its lowest priority member is
    /// stopped first.
    pub fn set_volchan(&mut self, id: u16, chan: u16) -> Result<()> {
        if chan as usize >= VOLUME_CHANNELS {
            return Err(Error::InvalidArgument(chan as i32));
        }
        let target = self.find_player(id).ok_or(Error::NotActive)?;
        let limit = self.volchan_table[chan as usize];

        if limit >= VOLUME_CHANNELS as u16 {
            return self.set_player_volchan(target, chan);
        }

        let members: Vec<usize> = (0..MAX_PLAYERS)
            .filter(|&p| p != target && self.players[p].active && self.players[p].vol_chan == chan)
            .collect();
        if members.len() >= limit as usize {
            let victim = members
                .iter()
                .copied()
                .min_by_key(|&p| self.players[p].priority);
            if let Some(victim) = victim {
                debug!(
                    "volume channel {} is full, stopping sound {}",
                    chan, self.players[victim].id
                );
                self.clear_player(victim);
            }
        }
        self.set_player_volchan(target, chan)
    }

    fn set_player_volchan(&mut self, p: usize, chan: u16) -> Result<()> {
        self.players[p].vol_chan = chan;
        self.set_player_vol(p, self.players[p].volume)
    }

    /// Effective volume of a volume channel. Channels outside the table use
    /// half the combined master and music volume.
    fn channel_volume(&self, chan: u16) -> u16 {
        match self.channel_volume_eff.get(chan as usize) {
            Some(&volume) => volume,
            None => self.base_volume() >> 1,
        }
    }

    fn base_volume(&self) -> u16 {
        let music = if self.paused { 0 } else { self.music_volume as u32 };
        (self.master_volume as u32 * music / 255) as u16
    }

    fn update_channel_volumes(&mut self) {
        let base = self.base_volume() as u32;
        for (eff, &volume) in self.channel_volume_eff.iter_mut().zip(&self.channel_volume) {
            *eff = (base * volume as u32 / 255) as u16;
        }
    }

    fn update_volumes(&mut self) {
        self.update_channel_volumes();
        for p in 0..MAX_PLAYERS {
            if self.players[p].active {
                let volume = self.players[p].volume;
                if let Err(err) = self.set_player_vol(p, volume) {
                    warn!("sound {}: {}", self.players[p].id, err);
                }
            }
        }
    }

    /// Runs `f` on a part together with its owner and forwards the changed
    /// parameters to the driver. Free parts are left alone.
    fn update_part<F>(&mut self, i: usize, f: F)
    where
        F: FnOnce(&mut Part, &Player) -> ChangeFlags,
    {
        let p = match self.parts[i].player {
            Some(p) => p,
            None => return,
        };
        let what = f(&mut self.parts[i], &self.players[p]);
        if !what.is_empty() {
            self.driver.part_changed(i, &self.parts[i], what);
        }
    }

    /// [`update_part`](Self::update_part) on every part of a player.
    fn update_parts<F>(&mut self, p: usize, f: F)
    where
        F: Fn(&mut Part, &Player) -> ChangeFlags,
    {
        let mut cur = self.players[p].parts;
        while let Some(i) = cur {
            cur = self.parts[i].next;
            self.update_part(i, &f);
        }
    }
}

#[cfg(test)]
mod tests;
