use super::queue::{QueueEntry, COMMAND_ARGS};
use super::*;
use crate::save::{SaveReader, SaveWriter, Serializer};

impl Player {
    fn sync(&mut self, s: &mut dyn Serializer) -> Result<()> {
        s.sync_bool(&mut self.active, 1)?;
        s.sync_u16(&mut self.id, 1)?;
        s.sync_u8(&mut self.priority, 1)?;
        s.sync_u8(&mut self.volume, 1)?;
        s.sync_i8(&mut self.pan, 1)?;
        s.sync_i8(&mut self.transpose, 1)?;
        s.sync_i8(&mut self.detune, 2)?;
        s.sync_u16(&mut self.vol_chan, 2)?;
        s.sync_u8(&mut self.speed, 1)?;
        s.sync_u32(&mut self.tempo, 1)?;
        s.sync_u32(&mut self.timer_counter, 1)?;

        s.sync_u16(&mut self.track_index, 1)?;
        let mut offset = self.song_offset as u32;
        s.sync_u32(&mut offset, 1)?;
        self.song_offset = offset as usize;
        s.sync_u32(&mut self.cur_pos, 1)?;
        s.sync_u32(&mut self.next_pos, 1)?;
        s.sync_u32(&mut self.beat_index, 1)?;
        s.sync_u32(&mut self.tick_index, 1)?;

        s.sync_u16(&mut self.loop_counter, 1)?;
        s.sync_u16(&mut self.loop_to_beat, 1)?;
        s.sync_u16(&mut self.loop_to_tick, 1)?;
        s.sync_u16(&mut self.loop_from_beat, 1)?;
        s.sync_u16(&mut self.loop_from_tick, 1)?;

        let hook = &mut self.hook;
        s.sync_u8(&mut hook.jump, 2)?;
        s.sync_u8(&mut hook.transpose, 2)?;
        for table in [
            &mut hook.part_onoff,
            &mut hook.part_volume,
            &mut hook.part_program,
            &mut hook.part_transpose,
        ] {
            if s.version() >= 2 {
                s.sync_bytes(table)?;
            }
        }

        s.sync_link(&mut self.parts, MAX_PARTS, 1)
    }
}

impl Part {
    fn sync(&mut self, s: &mut dyn Serializer) -> Result<()> {
        s.sync_link(&mut self.player, MAX_PLAYERS, 1)?;
        s.sync_link(&mut self.next, MAX_PARTS, 1)?;
        s.sync_link(&mut self.prev, MAX_PARTS, 1)?;

        s.sync_u8(&mut self.channel, 1)?;
        s.sync_bool(&mut self.on, 1)?;
        s.sync_bool(&mut self.percussion, 1)?;
        s.sync_u8(&mut self.vol, 1)?;
        s.sync_i8(&mut self.pan, 1)?;
        s.sync_i8(&mut self.transpose, 1)?;
        s.sync_i8(&mut self.detune, 2)?;
        s.sync_i8(&mut self.pri, 1)?;
        s.sync_i16(&mut self.pitchbend, 1)?;
        s.sync_u8(&mut self.pitchbend_factor, 3)?;
        s.sync_u8(&mut self.program, 1)?;
        s.sync_u8(&mut self.bank, 3)?;
        s.sync_u8(&mut self.modwheel, 3)?;
        s.sync_bool(&mut self.pedal, 3)?;
        s.sync_u8(&mut self.effect_level, 3)?;
        s.sync_u8(&mut self.chorus, 3)
    }
}

impl VolumeFader {
    fn sync(&mut self, s: &mut dyn Serializer) -> Result<()> {
        s.sync_bool(&mut self.active, 1)?;
        let mut player = Some(self.player);
        s.sync_link(&mut player, MAX_PLAYERS, 1)?;
        self.player = player.unwrap_or_default();
        s.sync_u8(&mut self.curvol, 1)?;
        s.sync_i16(&mut self.speed_hi, 1)?;
        s.sync_u16(&mut self.speed_lo, 1)?;
        s.sync_u16(&mut self.speed_lo_max, 1)?;
        s.sync_u16(&mut self.speed_lo_counter, 1)?;
        s.sync_u16(&mut self.num_steps, 1)?;
        s.sync_i8(&mut self.direction, 1)
    }
}

impl CommandQueue {
    fn sync(&mut self, s: &mut dyn Serializer) -> Result<()> {
        for entry in self.entries.iter_mut() {
            let (mut tag, mut args) = match *entry {
                QueueEntry::Empty => (0u8, [0; COMMAND_ARGS]),
                QueueEntry::Trigger { sound, marker } => {
                    (1, [sound as i32, marker as i32, 0, 0, 0, 0, 0])
                }
                QueueEntry::Command(args) => (2, args),
            };
            s.sync_u8(&mut tag, 1)?;
            for arg in args.iter_mut() {
                s.sync_i32(arg, 1)?;
            }
            *entry = match tag {
                0 => QueueEntry::Empty,
                1 => QueueEntry::Trigger {
                    sound: args[0] as u16,
                    marker: args[1] as u8,
                },
                2 => QueueEntry::Command(args),
                _ => return Err(Error::CorruptSave("queue entry")),
            };
        }

        let mut pos = self.pos as u8;
        let mut end = self.end as u8;
        s.sync_u8(&mut pos, 1)?;
        s.sync_u8(&mut end, 1)?;
        if pos as usize >= QUEUE_SIZE || end as usize >= QUEUE_SIZE {
            return Err(Error::CorruptSave("queue position"));
        }
        self.pos = pos as usize;
        self.end = end as usize;

        s.sync_bool(&mut self.adding, 1)?;
        s.sync_u16(&mut self.sound, 1)?;
        s.sync_u8(&mut self.marker, 1)?;
        s.sync_i32(&mut self.trigger_count, 1)
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Saves or restores the engine, depending on the serializer.
    ///
    /// Sustaining notes are not part of the state; a load releases them.
    pub fn save_load(&mut self, s: &mut dyn Serializer) -> Result<()> {
        if !s.is_loading() {
            return self.sync_state(s);
        }

        self.lock();
        for i in 0..MAX_PARTS {
            if self.parts[i].player.is_some() {
                self.driver.part_off(i, &self.parts[i]);
            }
        }
        self.sustain.clear(&mut self.active_notes);
        self.players = std::array::from_fn(|_| Player::new());
        self.parts = std::array::from_fn(|_| Part::new());
        self.faders = std::array::from_fn(|_| VolumeFader::default());
        self.queue = CommandQueue::new();

        let result = self.sync_state(s).and_then(|()| self.check_links());
        match &result {
            Ok(()) => self.fix_after_load(),
            Err(err) => {
                warn!("load failed: {}", err);
                self.players = std::array::from_fn(|_| Player::new());
                self.parts = std::array::from_fn(|_| Part::new());
                self.faders = std::array::from_fn(|_| VolumeFader::default());
                self.queue = CommandQueue::new();
            }
        }
        self.unlock();
        result
    }

    pub fn save_state(&mut self) -> Result<Vec<u8>> {
        let mut writer = SaveWriter::new();
        self.save_load(&mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = SaveReader::new(data)?;
        self.save_load(&mut reader)
    }

    fn sync_state(&mut self, s: &mut dyn Serializer) -> Result<()> {
        s.sync_u8(&mut self.master_volume, 1)?;
        for volume in self.channel_volume.iter_mut() {
            s.sync_u16(volume, 2)?;
        }
        for limit in self.volchan_table.iter_mut() {
            s.sync_u16(limit, 2)?;
        }

        for player in self.players.iter_mut() {
            player.sync(s)?;
        }
        for part in self.parts.iter_mut() {
            part.sync(s)?;
        }
        for fader in self.faders.iter_mut() {
            fader.sync(s)?;
        }
        self.queue.sync(s)
    }

    /// Every part list must agree with the back references of its parts.
    fn check_links(&self) -> Result<()> {
        let mut seen = [false; MAX_PARTS];
        for (p, player) in self.players.iter().enumerate() {
            let mut prev = None;
            let mut cur = player.parts;
            while let Some(i) = cur {
                let part = &self.parts[i];
                if seen[i] || !player.active || part.player != Some(p) || part.prev != prev {
                    return Err(Error::CorruptSave("part list"));
                }
                seen[i] = true;
                prev = Some(i);
                cur = part.next;
            }
        }
        if self.parts.iter().enumerate().any(|(i, part)| part.player.is_some() != seen[i]) {
            return Err(Error::CorruptSave("orphaned part"));
        }
        Ok(())
    }

    /// Recomputes everything derived from the restored fields.
    fn fix_after_load(&mut self) {
        self.update_channel_volumes();
        self.active_faders = self.faders.iter().any(|f| f.active);

        for p in 0..MAX_PLAYERS {
            if !self.players[p].active {
                continue;
            }
            let id = self.players[p].id;
            let format = self
                .sounds
                .sound(id)
                .and_then(|data| Resource::read(data).ok())
                .map(|res| res.format);
            let format = match format {
                Some(format) => format,
                None => {
                    warn!("sound {} is missing after load", id);
                    self.clear_player(p);
                    continue;
                }
            };

            let player = &mut self.players[p];
            player.mt32_emulate = format.is_mt32() && !self.config.native_mt32;
            player.is_gm = format.is_gm();
            let tempo = player.tempo;
            self.set_tempo(p, tempo);

            let volume = self.players[p].volume;
            if let Err(err) = self.set_player_vol(p, volume) {
                warn!("sound {}: {}", id, err);
            }
            let mt32_emulate = self.players[p].mt32_emulate;
            self.update_parts(p, |part, owner| {
                part.mt32_emulate = mt32_emulate;
                part.refresh(owner)
            });
        }
        self.driver.update_pris();
    }
}
