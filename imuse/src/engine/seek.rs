use super::*;
use imevent::{read_var, Event};

/// Applies the note events of a track from a cursor up to `topos`.
///
/// Returns the cursor of the first event at or after `topos`.
fn walk_notes(
    data: &[u8],
    mut offset: usize,
    mut pos: u32,
    topos: u32,
    notes: &mut ActiveNotes,
) -> Result<(usize, u32)> {
    while pos < topos {
        let (event, size) = Event::read(data.get(offset..).unwrap_or_default())?;
        match event {
            Event::NoteOn { channel, note, .. } => notes.set(channel, note),
            Event::NoteOff { channel, note } => notes.unset(channel, note),
            Event::EndOfTrack => return Err(Error::PastEnd),
            _ => {}
        }
        offset += size;

        let (delta, size) = read_var(data.get(offset..).unwrap_or_default())?;
        offset += size;
        pos = pos.wrapping_add(delta);
    }
    Ok((offset, pos))
}

/// Scans ahead from a cursor for the release of each note in `notes`.
///
/// Positions are counted from `pos`. Notes never released before the end of
/// the track are reported at the track's end.
fn find_releases(data: &[u8], mut offset: usize, mut pos: u32, notes: &ActiveNotes) -> Vec<(u8, u8, u32)> {
    let mut pending = notes.clone();
    let mut found = Vec::new();

    while !pending.is_empty() {
        let (event, size) = match Event::read(data.get(offset..).unwrap_or_default()) {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            Event::NoteOff { channel, note } if pending.contains(channel, note) => {
                pending.unset(channel, note);
                found.push((channel, note, pos));
            }
            Event::EndOfTrack => break,
            _ => {}
        }
        offset += size;

        let (delta, size) = match read_var(data.get(offset..).unwrap_or_default()) {
            Ok(var) => var,
            Err(_) => break,
        };
        offset += size;
        pos = pos.wrapping_add(delta);
    }

    found.extend(pending.iter().map(|(channel, note)| (channel, note, pos)));
    found
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Notes the driver reports as sounding on the parts of a player.
    fn sounding_notes(&mut self, p: usize) -> ActiveNotes {
        let mut notes = ActiveNotes::new();
        let mut cur = self.players[p].parts;
        while let Some(i) = cur {
            cur = self.parts[i].next;
            self.driver.part_update_active(i, &self.parts[i], &mut notes);
        }
        notes
    }

    /// Moves a player to a position while keeping the music continuous.
    ///
    /// Notes sounding now that are not held at the target keep ringing until
    /// the point where the old position would have released them. Notes held
    /// at the target that are silent now are started.
    pub(crate) fn jump(&mut self, p: usize, track: u16, beat: u32, tick: u32) -> Result<()> {
        let player = &self.players[p];
        if !player.active {
            return Err(Error::NotActive);
        }
        let id = player.id;
        self.track(id, track).ok_or(Error::TrackNotFound(track))?;

        let topos = (beat.max(1) - 1)
            .saturating_mul(TICKS_PER_BEAT)
            .saturating_add(tick);
        if track == player.track_index && topos == player.cur_pos {
            return Ok(());
        }

        self.lock();
        let result = self.splice(p, track, topos);
        self.unlock();
        result
    }

    fn splice(&mut self, p: usize, track: u16, topos: u32) -> Result<()> {
        let sounding = self.sounding_notes(p);
        let player = &self.players[p];
        let id = player.id;

        let mut target = ActiveNotes::new();
        let (offset, next_pos) = {
            let data = self.track(id, track).ok_or(Error::TrackNotFound(track))?;
            if track == player.track_index && topos >= player.next_pos {
                target = sounding.clone();
                for entry in self.sustain.iter().filter(|e| e.player == p) {
                    target.unset(entry.channel, entry.note);
                }
                walk_notes(data, player.song_offset, player.next_pos, topos, &mut target)?
            } else {
                let (delta, size) = read_var(data)?;
                walk_notes(data, size, delta, topos, &mut target)?
            }
        };

        // target notes already held by a sustain entry just keep sounding
        let held: Vec<(u8, u8)> = self
            .sustain
            .iter()
            .filter(|e| e.player == p && target.contains(e.channel, e.note))
            .map(|e| (e.channel, e.note))
            .collect();
        for (channel, note) in held {
            self.retire_sustained(p, channel, note);
        }

        let mut leaving = ActiveNotes::new();
        for (channel, note) in sounding.iter() {
            if !target.contains(channel, note) && self.sustain.find(p, channel, note).is_none() {
                leaving.set(channel, note);
            }
        }

        self.turn_off_pedals(p);
        if !leaving.is_empty() {
            let player = &self.players[p];
            let releases = match self.track(id, player.track_index) {
                Some(data) => find_releases(
                    data,
                    player.song_offset,
                    player.next_pos.saturating_sub(player.cur_pos),
                    &leaving,
                ),
                None => leaving.iter().map(|(channel, note)| (channel, note, 0)).collect(),
            };
            for (channel, note, off_pos) in releases {
                if !self.sustain_note(p, channel, note, off_pos) {
                    debug!("sound {}: sustain pool full, releasing note {}", id, note);
                    self.key_off(p, channel, note);
                }
            }
        }

        for (channel, note) in target.iter() {
            if !sounding.contains(channel, note) {
                self.key_on(p, channel, note, REPLAY_VELOCITY);
            }
        }

        let player = &mut self.players[p];
        if track != player.track_index {
            player.track_index = track;
            player.loop_counter = 0;
        }
        player.song_offset = offset;
        player.next_pos = next_pos;
        player.timer_counter = 0;
        player.set_position(topos);
        player.abort = true;
        debug!("sound {}: jumped to track {} tick {}", id, track, topos);
        Ok(())
    }

    /// Replays a track from its start up to a position without sounding
    /// notes, then starts the notes held at that position.
    ///
    /// Controllers, programs and tempo changes along the way take effect.
    pub(crate) fn scan(&mut self, p: usize, track: u16, beat: u32, tick: u32) -> Result<()> {
        if !self.players[p].active {
            return Err(Error::NotActive);
        }
        let id = self.players[p].id;
        let (delta, size) = {
            let data = self.track(id, track).ok_or(Error::TrackNotFound(track))?;
            read_var(data)?
        };
        let topos = (beat.max(1) - 1)
            .saturating_mul(TICKS_PER_BEAT)
            .saturating_add(tick);

        self.lock();
        self.turn_off_parts(p);
        self.release_sustained(p);

        let player = &mut self.players[p];
        if track != player.track_index {
            player.track_index = track;
            player.loop_counter = 0;
        }
        player.song_offset = size;
        player.next_pos = delta;
        player.active_notes.clear();
        player.scanning = true;
        player.abort = false;

        while self.players[p].next_pos < topos {
            if !self.parse_next(p) {
                break;
            }
        }

        let result = if !self.players[p].active {
            Err(Error::PastEnd)
        } else {
            self.players[p].scanning = false;
            let notes = self.players[p].active_notes.clone();
            for (channel, note) in notes.iter() {
                self.key_on(p, channel, note, REPLAY_VELOCITY);
            }

            let player = &mut self.players[p];
            player.timer_counter = 0;
            player.set_position(topos);
            player.abort = true;
            Ok(())
        };

        self.unlock();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imevent::write_var;

    fn track(events: &[(u32, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (delta, event) in events {
            write_var(&mut out, *delta);
            out.extend_from_slice(event);
        }
        out
    }

    #[test]
    fn walk_collects_held_notes() {
        let data = track(&[
            (0, &[0x90, 60, 100]),
            (10, &[0x91, 64, 100]),
            (10, &[0x80, 60, 0]),
            (10, &[0xff, 0x2f, 0x00]),
        ]);
        let mut notes = ActiveNotes::new();
        let (offset, pos) = walk_notes(&data, 1, 0, 20, &mut notes).unwrap();

        assert_eq!(pos, 20);
        assert_eq!(&data[offset..offset + 3], &[0x80, 60, 0]);
        // the release at the target tick itself is not applied
        assert_eq!(notes.iter().collect::<Vec<_>>(), vec![(0, 60), (1, 64)]);

        assert!(matches!(
            walk_notes(&data, 1, 0, 100, &mut ActiveNotes::new()),
            Err(Error::PastEnd)
        ));
    }

    #[test]
    fn releases_are_relative_to_the_cursor() {
        let data = track(&[
            (0, &[0x90, 60, 100]),
            (5, &[0x80, 61, 0]),
            (10, &[0x80, 60, 0]),
            (10, &[0xff, 0x2f, 0x00]),
        ]);
        let mut notes = ActiveNotes::new();
        notes.set(0, 60);
        notes.set(0, 61);
        notes.set(0, 62);

        // cursor at the second event, three ticks before it is due
        let releases = find_releases(&data, 5, 3, &notes);
        assert_eq!(releases, vec![(0, 61, 3), (0, 60, 13), (0, 62, 23)]);
    }
}
