use super::*;

/// A note kept sounding past a jump until the point where the data would
/// have released it.
#[derive(Debug, Clone, Default)]
pub(crate) struct SustainingNote {
    pub(crate) player: usize,
    pub(crate) channel: u8,
    pub(crate) note: u8,
    /// Ticks after the jump at which the note is released.
    pub(crate) off_pos: u32,
    pub(crate) pos: u32,
    pub(crate) counter: u32,
    next: Option<usize>,
    prev: Option<usize>,
}

/// Fixed pool of sustaining notes.
///
/// Entries sit either on the free list or on the used list, which keeps
/// insertion order. Every used entry has its bit set in the engine's active
/// note bitmap.
#[derive(Debug, Clone)]
pub(crate) struct SustainPool {
    entries: [SustainingNote; MAX_SUSTAINING],
    free: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl SustainPool {
    pub(crate) fn new() -> Self {
        let mut entries: [SustainingNote; MAX_SUSTAINING] = Default::default();
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.next = if i + 1 < MAX_SUSTAINING { Some(i + 1) } else { None };
        }
        Self {
            entries,
            free: Some(0),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    pub(crate) fn next(&self, i: usize) -> Option<usize> {
        self.entries[i].next
    }

    pub(crate) fn get_mut(&mut self, i: usize) -> &mut SustainingNote {
        &mut self.entries[i]
    }

    /// Used entries in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &SustainingNote> + '_ {
        std::iter::successors(self.head, move |&i| self.entries[i].next).map(move |i| &self.entries[i])
    }

    pub(crate) fn find(&self, player: usize, channel: u8, note: u8) -> Option<usize> {
        std::iter::successors(self.head, |&i| self.entries[i].next).find(|&i| {
            let entry = &self.entries[i];
            entry.player == player && entry.channel == channel && entry.note == note
        })
    }

    /// Takes a free entry. Returns false when the pool is exhausted.
    pub(crate) fn insert(
        &mut self,
        player: usize,
        channel: u8,
        note: u8,
        off_pos: u32,
        notes: &mut ActiveNotes,
    ) -> bool {
        let i = match self.free {
            Some(i) => i,
            None => return false,
        };
        self.free = self.entries[i].next;

        self.entries[i] = SustainingNote {
            player,
            channel,
            note,
            off_pos,
            pos: 0,
            counter: 0,
            next: None,
            prev: self.tail,
        };
        match self.tail {
            Some(tail) => self.entries[tail].next = Some(i),
            None => self.head = Some(i),
        }
        self.tail = Some(i);
        self.len += 1;

        notes.set(channel, note);
        true
    }

    /// Returns a used entry to the free list.
    pub(crate) fn remove(&mut self, i: usize, notes: &mut ActiveNotes) {
        let (prev, next) = (self.entries[i].prev, self.entries[i].next);
        match prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.tail = prev,
        }

        let (channel, note) = (self.entries[i].channel, self.entries[i].note);
        self.entries[i].prev = None;
        self.entries[i].next = self.free;
        self.free = Some(i);
        self.len -= 1;

        if !self.iter().any(|e| e.channel == channel && e.note == note) {
            notes.unset(channel, note);
        }
    }

    /// Removes every entry of a player, returning their channel and note.
    pub(crate) fn remove_player(&mut self, player: usize, notes: &mut ActiveNotes) -> Vec<(u8, u8)> {
        let mut removed = Vec::new();
        let mut cur = self.head;
        while let Some(i) = cur {
            cur = self.entries[i].next;
            if self.entries[i].player == player {
                removed.push((self.entries[i].channel, self.entries[i].note));
                self.remove(i, notes);
            }
        }
        removed
    }

    pub(crate) fn clear(&mut self, notes: &mut ActiveNotes) {
        while let Some(i) = self.head {
            self.remove(i, notes);
        }
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// Holds a note until `off_pos` ticks of its player have passed.
    pub(crate) fn sustain_note(&mut self, p: usize, channel: u8, note: u8, off_pos: u32) -> bool {
        self.sustain
            .insert(p, channel, note, off_pos, &mut self.active_notes)
    }

    /// Drops the sustain entry of a note that is being played again.
    pub(crate) fn retire_sustained(&mut self, p: usize, channel: u8, note: u8) {
        if let Some(i) = self.sustain.find(p, channel, note) {
            self.sustain.remove(i, &mut self.active_notes);
        }
    }

    /// Releases sustained notes whose time is up.
    pub(crate) fn expire_sustain_notes(&mut self) {
        let mut cur = self.sustain.head();
        while let Some(i) = cur {
            cur = self.sustain.next(i);

            let entry = self.sustain.get_mut(i);
            let counter = entry.counter as u64 + self.players[entry.player].timer_speed as u64;
            entry.pos = entry.pos.saturating_add((counter >> 16) as u32);
            entry.counter = (counter & 0xffff) as u32;
            if entry.pos < entry.off_pos {
                continue;
            }

            let (p, channel, note) = (entry.player, entry.channel, entry.note);
            self.sustain.remove(i, &mut self.active_notes);
            self.key_off(p, channel, note);
        }
    }

    /// Releases every sustained note of a player at once.
    pub(crate) fn release_sustained(&mut self, p: usize) {
        let notes = self.sustain.remove_player(p, &mut self.active_notes);
        for (channel, note) in notes {
            self.key_off(p, channel, note);
        }
    }
}
