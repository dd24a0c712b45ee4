use super::*;

const QUEUE_MASK: usize = QUEUE_SIZE - 1;

/// Number of arguments stored with a queued command.
pub(crate) const COMMAND_ARGS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueEntry {
    Empty,
    /// Waits for `marker` to be reached by a player of `sound`.
    Trigger { sound: u16, marker: u8 },
    Command([i32; COMMAND_ARGS]),
}

/// Ring of triggers, each followed by the commands it releases.
///
/// `pos` is where the next entry is written and `end` is the oldest entry
/// still waiting. The ring is full when advancing `pos` would reach `end`.
#[derive(Debug, Clone)]
pub(crate) struct CommandQueue {
    pub(crate) entries: [QueueEntry; QUEUE_SIZE],
    pub(crate) pos: usize,
    pub(crate) end: usize,
    /// A trigger is open and still receiving commands.
    pub(crate) adding: bool,
    /// Set by a clear, so a drain in progress stops.
    pub(crate) cleared: bool,
    pub(crate) sound: u16,
    pub(crate) marker: u8,
    pub(crate) trigger_count: i32,
}

impl CommandQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: [QueueEntry::Empty; QUEUE_SIZE],
            pos: 0,
            end: 0,
            adding: false,
            cleared: false,
            sound: 0,
            marker: 0,
            trigger_count: 0,
        }
    }

    fn push(&mut self, entry: QueueEntry) -> Result<()> {
        let next = (self.pos + 1) & QUEUE_MASK;
        if next == self.end {
            return Err(Error::QueueFull);
        }
        self.entries[self.pos] = entry;
        self.pos = next;
        Ok(())
    }

    pub(crate) fn enqueue_trigger(&mut self, sound: u16, marker: u8) -> Result<()> {
        self.push(QueueEntry::Trigger { sound, marker })?;
        self.adding = true;
        self.sound = sound;
        self.marker = marker;
        Ok(())
    }

    /// Appends a command to the open trigger. A first argument of -1 closes
    /// the trigger instead.
    pub(crate) fn enqueue_command(&mut self, args: [i32; COMMAND_ARGS]) -> Result<()> {
        if self.pos == self.end {
            return Err(Error::InvalidArgument(args[0]));
        }
        if args[0] == -1 {
            self.adding = false;
            self.trigger_count += 1;
            return Ok(());
        }
        self.push(QueueEntry::Command(args))
    }

    pub(crate) fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
        self.entries = [QueueEntry::Empty; QUEUE_SIZE];
        self.adding = false;
        self.cleared = true;
        self.trigger_count = 0;
    }

    /// 0: closed triggers waiting, 1: sound of the oldest trigger,
    /// 2: its marker.
    pub(crate) fn query(&self, param: i32) -> i32 {
        let head = if self.pos == self.end {
            None
        } else {
            match self.entries[self.end] {
                QueueEntry::Trigger { sound, marker } => Some((sound, marker)),
                _ => None,
            }
        };
        match param {
            0 => self.trigger_count,
            1 => head.map_or(-1, |(sound, _)| sound as i32),
            2 => head.map_or(0xff, |(_, marker)| marker as i32),
            _ => -1,
        }
    }

    /// 2 if a waiting command would start `sound`, 0 otherwise.
    pub(crate) fn sound_status(&self, sound: u16) -> i32 {
        let mut i = self.end;
        while i != self.pos {
            if let QueueEntry::Command(args) = self.entries[i] {
                if args[0] == 8 && args[1] == sound as i32 {
                    return 2;
                }
            }
            i = (i + 1) & QUEUE_MASK;
        }
        0
    }
}

impl<D: Driver, S: SoundSource> Engine<D, S> {
    /// A player of `sound` reached a marker. Runs the commands queued behind
    /// the oldest trigger if it waits for this marker.
    pub(crate) fn handle_marker(&mut self, sound: u16, marker: u8) {
        let queue = &mut self.queue;
        if queue.adding && queue.sound == sound && queue.marker == marker {
            return;
        }

        let mut pos = queue.end;
        if pos == queue.pos {
            return;
        }
        match queue.entries[pos] {
            QueueEntry::Trigger { sound: s, marker: m } if s == sound && m == marker => {}
            _ => return,
        }
        debug!("sound {}: marker {} released its commands", sound, marker);

        queue.trigger_count -= 1;
        queue.cleared = false;
        loop {
            pos = (pos + 1) & QUEUE_MASK;
            if pos == self.queue.pos {
                break;
            }
            let args = match self.queue.entries[pos] {
                QueueEntry::Command(args) => args,
                _ => break,
            };
            self.queue.end = pos;

            let [a, b, c, d, e, f, g] = args;
            self.do_command([a, b, c, d, e, f, g, 0]);
            if self.queue.cleared {
                return;
            }
            pos = self.queue.end;
        }
        self.queue.end = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(a: i32, b: i32) -> [i32; COMMAND_ARGS] {
        [a, b, 0, 0, 0, 0, 0]
    }

    #[test]
    fn commands_need_an_open_trigger() {
        let mut queue = CommandQueue::new();
        assert!(queue.enqueue_command(command(8, 1)).is_err());

        queue.enqueue_trigger(3, 7).unwrap();
        queue.enqueue_command(command(8, 1)).unwrap();
        assert_eq!(queue.query(0), 0);
        queue.enqueue_command(command(-1, 0)).unwrap();
        assert!(!queue.adding);

        assert_eq!(queue.query(0), 1);
        assert_eq!(queue.query(1), 3);
        assert_eq!(queue.query(2), 7);
        assert_eq!(queue.sound_status(1), 2);
        assert_eq!(queue.sound_status(2), 0);
    }

    #[test]
    fn empty_queue_queries() {
        let queue = CommandQueue::new();
        assert_eq!(queue.query(0), 0);
        assert_eq!(queue.query(1), -1);
        assert_eq!(queue.query(2), 0xff);
    }

    #[test]
    fn ring_holds_one_less_than_its_size() {
        let mut queue = CommandQueue::new();
        queue.enqueue_trigger(1, 1).unwrap();
        for i in 1..QUEUE_SIZE - 1 {
            queue.enqueue_command(command(9, i as i32)).unwrap();
        }
        assert!(matches!(queue.enqueue_command(command(9, 0)), Err(Error::QueueFull)));

        queue.clear();
        assert!(queue.cleared);
        assert_eq!(queue.query(1), -1);
        queue.enqueue_trigger(1, 1).unwrap();
    }
}
