#![allow(dead_code)]

use imevent::sysex::encode_nibbles;
use imevent::write_var;
use imres::{write_chunk, Tag, MDHD, MTRK};
use imuse::{ActiveNotes, ChangeFlags, Driver, Engine, EngineConfig, Part};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    KeyOn { channel: u8, note: u8, velocity: u8 },
    KeyOff { channel: u8, note: u8 },
    Off { part: usize },
}

/// Driver that records what the engine asks of it.
#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    pub changes: Vec<(usize, ChangeFlags)>,
    /// `(part, channel, note)` of every note keyed on and not yet released.
    pub sounding: BTreeSet<(usize, u8, u8)>,
    pub timer_calls: usize,
}

impl Recorder {
    pub fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Sounding notes as `(channel, note)`.
    pub fn notes(&self) -> Vec<(u8, u8)> {
        self.sounding.iter().map(|&(_, channel, note)| (channel, note)).collect()
    }
}

impl Driver for Recorder {
    fn part_key_on(&mut self, id: usize, part: &Part, note: u8, velocity: u8) {
        let channel = part.channel();
        self.calls.push(Call::KeyOn { channel, note, velocity });
        self.sounding.insert((id, channel, note));
    }

    fn part_key_off(&mut self, id: usize, part: &Part, note: u8) {
        let channel = part.channel();
        self.calls.push(Call::KeyOff { channel, note });
        self.sounding.remove(&(id, channel, note));
    }

    fn part_changed(&mut self, id: usize, _part: &Part, what: ChangeFlags) {
        self.changes.push((id, what));
    }

    fn part_off(&mut self, id: usize, _part: &Part) {
        self.calls.push(Call::Off { part: id });
        self.sounding.retain(|&(part, _, _)| part != id);
    }

    fn part_update_active(&mut self, id: usize, _part: &Part, active: &mut ActiveNotes) {
        for &(_, channel, note) in self.sounding.iter().filter(|(part, _, _)| *part == id) {
            active.set(channel, note);
        }
    }

    /// Equal to the default tempo, so a fresh player moves one tick per call.
    fn base_tempo(&self) -> u32 {
        500_000
    }

    fn on_timer(&mut self) {
        self.timer_calls += 1;
    }
}

pub type TestEngine = Engine<Recorder, HashMap<u16, Vec<u8>>>;

/// Builds a track out of events, each placed after the time waited since
/// the previous one.
#[derive(Debug, Default)]
pub struct Track {
    data: Vec<u8>,
    delta: u32,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(mut self, ticks: u32) -> Self {
        self.delta += ticks;
        self
    }

    pub fn raw(mut self, event: &[u8]) -> Self {
        write_var(&mut self.data, self.delta);
        self.delta = 0;
        self.data.extend_from_slice(event);
        self
    }

    pub fn note_on(self, channel: u8, note: u8, velocity: u8) -> Self {
        self.raw(&[0x90 | channel, note, velocity])
    }

    pub fn note_off(self, channel: u8, note: u8) -> Self {
        self.raw(&[0x80 | channel, note, 0])
    }

    pub fn controller(self, channel: u8, controller: u8, value: u8) -> Self {
        self.raw(&[0xb0 | channel, controller, value])
    }

    pub fn program(self, channel: u8, program: u8) -> Self {
        self.raw(&[0xc0 | channel, program])
    }

    pub fn tempo(self, tempo: u32) -> Self {
        self.raw(&[0xff, 0x51, 0x03, (tempo >> 16) as u8, (tempo >> 8) as u8, tempo as u8])
    }

    /// Engine specific system exclusive block.
    pub fn sysex(self, code: u8, rest: &[u8]) -> Self {
        let mut payload = vec![0x7d, code];
        payload.extend_from_slice(rest);
        let mut event = vec![0xf0];
        write_var(&mut event, payload.len() as u32);
        event.extend_from_slice(&payload);
        self.raw(&event)
    }

    pub fn marker(self, marker: u8) -> Self {
        self.sysex(64, &[0, marker])
    }

    pub fn hook_jump(self, cmd: u8, track: u16, beat: u16, tick: u16) -> Self {
        let mut values = vec![cmd];
        for value in [track, beat, tick] {
            values.extend_from_slice(&value.to_be_bytes());
        }
        let mut rest = vec![0];
        rest.extend(encode_nibbles(&values));
        self.sysex(48, &rest)
    }

    pub fn end(self) -> Vec<u8> {
        self.raw(&[0xff, 0x2f, 0x00]).data
    }
}

/// A resource of the given family holding `tracks`.
pub fn sound(family: &[u8; 4], tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    write_chunk(&mut body, MDHD, &[0; 4]);
    for track in tracks {
        write_chunk(&mut body, MTRK, track);
    }
    let mut out = Vec::new();
    write_chunk(&mut out, Tag::new(*family), &body);
    out
}

/// A General MIDI resource with one track.
pub fn gm(track: Vec<u8>) -> Vec<u8> {
    sound(b"GMD ", &[track])
}

/// A track that touches one channel and then idles for a long time.
pub fn idle() -> Vec<u8> {
    Track::new().controller(0, 7, 100).wait(100_000).end()
}

pub fn engine(sounds: Vec<(u16, Vec<u8>)>) -> TestEngine {
    engine_with(sounds, EngineConfig::default())
}

pub fn engine_with(sounds: Vec<(u16, Vec<u8>)>, config: EngineConfig) -> TestEngine {
    Engine::new(Recorder::default(), sounds.into_iter().collect(), config)
}

/// Players currently running.
pub fn active_players(engine: &TestEngine) -> usize {
    engine.players().iter().filter(|p| p.is_active()).count()
}

pub fn run(engine: &mut TestEngine, calls: usize) {
    for _ in 0..calls {
        engine.on_timer();
    }
}

/// Script command with the missing arguments set to zero.
pub fn cmd(engine: &mut TestEngine, args: &[i32]) -> i32 {
    let mut all = [0; 8];
    all[..args.len()].copy_from_slice(args);
    engine.do_command(all)
}

/// Parts owned by the player in slot `p`.
pub fn parts_of(engine: &TestEngine, p: usize) -> usize {
    engine.parts().iter().filter(|part| part.owner() == Some(p)).count()
}
