use super::*;
use imevent::write_var;
use imres::{write_chunk, Tag, MTRK};
use std::collections::HashMap;

#[derive(Default)]
struct NullDriver {
    offs: usize,
}

impl Driver for NullDriver {
    fn part_key_on(&mut self, _: usize, _: &Part, _: u8, _: u8) {}
    fn part_key_off(&mut self, _: usize, _: &Part, _: u8) {}
    fn part_changed(&mut self, _: usize, _: &Part, _: ChangeFlags) {}
    fn part_off(&mut self, _: usize, _: &Part) {
        self.offs += 1;
    }
    fn part_update_active(&mut self, _: usize, _: &Part, _: &mut ActiveNotes) {}
    fn base_tempo(&self) -> u32 {
        500_000
    }
}

type TestEngine = Engine<NullDriver, HashMap<u16, Vec<u8>>>;

/// A GM sound whose single track touches `channels` and then idles.
fn sound(channels: &[u8]) -> Vec<u8> {
    let mut track = Vec::new();
    for &channel in channels {
        write_var(&mut track, 0);
        track.extend_from_slice(&[0xb0 | channel, 7, 100]);
    }
    write_var(&mut track, 10_000);
    track.extend_from_slice(&[0xff, 0x2f, 0x00]);

    let mut body = Vec::new();
    write_chunk(&mut body, Tag::new(*b"MDhd"), &[0; 4]);
    write_chunk(&mut body, MTRK, &track);
    let mut out = Vec::new();
    write_chunk(&mut out, Tag::new(*b"GMD "), &body);
    out
}

fn engine(sounds: &[(u16, Vec<u8>)]) -> TestEngine {
    Engine::new(
        NullDriver::default(),
        sounds.iter().cloned().collect(),
        EngineConfig::default(),
    )
}

/// Every part list agrees with the back references of its parts.
fn assert_links(engine: &TestEngine) {
    let mut owned = 0;
    for (p, player) in engine.players.iter().enumerate() {
        let mut prev = None;
        let mut cur = player.parts;
        while let Some(i) = cur {
            assert_eq!(engine.parts[i].player, Some(p));
            assert_eq!(engine.parts[i].prev, prev);
            owned += 1;
            prev = Some(i);
            cur = engine.parts[i].next;
        }
    }
    let claimed = engine.parts.iter().filter(|part| part.player.is_some()).count();
    assert_eq!(owned, claimed);
}

#[test]
fn base_tempo_equal_to_tempo_gives_one_tick_per_call() {
    let mut engine = engine(&[(1, sound(&[0]))]);
    assert!(engine.start_sound(1));
    let player = &engine.players[0];
    assert_eq!(player.tempo_eff, 0x10000);
    assert_eq!(player.timer_speed, 0x10000);

    engine.set_speed(0, 64);
    assert_eq!(engine.players[0].timer_speed, 0x8000);

    engine.game_tempo = 0x4A0000;
    engine.set_tempo(0, 500_000);
    // both operands shifted below 2^16 before dividing
    assert_eq!(engine.players[0].tempo_eff, (0x9400u32 << 16) / 3906);
}

#[test]
fn part_lists_stay_consistent_through_preemption() {
    let sounds: Vec<(u16, Vec<u8>)> = (1..=3)
        .map(|id| (id, sound(&(0..16).collect::<Vec<_>>())))
        .collect();
    let mut engine = engine(&sounds);

    assert!(engine.start_sound(1));
    assert!(engine.start_sound(2));
    engine.on_timer();
    assert_links(&engine);
    assert_eq!(engine.parts.iter().filter(|p| p.player.is_some()).count(), 32);

    // a higher priority player takes parts away from the others
    assert!(engine.start_sound(3));
    engine.set_player_priority(2, 200);
    engine.on_timer();
    assert_links(&engine);
    let third = engine.parts.iter().filter(|p| p.player == Some(2)).count();
    assert_eq!(third, 16);
    assert_eq!(engine.driver().offs, 16);

    engine.stop_sound(3);
    assert_links(&engine);
    assert!(engine.parts.iter().all(|p| p.player != Some(2)));
}

#[test]
fn allocation_denied_at_equal_priority() {
    let mut engine = engine(&[(1, sound(&[0]))]);
    for _ in 0..MAX_PLAYERS {
        assert!(engine.start_sound(1));
    }
    assert_eq!(engine.allocate_player(0x80), None);
    assert_eq!(engine.allocate_player(0x81), Some(0));

    engine.set_player_priority(3, 0x10);
    engine.set_player_priority(5, 0x10);
    assert_eq!(engine.allocate_player(0x81), Some(3));
}

#[test]
fn lock_holds_off_the_timer() {
    let mut engine = engine(&[(1, sound(&[0]))]);
    assert!(engine.start_sound(1));

    engine.lock();
    engine.on_timer();
    assert_eq!(engine.players[0].cur_pos, 0);
    engine.unlock();
    engine.on_timer();
    assert_eq!(engine.players[0].cur_pos, 1);
}

#[test]
fn volume_channels_scale_players() {
    let mut engine = engine(&[(1, sound(&[0])), (2, sound(&[0]))]);
    assert!(engine.start_sound(1));
    assert_eq!(engine.players[0].vol_eff, 127);

    engine.set_channel_volume(2, 64).unwrap();
    engine.set_volchan(1, 2).unwrap();
    assert_eq!(engine.players[0].vol_chan, 2);
    assert_eq!(engine.players[0].vol_eff, 64);

    engine.set_master_volume(0);
    assert_eq!(engine.players[0].vol_eff, 0);
    engine.set_master_volume(255);

    engine.pause(true);
    assert_eq!(engine.players[0].vol_eff, 0);
    engine.on_timer();
    assert_eq!(engine.players[0].cur_pos, 0);
    engine.pause(false);
    assert_eq!(engine.players[0].vol_eff, 64);
}

#[test]
fn limited_volume_channel_evicts_lowest_priority() {
    let mut engine = engine(&[(1, sound(&[0])), (2, sound(&[0])), (3, sound(&[0]))]);
    for id in 1..=3 {
        assert!(engine.start_sound(id));
    }
    engine.set_volchan_entry(1, 2).unwrap();
    engine.set_player_priority(0, 10);

    engine.set_volchan(1, 1).unwrap();
    engine.set_volchan(2, 1).unwrap();
    engine.set_volchan(3, 1).unwrap();

    assert!(!engine.players[0].active);
    assert_eq!(engine.players[1].vol_chan, 1);
    assert_eq!(engine.players[2].vol_chan, 1);
}

#[test]
fn clearing_releases_sustained_notes() {
    let mut engine = engine(&[(1, sound(&[0]))]);
    assert!(engine.start_sound(1));
    engine.on_timer();

    assert!(engine.sustain_note(0, 0, 60, 100));
    assert!(engine.active_notes.contains(0, 60));
    engine.clear_player(0);
    assert_eq!(engine.sustain.len(), 0);
    assert!(engine.active_notes.is_empty());
}
