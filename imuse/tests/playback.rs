mod common;

use common::*;
use pretty_assertions::assert_eq;

fn key_on(channel: u8, note: u8, velocity: u8) -> Call {
    Call::KeyOn { channel, note, velocity }
}

fn key_off(channel: u8, note: u8) -> Call {
    Call::KeyOff { channel, note }
}

#[test]
fn plays_notes_until_the_end_of_track() {
    let track = Track::new()
        .note_on(0, 60, 100)
        .wait(10)
        .note_off(0, 60)
        .wait(10)
        .end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));

    run(&mut engine, 1);
    assert_eq!(engine.driver_mut().take(), vec![key_on(0, 60, 100)]);
    assert_eq!(engine.driver().notes(), vec![(0, 60)]);

    run(&mut engine, 9);
    assert_eq!(engine.driver_mut().take(), vec![key_off(0, 60)]);
    assert_eq!(engine.player(1).map(|p| p.position()), Some(10));

    run(&mut engine, 9);
    assert!(engine.driver_mut().take().is_empty());
    assert_eq!(engine.get_sound_status(1), 1);

    run(&mut engine, 1);
    assert_eq!(engine.driver_mut().take(), vec![Call::Off { part: 0 }]);
    assert_eq!(engine.get_sound_status(1), 0);
    assert!(engine.parts().iter().all(|part| part.owner().is_none()));
    assert_eq!(engine.driver().timer_calls, 20);
}

#[test]
fn tempo_events_change_the_tick_rate() {
    let track = Track::new()
        .tempo(250_000)
        .note_on(0, 60, 100)
        .wait(100)
        .note_off(0, 60)
        .wait(100)
        .end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));

    run(&mut engine, 50);
    assert_eq!(engine.player(1).map(|p| p.position()), Some(99));
    assert_eq!(engine.driver_mut().take(), vec![key_on(0, 60, 100)]);

    run(&mut engine, 1);
    assert_eq!(engine.driver_mut().take(), vec![key_off(0, 60)]);
    assert_eq!(engine.player(1).map(|p| p.tempo()), Some(250_000));
}

#[test]
fn broken_data_stops_only_its_own_player() {
    let broken = Track::new()
        .note_on(0, 60, 100)
        .wait(5)
        .raw(&[0xf5, 0, 0])
        .end();
    let healthy = Track::new()
        .note_on(1, 64, 100)
        .wait(10)
        .note_off(1, 64)
        .wait(100)
        .end();
    let mut engine = engine(vec![(1, gm(broken)), (2, gm(healthy))]);
    assert!(engine.start_sound(1));
    assert!(engine.start_sound(2));

    run(&mut engine, 5);
    assert_eq!(engine.get_sound_status(1), 0);
    assert_eq!(engine.get_sound_status(2), 1);
    assert_eq!(
        engine.driver_mut().take(),
        vec![key_on(0, 60, 100), key_on(1, 64, 100), Call::Off { part: 0 }]
    );

    run(&mut engine, 5);
    assert_eq!(engine.driver_mut().take(), vec![key_off(1, 64)]);
}

#[test]
fn loop_repeats_the_requested_number_of_times() {
    let mut engine = engine(vec![(1, gm(idle()))]);
    assert!(engine.start_sound(1));
    // twice from beat 10 back to beat 1
    assert_eq!(cmd(&mut engine, &[0x109, 1, 2, 1, 0, 10, 0]), 0);
    assert_eq!(cmd(&mut engine, &[0x100, 1, 10]), 2);

    let mut beat = engine.player(1).map_or(0, |p| p.beat());
    let mut rewinds = 0;
    for _ in 0..3 * 4320 + 100 {
        engine.on_timer();
        let now = engine.player(1).map_or(0, |p| p.beat());
        if now < beat {
            rewinds += 1;
        }
        beat = now;
    }

    assert_eq!(rewinds, 2);
    assert_eq!(engine.player(1).map(|p| p.position()), Some(4420));
    assert_eq!(cmd(&mut engine, &[0x100, 1, 10]), 0);
}

#[test]
fn loop_end_must_follow_its_start() {
    let mut engine = engine(vec![(1, gm(idle()))]);
    assert!(engine.start_sound(1));
    assert_eq!(cmd(&mut engine, &[0x109, 1, 2, 4, 0, 5, 0]), -1);
    assert_eq!(cmd(&mut engine, &[0x109, 1, 2, 3, 0, 4, 100]), -1);
    assert_eq!(cmd(&mut engine, &[0x100, 1, 10]), 0);

    // the loop has to span at least one whole beat
    assert_eq!(cmd(&mut engine, &[0x109, 1, 2, 3, 0, 5, 0]), 0);
    assert_eq!(cmd(&mut engine, &[0x100, 1, 10]), 2);
}

#[test]
fn jumping_to_the_current_position_does_nothing() {
    let track = Track::new()
        .note_on(0, 60, 100)
        .wait(100)
        .note_off(0, 60)
        .wait(100)
        .end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));
    run(&mut engine, 5);
    engine.driver_mut().take();

    assert_eq!(cmd(&mut engine, &[0x107, 1, 0, 1, 5]), 0);
    assert!(engine.driver_mut().take().is_empty());
    assert_eq!(engine.player(1).map(|p| p.position()), Some(5));
    assert_eq!(engine.sustaining_notes(), 0);
}

#[test]
fn jump_sustains_notes_until_their_release() {
    let first = Track::new()
        .note_on(0, 60, 100)
        .wait(60)
        .note_off(0, 60)
        .wait(140)
        .end();
    let second = Track::new().controller(0, 7, 90).wait(1000).end();
    let mut engine = engine(vec![(1, sound(b"GMD ", &[first, second]))]);
    assert!(engine.start_sound(1));

    run(&mut engine, 10);
    assert_eq!(engine.driver_mut().take(), vec![key_on(0, 60, 100)]);

    assert_eq!(cmd(&mut engine, &[0x107, 1, 1, 1, 0]), 0);
    assert!(engine.driver_mut().take().is_empty());
    assert_eq!(engine.sustaining_notes(), 1);
    assert!(engine.active_notes().contains(0, 60));
    let player = engine.player(1).unwrap();
    assert_eq!((player.track(), player.position()), (1, 0));

    // the old position would have released it 50 ticks later
    run(&mut engine, 49);
    assert!(engine.driver_mut().take().is_empty());
    assert_eq!(engine.driver().notes(), vec![(0, 60)]);

    run(&mut engine, 1);
    assert_eq!(engine.driver_mut().take(), vec![key_off(0, 60)]);
    assert_eq!(engine.sustaining_notes(), 0);
    assert!(engine.active_notes().is_empty());
}

#[test]
fn jump_starts_notes_held_at_the_target() {
    let track = Track::new()
        .note_on(0, 60, 100)
        .wait(100)
        .note_on(0, 64, 100)
        .wait(100)
        .note_off(0, 64)
        .wait(100)
        .note_off(0, 60)
        .wait(100)
        .end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));
    run(&mut engine, 10);
    engine.driver_mut().take();

    assert_eq!(cmd(&mut engine, &[0x107, 1, 0, 1, 150]), 0);
    assert_eq!(engine.driver_mut().take(), vec![key_on(0, 64, 80)]);
    assert_eq!(engine.driver().notes(), vec![(0, 60), (0, 64)]);
    assert_eq!(engine.sustaining_notes(), 0);

    run(&mut engine, 50);
    assert_eq!(engine.driver_mut().take(), vec![key_off(0, 64)]);
}

#[test]
fn jump_past_the_end_is_refused() {
    let track = Track::new().note_on(0, 60, 100).wait(100).end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));
    run(&mut engine, 1);

    assert_eq!(cmd(&mut engine, &[0x107, 1, 0, 2, 0]), -1);
    assert_eq!(cmd(&mut engine, &[0x107, 1, 3, 1, 0]), -1);
    assert_eq!(engine.player(1).map(|p| p.position()), Some(1));
}

#[test]
fn scan_replays_silently_and_starts_held_notes() {
    let track = Track::new()
        .program(0, 5)
        .note_on(0, 60, 100)
        .wait(100)
        .note_on(0, 64, 100)
        .wait(100)
        .note_off(0, 60)
        .wait(200)
        .note_off(0, 64)
        .wait(100)
        .end();
    let mut engine = engine(vec![(1, gm(track))]);
    assert!(engine.start_sound(1));

    assert_eq!(cmd(&mut engine, &[0x108, 1, 0, 1, 250]), 0);
    assert_eq!(engine.driver_mut().take(), vec![key_on(0, 64, 80)]);
    assert_eq!(engine.player(1).map(|p| p.position()), Some(250));
    let part = engine.parts().iter().find(|part| part.owner() == Some(0));
    assert_eq!(part.map(|part| part.program()), Some(5));

    run(&mut engine, 149);
    assert!(engine.driver_mut().take().is_empty());
    run(&mut engine, 1);
    assert_eq!(engine.driver_mut().take(), vec![key_off(0, 64)]);
}

#[test]
fn hooked_jump_fires_only_when_armed() {
    let track = || {
        Track::new()
            .controller(0, 7, 100)
            .wait(10)
            .hook_jump(5, 0, 1, 100)
            .wait(40)
            .note_on(0, 60, 100)
            .wait(30)
            .note_off(0, 60)
            .wait(20)
            .note_on(0, 62, 100)
            .wait(50)
            .note_off(0, 62)
            .wait(50)
            .end()
    };

    let mut unarmed = engine(vec![(1, gm(track()))]);
    assert!(unarmed.start_sound(1));
    run(&mut unarmed, 50);
    assert_eq!(unarmed.driver_mut().take(), vec![key_on(0, 60, 100)]);

    let mut armed = engine(vec![(1, gm(track()))]);
    assert!(armed.start_sound(1));
    assert_eq!(cmd(&mut armed, &[0x10c, 1, 0, 5]), 0);
    assert_eq!(cmd(&mut armed, &[0x100, 1, 18]), 5);

    run(&mut armed, 10);
    assert_eq!(armed.player(1).map(|p| p.position()), Some(100));
    assert_eq!(cmd(&mut armed, &[0x100, 1, 18]), 0);

    run(&mut armed, 1);
    assert_eq!(armed.driver_mut().take(), vec![key_on(0, 62, 100)]);
}

#[test]
fn marker_releases_queued_commands() {
    let track = Track::new()
        .controller(0, 7, 100)
        .wait(10)
        .marker(7)
        .wait(1000)
        .end();
    let mut engine = engine(vec![(1, gm(track)), (2, gm(idle()))]);
    assert!(engine.start_sound(1));

    assert_eq!(cmd(&mut engine, &[0x10e, 1, 7]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, 8, 2]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, -1]), 0);
    assert_eq!(cmd(&mut engine, &[0x117, 0]), 1);
    assert_eq!(cmd(&mut engine, &[0x117, 1]), 1);
    assert_eq!(cmd(&mut engine, &[0x117, 2]), 7);
    assert_eq!(engine.get_sound_status(2), 2);

    run(&mut engine, 9);
    assert_eq!(engine.get_sound_status(2), 2);
    run(&mut engine, 1);
    assert_eq!(engine.get_sound_status(2), 1);
    assert_eq!(cmd(&mut engine, &[0x117, 0]), 0);
    assert_eq!(cmd(&mut engine, &[0x117, 1]), -1);
}

#[test]
fn clearing_the_queue_from_a_drain_stops_it() {
    let track = Track::new()
        .controller(0, 7, 100)
        .wait(10)
        .marker(3)
        .wait(1000)
        .end();
    let mut engine = engine(vec![(1, gm(track)), (2, gm(idle()))]);
    assert!(engine.start_sound(1));

    assert_eq!(cmd(&mut engine, &[0x10e, 1, 3]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, 0x110]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, 8, 2]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, -1]), 0);

    run(&mut engine, 10);
    assert_eq!(engine.get_sound_status(2), 0);
    assert_eq!(cmd(&mut engine, &[0x117, 0]), 0);
    assert_eq!(cmd(&mut engine, &[0x117, 1]), -1);
}

#[test]
fn other_markers_leave_the_queue_alone() {
    let track = Track::new()
        .controller(0, 7, 100)
        .wait(10)
        .marker(2)
        .wait(1000)
        .end();
    let mut engine = engine(vec![(1, gm(track)), (2, gm(idle()))]);
    assert!(engine.start_sound(1));

    assert_eq!(cmd(&mut engine, &[0x10e, 1, 3]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, 8, 2]), 0);
    assert_eq!(cmd(&mut engine, &[0x10f, -1]), 0);

    run(&mut engine, 20);
    assert_eq!(engine.get_sound_status(2), 2);
    assert_eq!(cmd(&mut engine, &[0x117, 0]), 1);
}

#[test]
fn music_timer_follows_the_furthest_player() {
    let mut engine = engine(vec![(1, gm(idle())), (2, gm(idle()))]);
    assert_eq!(engine.music_timer(), 0);

    assert!(engine.start_sound(1));
    run(&mut engine, 239);
    assert_eq!(engine.music_timer(), 0);
    run(&mut engine, 1);
    assert_eq!(engine.music_timer(), 1);
    run(&mut engine, 240);
    assert_eq!(engine.music_timer(), 2);

    assert!(engine.start_sound(2));
    run(&mut engine, 240);
    assert_eq!(engine.music_timer(), 3);

    assert_eq!(engine.stop_sound(1), 0);
    assert_eq!(engine.music_timer(), 1);
    assert_eq!(engine.stop_sound(2), 0);
    assert_eq!(engine.music_timer(), 0);
}
