#![allow(missing_docs)]
//! The playback engine, stepped by hand against recording sinks.

use embassy_futures::block_on;
use embassy_time::Duration;
use matrix_player::animation::Animation;
use matrix_player::frame_store::FrameStore;
use matrix_player::matrix::{
    BLACK, FRAME_PIXELS, Frame, MATRIX_LAYOUT, MatrixLayout, StatusRow, StripBuffer,
};
use matrix_player::player::{
    FRAME_INTERVAL, IDLE_INTERVAL, PixelSink, PlaybackConfig, PlaybackEngine, PlaybackState,
};
use matrix_player::to_png::PreviewRecorder;
use matrix_player::{Error, Result};
use smart_leds::RGB8;

fn shade(level: u8) -> Frame {
    Frame::filled(RGB8::new(level, 0, 0))
}

fn animation(levels: &[u8]) -> Animation {
    let frames: Vec<Frame> = levels.iter().copied().map(shade).collect();
    Animation::from_frames(&frames).expect("test animations are non-empty")
}

/// Full brightness so recorded colors equal frame colors.
fn full_brightness_store() -> FrameStore {
    let store = FrameStore::new();
    store.set_brightness(255);
    store
}

fn red_at(strip: &StripBuffer) -> u8 {
    strip[0].r
}

#[test]
fn idle_when_nothing_is_loaded() {
    let store = full_brightness_store();
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    let step = block_on(engine.render_next());

    assert_eq!(step.state, PlaybackState::Idle);
    assert_eq!(step.wait, IDLE_INTERVAL);
    assert!(recorder.strips().is_empty());
}

#[test]
fn plays_frames_in_order_and_loops() {
    let store = full_brightness_store();
    store.install(animation(&[10, 20, 30]));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    for expected in 0..7 {
        let step = block_on(engine.render_next());
        assert_eq!(
            step.state,
            PlaybackState::Playing {
                frame_index: expected % 3,
                frame_count: 3
            }
        );
        assert_eq!(step.wait, FRAME_INTERVAL);
    }

    let shown: Vec<u8> = recorder.strips().iter().map(red_at).collect();
    assert_eq!(shown, [10, 20, 30, 10, 20, 30, 10]);
}

#[test]
fn single_frame_repeats() {
    let store = full_brightness_store();
    store.install(animation(&[42]));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    for _ in 0..3 {
        block_on(engine.render_next());
    }

    assert_eq!(recorder.strips().len(), 3);
    assert!(recorder.strips().iter().all(|strip| red_at(strip) == 42));
}

#[test]
fn strips_carry_the_status_row() {
    let store = full_brightness_store();
    store.install(animation(&[1]));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    block_on(engine.render_next());

    let strip = recorder.last().expect("one strip");
    assert_eq!(strip[FRAME_PIXELS..], StatusRow::BATTERY.colors());
}

#[test]
fn status_row_can_be_turned_off() {
    let store = full_brightness_store();
    store.install(animation(&[1]));
    let mut recorder = PreviewRecorder::new();
    let config = PlaybackConfig::new().with_status_row(StatusRow::Off);
    let mut engine = PlaybackEngine::new(&store, &mut recorder, config);

    block_on(engine.render_next());

    let strip = recorder.last().expect("one strip");
    assert!(strip[FRAME_PIXELS..].iter().all(|&color| color == BLACK));
}

#[test]
fn frames_go_through_the_layout() {
    let store = full_brightness_store();
    let mut pixels = [BLACK; FRAME_PIXELS];
    pixels[0] = RGB8::new(255, 255, 255); // (0, 0)
    store.install(Animation::from_frames(&[Frame::new(pixels)]).expect("one frame"));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    block_on(engine.render_next());

    let strip = recorder.last().expect("one strip");
    assert_eq!(strip[MATRIX_LAYOUT.map(0, 0)], RGB8::new(255, 255, 255));
    assert_eq!(strip[7], RGB8::new(255, 255, 255));
    assert_eq!(strip[0], BLACK);
}

#[test]
fn custom_layout_is_honored() {
    const LEFT_TO_RIGHT: MatrixLayout<56, 8, 7> =
        MatrixLayout::serpentine_even_rows_left_to_right();
    let store = full_brightness_store();
    let mut pixels = [BLACK; FRAME_PIXELS];
    pixels[0] = RGB8::new(255, 255, 255);
    store.install(Animation::from_frames(&[Frame::new(pixels)]).expect("one frame"));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::with_layout(
        &store,
        &mut recorder,
        LEFT_TO_RIGHT,
        PlaybackConfig::new(),
    );

    block_on(engine.render_next());

    assert_eq!(recorder.strips()[0][0], RGB8::new(255, 255, 255));
}

#[test]
fn brightness_scales_output() {
    let store = FrameStore::new();
    store.install(Animation::from_frames(&[Frame::filled(RGB8::new(255, 128, 0))]).expect("one"));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    store.set_brightness(0);
    block_on(engine.render_next());
    store.set_brightness(127);
    block_on(engine.render_next());
    store.set_brightness(255);
    block_on(engine.render_next());

    let strips = recorder.strips();
    assert_eq!(strips[0][0], BLACK);
    assert_eq!(strips[1][0], RGB8::new(127, 64, 0));
    assert_eq!(strips[2][0], RGB8::new(255, 128, 0));
}

#[test]
fn stop_goes_idle_and_play_restarts_from_zero() {
    let store = full_brightness_store();
    store.install(animation(&[1, 2, 3]));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    block_on(engine.render_next());
    block_on(engine.render_next());
    store.set_playing(false);
    let step = block_on(engine.render_next());
    assert_eq!(step.state, PlaybackState::Idle);
    assert_eq!(engine.state(), PlaybackState::Idle);

    store.set_playing(true);
    block_on(engine.render_next());

    let shown: Vec<u8> = recorder.strips().iter().map(red_at).collect();
    assert_eq!(shown, [1, 2, 1]);
}

#[test]
fn install_mid_playback_starts_new_animation_at_zero() {
    let store = full_brightness_store();
    store.install(animation(&[1, 2, 3, 4]));
    let mut recorder = PreviewRecorder::new();
    let mut engine = PlaybackEngine::new(&store, &mut recorder, PlaybackConfig::new());

    block_on(engine.render_next());
    block_on(engine.render_next());
    store.install(animation(&[50, 60]));
    block_on(engine.render_next());
    block_on(engine.render_next());
    block_on(engine.render_next());

    let shown: Vec<u8> = recorder.strips().iter().map(red_at).collect();
    assert_eq!(shown, [1, 2, 50, 60, 50]);
}

#[test]
fn custom_intervals_are_reported() {
    let store = full_brightness_store();
    let config = PlaybackConfig::new()
        .with_frame_interval(Duration::from_millis(50))
        .with_idle_interval(Duration::from_millis(5));
    let mut engine = PlaybackEngine::new(&store, PreviewRecorder::new(), config);

    assert_eq!(block_on(engine.render_next()).wait, Duration::from_millis(5));
    store.install(animation(&[1]));
    assert_eq!(block_on(engine.render_next()).wait, Duration::from_millis(50));
    assert_eq!(engine.into_sink().strips().len(), 1);
}

struct FailingSink {
    attempts: usize,
}

impl PixelSink for FailingSink {
    async fn write_strip(&mut self, _strip: &StripBuffer) -> Result<()> {
        self.attempts += 1;
        Err(Error::LedOutput)
    }
}

#[test]
fn sink_failures_do_not_stop_playback() {
    let store = full_brightness_store();
    store.install(animation(&[1, 2]));
    let mut engine = PlaybackEngine::new(
        &store,
        FailingSink { attempts: 0 },
        PlaybackConfig::new(),
    );

    let first = block_on(engine.render_next());
    let second = block_on(engine.render_next());

    assert_eq!(
        first.state,
        PlaybackState::Playing {
            frame_index: 0,
            frame_count: 2
        }
    );
    assert_eq!(
        second.state,
        PlaybackState::Playing {
            frame_index: 1,
            frame_count: 2
        }
    );
    assert_eq!(engine.sink().attempts, 2);
}
