#![allow(missing_docs)]
//! Request handling against a real store and an in-memory storage backend.

use core::pin::pin;
use core::task::{Context, Poll, Waker};

use embassy_futures::{block_on, yield_now};
use matrix_player::animation::{Animation, ValidationError};
use matrix_player::control::{Controller, MAX_UPLOAD_BYTES, Reply, Route};
use matrix_player::frame_store::{FrameStore, StoreStatus};
use matrix_player::matrix::Frame;
use matrix_player::storage::{AnimationStorage, PersistenceError};

/// Remembers the last save; can be told to fail or to take a while.
#[derive(Default)]
struct MemoryStorage {
    saved: Option<Vec<u8>>,
    saves: usize,
    fail_save: bool,
    fail_load: Option<PersistenceError>,
    save_steps: usize,
}

impl AnimationStorage for MemoryStorage {
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, PersistenceError> {
        if let Some(err) = self.fail_load {
            return Err(err);
        }
        let Some(saved) = &self.saved else {
            return Ok(None);
        };
        buffer[..saved.len()].copy_from_slice(saved);
        Ok(Some(saved.len()))
    }

    async fn save(&mut self, raw: &[u8]) -> Result<(), PersistenceError> {
        self.saves += 1;
        for _ in 0..self.save_steps {
            yield_now().await;
        }
        if self.fail_save {
            return Err(PersistenceError::Io);
        }
        self.saved = Some(raw.to_vec());
        Ok(())
    }
}

fn upload_json(frames: usize, token: &str) -> Vec<u8> {
    let frame = format!("[{}]", vec![format!("\"{token}\""); 56].join(","));
    format!("[{}]", vec![frame; frames].join(",")).into_bytes()
}

fn handle(controller: &mut Controller<'_, MemoryStorage>, route: Route) -> Reply {
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];
    block_on(controller.handle(route, &mut buffer, 0))
}

fn upload(controller: &mut Controller<'_, MemoryStorage>, body: &[u8]) -> Reply {
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];
    buffer[..body.len()].copy_from_slice(body);
    block_on(controller.handle(Route::Upload, &mut buffer, body.len()))
}

#[test]
fn valid_upload_installs_saves_and_plays() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    let body = upload_json(3, "#FF0000");

    let reply = upload(&mut controller, &body);

    assert_eq!(reply, Reply::Uploaded { frames: 3 });
    assert_eq!(reply.status(), 200);
    assert_eq!(reply.body().expect("fits").as_str(), "Uploaded and playing (3 frames)");
    assert_eq!(store.frame_count(), 3);
    assert!(store.is_playing());
    assert_eq!(controller.storage().saved.as_deref(), Some(body.as_slice()));
}

#[test]
fn invalid_upload_changes_nothing() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    upload(&mut controller, &upload_json(2, "#00FF00"));
    store.set_playing(false);
    let saved_before = controller.storage().saved.clone();

    let reply = upload(&mut controller, &upload_json(2, "#00GG00"));

    assert_eq!(
        reply,
        Reply::Rejected(ValidationError::InvalidColorFormat { frame: 0, pixel: 0 })
    );
    assert_eq!(reply.status(), 400);
    assert_eq!(
        reply.body().expect("fits").as_str(),
        "Bad color string at frame 0, pixel 0 (expected #RRGGBB or RRGGBB)"
    );
    assert_eq!(store.frame_count(), 2);
    assert!(!store.is_playing());
    assert_eq!(controller.storage().saved, saved_before);
    assert_eq!(controller.storage().saves, 1);
}

#[test]
fn empty_upload_is_rejected() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());

    let reply = upload(&mut controller, b"");

    assert_eq!(reply, Reply::EmptyBody);
    assert_eq!(reply.status(), 400);
    assert_eq!(controller.storage().saves, 0);
}

#[test]
fn empty_frame_list_is_rejected() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());

    let reply = upload(&mut controller, b"[]");

    assert_eq!(reply, Reply::Rejected(ValidationError::EmptySequence));
    assert_eq!(reply.body().expect("fits").as_str(), "No frames in upload");
}

#[test]
fn failed_save_still_installs() {
    let store = FrameStore::new();
    let storage = MemoryStorage {
        fail_save: true,
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);

    let reply = upload(&mut controller, &upload_json(4, "123456"));

    assert_eq!(reply, Reply::Uploaded { frames: 4 });
    assert_eq!(store.frame_count(), 4);
    assert_eq!(controller.storage().saves, 1);
}

#[test]
fn upload_is_playing_while_the_save_is_still_running() {
    let store = FrameStore::new();
    let storage = MemoryStorage {
        save_steps: 3,
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);
    let body = upload_json(2, "#FF00FF");
    let mut context = Context::from_waker(Waker::noop());

    let mut pending = 0;
    let reply = {
        let mut request = pin!(controller.upload(&body));
        loop {
            match request.as_mut().poll(&mut context) {
                Poll::Ready(reply) => break reply,
                Poll::Pending => {
                    pending += 1;
                    assert_eq!(store.frame_count(), 2);
                    assert!(store.is_playing());
                }
            }
        }
    };

    assert_eq!(pending, 3);
    assert_eq!(reply, Reply::Uploaded { frames: 2 });
    assert_eq!(controller.storage().saved.as_deref(), Some(body.as_slice()));
}

#[test]
fn body_length_past_the_buffer_is_too_large() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    let mut buffer = [0u8; 16];

    let reply = block_on(controller.handle(Route::Upload, &mut buffer, 17));

    assert_eq!(reply, Reply::PayloadTooLarge);
    assert_eq!(reply.status(), 413);
}

#[test]
fn play_and_stop_toggle_the_flag() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    upload(&mut controller, &upload_json(2, "#0000FF"));

    assert_eq!(handle(&mut controller, Route::Stop), Reply::Stopped);
    assert!(!store.is_playing());
    assert_eq!(store.frame_count(), 2);

    assert_eq!(handle(&mut controller, Route::Play), Reply::Playing);
    assert!(store.is_playing());
}

#[test]
fn play_with_nothing_loaded_succeeds() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());

    let reply = handle(&mut controller, Route::Play);

    assert_eq!(reply, Reply::Playing);
    assert_eq!(reply.body().expect("fits").as_str(), "Playing");
    assert_eq!(store.frame_count(), 0);
}

#[test]
fn info_reports_json_status() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    upload(&mut controller, &upload_json(5, "#FFFFFF"));
    handle(&mut controller, Route::Stop);

    let reply = handle(&mut controller, Route::Info);

    assert_eq!(
        reply,
        Reply::Info(StoreStatus {
            frames: 5,
            playing: false
        })
    );
    assert_eq!(reply.content_type(), "application/json");
    assert_eq!(
        reply.body().expect("fits").as_str(),
        r#"{"frames":5,"playing":false}"#
    );
}

#[test]
fn brightness_route_updates_store() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());

    let reply = handle(&mut controller, Route::SetBrightness(128));

    assert_eq!(reply, Reply::Brightness(128));
    assert_eq!(store.brightness(), 128);
}

#[test]
fn reload_restores_the_saved_upload() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    upload(&mut controller, &upload_json(3, "#FF0000"));
    upload(&mut controller, &upload_json(1, "#00FF00"));
    // Something else got installed since; reload brings back the last upload.
    store.install(Animation::from_frames(&[Frame::default(); 7]).expect("seven frames"));

    let reply = handle(&mut controller, Route::ReloadLast);

    assert_eq!(reply, Reply::Reloaded { frames: 1 });
    assert_eq!(store.frame_count(), 1);
}

#[test]
fn reload_with_nothing_saved_is_not_found() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());

    let reply = handle(&mut controller, Route::ReloadLast);

    assert_eq!(reply, Reply::NothingSaved);
    assert_eq!(reply.status(), 404);
    assert_eq!(store.frame_count(), 0);
}

#[test]
fn reload_with_damaged_record_is_server_error() {
    let store = FrameStore::new();
    let storage = MemoryStorage {
        fail_load: Some(PersistenceError::Corrupted),
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);

    let reply = handle(&mut controller, Route::ReloadLast);

    assert_eq!(reply, Reply::StorageFailed(PersistenceError::Corrupted));
    assert_eq!(reply.status(), 500);
}

#[test]
fn reload_is_lenient() {
    let store = FrameStore::new();
    let mut partly_bad = b"[\"junk\",".to_vec();
    partly_bad.extend_from_slice(&upload_json(2, "#FF0000")[1..]);
    let storage = MemoryStorage {
        saved: Some(partly_bad),
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);

    assert_eq!(
        handle(&mut controller, Route::ReloadLast),
        Reply::Reloaded { frames: 2 }
    );
}

#[test]
fn restore_prefers_the_saved_upload() {
    let store = FrameStore::new();
    let storage = MemoryStorage {
        saved: Some(upload_json(6, "#FF0000")),
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];

    let frames = controller.restore(&mut buffer, &upload_json(2, "#00FF00"));

    assert_eq!(frames, Some(6));
    assert!(store.is_playing());
}

#[test]
fn restore_falls_back_to_bundled_default() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];

    let frames = controller.restore(&mut buffer, include_bytes!("../data/default.json"));

    assert_eq!(frames, Some(8));
    assert!(store.is_playing());
}

#[test]
fn restore_falls_back_when_saved_data_is_unusable() {
    let store = FrameStore::new();
    let storage = MemoryStorage {
        saved: Some(b"this is not json".to_vec()),
        ..MemoryStorage::default()
    };
    let mut controller = Controller::new(&store, storage);
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];

    assert_eq!(
        controller.restore(&mut buffer, &upload_json(2, "#00FF00")),
        Some(2)
    );
}

#[test]
fn restore_with_nothing_usable_leaves_store_idle() {
    let store = FrameStore::new();
    let mut controller = Controller::new(&store, MemoryStorage::default());
    let mut buffer = vec![0u8; MAX_UPLOAD_BYTES];

    assert_eq!(controller.restore(&mut buffer, b"[]"), None);
    assert_eq!(store.frame_count(), 0);
    assert!(!store.is_playing());
}
