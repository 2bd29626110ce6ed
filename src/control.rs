//! What the web interface can ask for, and what it gets back.
//!
//! [`Route`] is a parsed request and [`Reply`] the answer; [`Controller`] turns one into
//! the other by driving the [`FrameStore`] and the [`AnimationStorage`]. The wire format
//! lives in [`http`].
pub mod http;

use core::fmt::{self, Write};

use heapless::String;

use crate::animation::{ValidationError, ValidationMode, validate};
use crate::frame_store::{FrameStore, StoreStatus};
use crate::storage::{AnimationStorage, PersistenceError};

/// Largest upload body accepted (also the size of the receive buffer).
pub const MAX_UPLOAD_BYTES: usize = 80 * 1024;

/// Capacity of a rendered reply body.
pub const REPLY_BODY_CAPACITY: usize = 384;

/// A request the controller understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// `POST /upload`: strict-validate the body, install it, save it.
    Upload,
    /// `GET /play`
    Play,
    /// `GET /stop`
    Stop,
    /// `GET /info`
    Info,
    /// `GET /loadLastAni`: re-install the saved animation.
    ReloadLast,
    /// `GET /setBrightness?value=N`
    SetBrightness(u8),
    /// `GET /`
    Index,
}

/// The answer to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Upload installed.
    Uploaded {
        /// Frames installed.
        frames: usize,
    },
    /// Playback enabled.
    Playing,
    /// Playback paused.
    Stopped,
    /// Status report.
    Info(StoreStatus),
    /// Saved animation re-installed.
    Reloaded {
        /// Frames installed.
        frames: usize,
    },
    /// Brightness changed.
    Brightness(u8),
    /// Landing text.
    Index,
    /// Frame data did not validate.
    Rejected(ValidationError),
    /// Upload with no body.
    EmptyBody,
    /// Reload asked for, but nothing is saved.
    NothingSaved,
    /// Reload asked for, but the saved record could not be read.
    StorageFailed(PersistenceError),
    /// Unknown path.
    NotFound,
    /// Known path, wrong method.
    MethodNotAllowed,
    /// The request itself was unusable.
    BadRequest(&'static str),
    /// Body longer than [`MAX_UPLOAD_BYTES`].
    PayloadTooLarge,
}

const INDEX_TEXT: &str = "LED matrix player\n\
POST /upload            JSON array of frames, 56 or 64 \"#RRGGBB\" strings each\n\
GET  /play | /stop      start or pause playback\n\
GET  /info              {\"frames\":N,\"playing\":bool}\n\
GET  /loadLastAni       reload the last saved upload\n\
GET  /setBrightness?value=0-255\n";

impl Reply {
    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Uploaded { .. }
            | Self::Playing
            | Self::Stopped
            | Self::Info(_)
            | Self::Reloaded { .. }
            | Self::Brightness(_)
            | Self::Index => 200,
            Self::Rejected(_) | Self::EmptyBody | Self::BadRequest(_) => 400,
            Self::NothingSaved | Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
            Self::StorageFailed(_) => 500,
        }
    }

    /// Whether the request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status() == 200
    }

    /// MIME type of [`write_body`](Self::write_body)'s output.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Info(_) => "application/json",
            _ => "text/plain",
        }
    }

    /// Write the body text.
    ///
    /// # Errors
    ///
    /// Returns [`fmt::Error`] if `out` runs out of room.
    pub fn write_body(&self, out: &mut impl Write) -> fmt::Result {
        match self {
            Self::Uploaded { frames } => write!(out, "Uploaded and playing ({frames} frames)"),
            Self::Playing => out.write_str("Playing"),
            Self::Stopped => out.write_str("Stopped"),
            Self::Info(status) => {
                let json = serde_json_core::to_string::<_, 64>(status).map_err(|_| fmt::Error)?;
                out.write_str(&json)
            }
            Self::Reloaded { frames } => write!(out, "Loaded {frames} frames"),
            Self::Brightness(level) => write!(out, "Brightness {level}"),
            Self::Index => out.write_str(INDEX_TEXT),
            Self::Rejected(err) => write!(out, "{err}"),
            Self::EmptyBody => out.write_str("Empty body"),
            Self::NothingSaved => out.write_str("No saved animation"),
            Self::StorageFailed(err) => write!(out, "Saved animation unreadable: {err}"),
            Self::NotFound => out.write_str("Not found"),
            Self::MethodNotAllowed => out.write_str("Method not allowed - use POST"),
            Self::BadRequest(reason) => out.write_str(reason),
            Self::PayloadTooLarge => {
                write!(out, "Upload too large (at most {MAX_UPLOAD_BYTES} bytes)")
            }
        }
    }

    /// The body as an owned string.
    ///
    /// # Errors
    ///
    /// Returns [`fmt::Error`] if the body exceeds [`REPLY_BODY_CAPACITY`].
    pub fn body(&self) -> Result<String<REPLY_BODY_CAPACITY>, fmt::Error> {
        let mut body = String::new();
        self.write_body(&mut body)?;
        Ok(body)
    }
}

/// Applies [`Route`]s to a [`FrameStore`] and an [`AnimationStorage`].
///
/// Handlers never wait on playback; every operation is a short critical section on the
/// store plus, for uploads and reloads, one storage call.
pub struct Controller<'a, S> {
    store: &'a FrameStore,
    storage: S,
}

impl<'a, S: AnimationStorage> Controller<'a, S> {
    /// Control `store`, persisting uploads to `storage`.
    #[must_use]
    pub const fn new(store: &'a FrameStore, storage: S) -> Self {
        Self { store, storage }
    }

    /// The storage, for inspection.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Carry out `route`.
    ///
    /// For [`Route::Upload`] the body is `buffer[..body_len]`. [`Route::ReloadLast`] uses
    /// all of `buffer` as scratch space.
    pub async fn handle(&mut self, route: Route, buffer: &mut [u8], body_len: usize) -> Reply {
        match route {
            Route::Upload => match buffer.get(..body_len) {
                Some(body) => self.upload(body).await,
                None => Reply::PayloadTooLarge,
            },
            Route::Play => {
                self.store.set_playing(true);
                Reply::Playing
            }
            Route::Stop => {
                self.store.set_playing(false);
                Reply::Stopped
            }
            Route::Info => Reply::Info(self.store.status()),
            Route::ReloadLast => self.reload_last(buffer),
            Route::SetBrightness(level) => {
                self.store.set_brightness(level);
                Reply::Brightness(level)
            }
            Route::Index => Reply::Index,
        }
    }

    /// Strict-validate `raw`, install it, then save it.
    ///
    /// Playback picks up the new animation before the save starts and keeps running while
    /// it is written. A failed save is logged and does not change the reply.
    pub async fn upload(&mut self, raw: &[u8]) -> Reply {
        if raw.is_empty() {
            return Reply::EmptyBody;
        }
        let animation = match validate(raw, ValidationMode::Strict) {
            Ok(animation) => animation,
            Err(err) => {
                warn!("Upload rejected: {}", err);
                return Reply::Rejected(err);
            }
        };
        let frames = self.store.install(animation);
        match self.storage.save(raw).await {
            Ok(()) => info!("Upload saved ({} bytes)", raw.len()),
            Err(err) => warn!("Upload not saved: {}", err),
        }
        Reply::Uploaded { frames }
    }

    /// Re-install whatever was saved last, leniently.
    pub fn reload_last(&mut self, buffer: &mut [u8]) -> Reply {
        let len = match self.storage.load(buffer) {
            Ok(Some(len)) => len,
            Ok(None) => return Reply::NothingSaved,
            Err(err) => {
                warn!("Reload failed: {}", err);
                return Reply::StorageFailed(err);
            }
        };
        match validate(&buffer[..len], ValidationMode::Lenient) {
            Ok(animation) => Reply::Reloaded {
                frames: self.store.install(animation),
            },
            Err(err) => {
                warn!("Saved animation unusable: {}", err);
                Reply::Rejected(err)
            }
        }
    }

    /// Startup: install the saved animation, or else `bundled_default`, both leniently.
    ///
    /// Returns the frames installed, or `None` (store left empty and idle) when neither
    /// source is usable.
    pub fn restore(&mut self, buffer: &mut [u8], bundled_default: &[u8]) -> Option<usize> {
        match self.reload_last(buffer) {
            Reply::Reloaded { frames } => {
                info!("Restored saved animation ({} frames)", frames);
                return Some(frames);
            }
            Reply::NothingSaved => info!("No saved animation; using bundled default"),
            _ => warn!("Saved animation unusable; using bundled default"),
        }
        match validate(bundled_default, ValidationMode::Lenient) {
            Ok(animation) => Some(self.store.install(animation)),
            Err(err) => {
                error!("Bundled default unusable: {}", err);
                None
            }
        }
    }
}
