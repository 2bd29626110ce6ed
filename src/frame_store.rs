//! The shared, swappable animation buffer and the flags playback reads.
//!
//! See [`FrameStore`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::animation::Animation;
use crate::matrix::Frame;

/// Output brightness at power-up.
pub const DEFAULT_BRIGHTNESS: u8 = 20;

/// Owns the active [`Animation`] and the playing flag.
///
/// Request handlers write; the playback engine reads one frame at a time. The animation
/// lives behind a critical-section mutex, so an [`install`](Self::install) is never seen
/// half done, and the engine copies a whole [`Frame`] out per step instead of holding a
/// reference into a buffer that might be replaced.
///
/// The store keeps an *epoch* that advances whenever playback must restart from frame 0:
/// on every install and on every stopped → playing transition.
///
/// ```rust
/// use matrix_player::animation::Animation;
/// use matrix_player::frame_store::FrameStore;
/// use matrix_player::matrix::{Frame, BLACK};
///
/// static FRAME_STORE: FrameStore = FrameStore::new();
///
/// assert_eq!(FRAME_STORE.frame_count(), 0);
/// let animation = Animation::from_frames(&[Frame::filled(BLACK); 3])?;
/// assert_eq!(FRAME_STORE.install(animation), 3);
/// assert!(FRAME_STORE.is_playing());
/// # Ok::<(), matrix_player::animation::ValidationError>(())
/// ```
pub struct FrameStore {
    animation: Mutex<CriticalSectionRawMutex, RefCell<Option<Animation>>>,
    playing: AtomicBool,
    epoch: AtomicU32,
    brightness: AtomicU8,
}

/// One frame copied out of the store, with the context the engine needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRead {
    /// The frame to show.
    pub frame: Frame,
    /// Its index in the animation it came from.
    pub index: usize,
    /// Length of that animation.
    pub frame_count: usize,
    /// Store epoch at the time of the read.
    pub epoch: u32,
}

impl FrameRead {
    /// Index of the frame after this one, wrapping to 0.
    #[must_use]
    pub const fn next_index(&self) -> usize {
        (self.index + 1) % self.frame_count
    }
}

/// Snapshot for status reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreStatus {
    /// Frames in the active animation (0 when none is loaded).
    pub frames: usize,
    /// Whether playback is enabled.
    pub playing: bool,
}

impl FrameStore {
    /// An empty, stopped store at [`DEFAULT_BRIGHTNESS`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            animation: Mutex::new(RefCell::new(None)),
            playing: AtomicBool::new(false),
            epoch: AtomicU32::new(0),
            brightness: AtomicU8::new(DEFAULT_BRIGHTNESS),
        }
    }

    /// Replace the active animation and start playing it from frame 0.
    ///
    /// Returns the new frame count. The previous animation is dropped after the swap.
    pub fn install(&self, animation: Animation) -> usize {
        let frame_count = animation.len();
        let previous = self.animation.lock(|cell| {
            let previous = cell.replace(Some(animation));
            self.epoch.fetch_add(1, Ordering::AcqRel);
            self.playing.store(true, Ordering::Release);
            previous
        });
        drop(previous);
        info!("FrameStore: installed {} frames", frame_count);
        frame_count
    }

    /// Enable or pause playback without touching the animation.
    ///
    /// Resuming after a stop restarts from frame 0.
    pub fn set_playing(&self, playing: bool) {
        self.animation.lock(|_| {
            let was_playing = self.playing.swap(playing, Ordering::AcqRel);
            if playing && !was_playing {
                self.epoch.fetch_add(1, Ordering::AcqRel);
            }
        });
        debug!("FrameStore: playing = {}", playing);
    }

    /// Whether playback is enabled.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Frames in the active animation, or 0 when none is loaded.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.animation
            .lock(|cell| cell.borrow().as_ref().map_or(0, Animation::len))
    }

    /// Current output brightness (0–255).
    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    /// Set the output brightness applied by the engine from the next frame on.
    pub fn set_brightness(&self, brightness: u8) {
        self.brightness.store(brightness, Ordering::Relaxed);
        debug!("FrameStore: brightness = {}", brightness);
    }

    /// Current epoch. See [`FrameStore`].
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Frame count and playing flag, read together.
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.animation.lock(|cell| StoreStatus {
            frames: cell.borrow().as_ref().map_or(0, Animation::len),
            playing: self.is_playing(),
        })
    }

    /// Copy out the frame at `index`, or `None` when there is no such frame.
    #[must_use]
    pub fn copy_frame(&self, index: usize) -> Option<Frame> {
        self.animation
            .lock(|cell| cell.borrow().as_ref()?.frame(index).copied())
    }

    /// Copy out the frame the engine should show next.
    ///
    /// `cursor` is the engine's next index and `seen_epoch` the epoch of its last read.
    /// If the epoch moved on, or `cursor` is past the end of the current animation,
    /// frame 0 is returned instead. Returns `None` when stopped or empty.
    #[must_use]
    pub fn read_frame(&self, cursor: usize, seen_epoch: u32) -> Option<FrameRead> {
        self.animation.lock(|cell| {
            if !self.is_playing() {
                return None;
            }
            let borrowed = cell.borrow();
            let animation = borrowed.as_ref()?;
            let epoch = self.epoch.load(Ordering::Acquire);
            let frame_count = animation.len();
            let index = if epoch != seen_epoch || cursor >= frame_count {
                0
            } else {
                cursor
            };
            let frame = *animation.frame(index)?;
            Some(FrameRead {
                frame,
                index,
                frame_count,
                epoch,
            })
        })
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}
