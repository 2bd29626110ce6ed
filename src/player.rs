//! The playback engine: renders the [`FrameStore`]'s animation to the strip, forever.
//!
//! See [`PlaybackEngine`].

use embassy_time::{Duration, Timer};
use smart_leds::brightness;

use crate::Result;
use crate::frame_store::FrameStore;
use crate::matrix::{
    BLACK, FRAME_PIXELS, MATRIX_HEIGHT, MATRIX_LAYOUT, MATRIX_WIDTH, MatrixLayout, STRIP_LEDS,
    StatusRow, StripBuffer,
};

/// Wait between frames while playing.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(200);
/// Wait between checks while idle.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Somewhere a full strip of colors can be written.
///
/// Implemented by the WS2812 driver on the device and by recorders in tests.
pub trait PixelSink {
    /// Show `strip`, which is already in physical wiring order and brightness-scaled.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware did not accept the data.
    async fn write_strip(&mut self, strip: &StripBuffer) -> Result<()>;
}

/// Timing and status-row settings for [`PlaybackEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Wait after each rendered frame.
    pub frame_interval: Duration,
    /// Wait between checks when there is nothing to play.
    pub idle_interval: Duration,
    /// What the status LEDs show while playing.
    pub status_row: StatusRow,
}

impl PlaybackConfig {
    /// 200 ms per frame, 100 ms idle polling, battery palette on the status row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame_interval: FRAME_INTERVAL,
            idle_interval: IDLE_INTERVAL,
            status_row: StatusRow::BATTERY,
        }
    }

    /// Use a different inter-frame wait.
    #[must_use]
    pub const fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Use a different idle polling wait.
    #[must_use]
    pub const fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    /// Show something else on the status row.
    #[must_use]
    pub const fn with_status_row(mut self, status_row: StatusRow) -> Self {
        self.status_row = status_row;
        self
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the engine did on its last step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// Nothing loaded, or stopped.
    Idle,
    /// Showed `frame_index` of an animation with `frame_count` frames.
    Playing {
        /// Index of the frame just shown.
        frame_index: usize,
        /// Length of the animation it came from.
        frame_count: usize,
    },
}

/// Outcome of one [`PlaybackEngine::render_next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// State after the step.
    pub state: PlaybackState,
    /// How long to wait before the next step.
    pub wait: Duration,
}

/// Renders frames from a [`FrameStore`] to a [`PixelSink`].
///
/// The engine keeps its own cursor. Each step re-reads the playing flag and copies exactly
/// one frame out of the store, so an install in between steps is picked up at the next
/// frame and never mixes two animations in one frame. The cursor restarts at 0 whenever
/// the store's epoch moves on (new animation, or play after stop).
///
/// Sink failures are logged and playback carries on.
pub struct PlaybackEngine<'a, S> {
    store: &'a FrameStore,
    sink: S,
    layout: MatrixLayout<FRAME_PIXELS, MATRIX_WIDTH, MATRIX_HEIGHT>,
    config: PlaybackConfig,
    cursor: usize,
    seen_epoch: u32,
    state: PlaybackState,
}

impl<'a, S: PixelSink> PlaybackEngine<'a, S> {
    /// An idle engine over `store`, writing to `sink` through the reference panel layout.
    #[must_use]
    pub const fn new(store: &'a FrameStore, sink: S, config: PlaybackConfig) -> Self {
        Self::with_layout(store, sink, MATRIX_LAYOUT, config)
    }

    /// Like [`new`](Self::new) but for a panel wired differently.
    #[must_use]
    pub const fn with_layout(
        store: &'a FrameStore,
        sink: S,
        layout: MatrixLayout<FRAME_PIXELS, MATRIX_WIDTH, MATRIX_HEIGHT>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            store,
            sink,
            layout,
            config,
            cursor: 0,
            seen_epoch: 0,
            state: PlaybackState::Idle,
        }
    }

    /// State after the most recent step.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// The sink, for inspection.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Render the next frame, if playing, and report how long to wait.
    ///
    /// Going idle leaves the last frame on the strip.
    pub async fn render_next(&mut self) -> Step {
        let Some(read) = self.store.read_frame(self.cursor, self.seen_epoch) else {
            if self.state != PlaybackState::Idle {
                debug!("PlaybackEngine: idle");
                self.state = PlaybackState::Idle;
            }
            return Step {
                state: PlaybackState::Idle,
                wait: self.config.idle_interval,
            };
        };

        let strip = read.frame.to_strip(&self.layout, &self.config.status_row);
        trace!(
            "PlaybackEngine: frame {} of {}",
            read.index,
            read.frame_count
        );
        self.write(strip).await;

        self.seen_epoch = read.epoch;
        self.cursor = read.next_index();
        self.state = PlaybackState::Playing {
            frame_index: read.index,
            frame_count: read.frame_count,
        };
        Step {
            state: self.state,
            wait: self.config.frame_interval,
        }
    }

    /// Step forever, sleeping between steps.
    pub async fn run(mut self) -> ! {
        info!("PlaybackEngine: started");
        loop {
            let step = self.render_next().await;
            Timer::after(step.wait).await;
        }
    }

    async fn write(&mut self, strip: StripBuffer) {
        let scaled = scale(&strip, self.store.brightness());
        if let Err(err) = self.sink.write_strip(&scaled).await {
            warn!("PlaybackEngine: LED write failed: {}", err);
        }
    }
}

fn scale(strip: &StripBuffer, level: u8) -> StripBuffer {
    let mut scaled = [BLACK; STRIP_LEDS];
    for (out, color) in scaled
        .iter_mut()
        .zip(brightness(strip.iter().copied(), level))
    {
        *out = color;
    }
    scaled
}

impl<S: PixelSink> PixelSink for &mut S {
    async fn write_strip(&mut self, strip: &StripBuffer) -> Result<()> {
        (**self).write_strip(strip).await
    }
}
