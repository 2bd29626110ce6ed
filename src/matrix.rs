//! Geometry of the reference panel and the frame type that lives on it.
//!
//! The panel is an 8×7 active region followed, on the same strip, by an 8-LED status row:
//!
//! ```text
//!   strip 0..56   active region, serpentine (see MatrixLayout)
//!   strip 56..64  status row, driven from a fixed palette
//! ```
//!
//! A [`Frame`] only ever holds the 56 active pixels. [`Frame::to_strip`] expands it into
//! a full [`StripBuffer`] in physical wiring order.
pub mod layout;

use core::ops::Deref;

use smart_leds::RGB8;

pub use layout::MatrixLayout;

/// Columns in the active region.
pub const MATRIX_WIDTH: usize = 8;
/// Rows in the active region.
pub const MATRIX_HEIGHT: usize = 7;
/// Logical pixels per frame.
pub const FRAME_PIXELS: usize = MATRIX_WIDTH * MATRIX_HEIGHT;
/// LEDs in the status row that follows the active region on the strip.
pub const STATUS_ROW_LEDS: usize = 8;
/// Physical LEDs on the strip.
pub const STRIP_LEDS: usize = FRAME_PIXELS + STATUS_ROW_LEDS;

/// Token counts accepted per uploaded frame: active region only, or the whole strip.
pub const SUPPORTED_PIXEL_COUNTS: [usize; 2] = [FRAME_PIXELS, STRIP_LEDS];

/// Wiring of the reference panel.
pub const MATRIX_LAYOUT: MatrixLayout<FRAME_PIXELS, MATRIX_WIDTH, MATRIX_HEIGHT> =
    MatrixLayout::serpentine_even_rows_right_to_left();

/// Off.
pub const BLACK: RGB8 = RGB8::new(0, 0, 0);

/// Colors for every LED of the strip, in wiring order.
pub type StripBuffer = [RGB8; STRIP_LEDS];

/// One image for the active region, in logical row-major order (`y * MATRIX_WIDTH + x`).
///
/// Frames are built once by the validator and never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame([RGB8; FRAME_PIXELS]);

impl Frame {
    /// Create a frame from row-major pixels.
    #[must_use]
    pub const fn new(pixels: [RGB8; FRAME_PIXELS]) -> Self {
        Self(pixels)
    }

    /// A frame with every pixel set to `color`.
    #[must_use]
    pub const fn filled(color: RGB8) -> Self {
        Self([color; FRAME_PIXELS])
    }

    /// Color of the pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the active region.
    #[must_use]
    pub const fn pixel(&self, x: usize, y: usize) -> RGB8 {
        assert!(x < MATRIX_WIDTH && y < MATRIX_HEIGHT, "(x, y) out of bounds");
        self.0[y * MATRIX_WIDTH + x]
    }

    /// Lay this frame out on the strip through `layout`, then fill the status row.
    #[must_use]
    pub fn to_strip(
        &self,
        layout: &MatrixLayout<FRAME_PIXELS, MATRIX_WIDTH, MATRIX_HEIGHT>,
        status_row: &StatusRow,
    ) -> StripBuffer {
        let mut strip = [BLACK; STRIP_LEDS];
        for y in 0..MATRIX_HEIGHT {
            for x in 0..MATRIX_WIDTH {
                strip[layout.map(x, y)] = self.pixel(x, y);
            }
        }
        strip[FRAME_PIXELS..].copy_from_slice(&status_row.colors());
        strip
    }
}

impl Deref for Frame {
    type Target = [RGB8; FRAME_PIXELS];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::filled(BLACK)
    }
}

/// What the 8 LEDs after the active region show.
///
/// The row never carries animation data; it is re-written with every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusRow {
    /// All status LEDs dark.
    Off,
    /// A fixed color per LED, in strip order.
    Palette([RGB8; STATUS_ROW_LEDS]),
}

impl StatusRow {
    /// Battery-gauge palette: two green, two yellow, two orange, two red.
    pub const BATTERY: Self = Self::Palette([
        RGB8::new(0, 255, 0),
        RGB8::new(0, 255, 0),
        RGB8::new(255, 255, 0),
        RGB8::new(255, 255, 0),
        RGB8::new(255, 80, 0),
        RGB8::new(255, 80, 0),
        RGB8::new(255, 0, 0),
        RGB8::new(255, 0, 0),
    ]);

    /// Colors for the status LEDs.
    #[must_use]
    pub const fn colors(&self) -> [RGB8; STATUS_ROW_LEDS] {
        match self {
            Self::Off => [BLACK; STATUS_ROW_LEDS],
            Self::Palette(colors) => *colors,
        }
    }
}

impl Default for StatusRow {
    fn default() -> Self {
        Self::BATTERY
    }
}
