//! Host-only previews: record what the engine writes and render it as (animated) PNG.
//!
//! Strips are drawn as the physical panel looks: the 8×7 active region (un-doing the
//! serpentine wiring) with the status row underneath as an eighth row.

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use png::{BitDepth, ColorType, Encoder};
use smart_leds::RGB8;

use crate::Result as CrateResult;
use crate::matrix::{
    FRAME_PIXELS, MATRIX_HEIGHT, MATRIX_LAYOUT, MATRIX_WIDTH, MatrixLayout, StripBuffer,
};
use crate::player::PixelSink;

/// Rows in a preview: the active region plus the status row.
pub const PREVIEW_ROWS: usize = MATRIX_HEIGHT + 1;

/// A [`PixelSink`] that keeps every strip written to it.
#[derive(Clone, Debug, Default)]
pub struct PreviewRecorder {
    strips: Vec<StripBuffer>,
}

impl PreviewRecorder {
    /// Nothing recorded yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { strips: Vec::new() }
    }

    /// Strips in the order they were written.
    #[must_use]
    pub fn strips(&self) -> &[StripBuffer] {
        &self.strips
    }

    /// The most recent strip, if any.
    #[must_use]
    pub fn last(&self) -> Option<&StripBuffer> {
        self.strips.last()
    }

    /// Forget everything recorded.
    pub fn clear(&mut self) {
        self.strips.clear();
    }
}

impl PixelSink for PreviewRecorder {
    async fn write_strip(&mut self, strip: &StripBuffer) -> CrateResult<()> {
        self.strips.push(*strip);
        Ok(())
    }
}

/// Undo the wiring: `grid[y][x]`, with the status row as the last row.
#[must_use]
pub fn strip_to_grid(
    strip: &StripBuffer,
    layout: &MatrixLayout<FRAME_PIXELS, MATRIX_WIDTH, MATRIX_HEIGHT>,
) -> [[RGB8; MATRIX_WIDTH]; PREVIEW_ROWS] {
    let mut grid = [[RGB8::default(); MATRIX_WIDTH]; PREVIEW_ROWS];
    for (y, row) in grid.iter_mut().take(MATRIX_HEIGHT).enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = strip[layout.map(x, y)];
        }
    }
    grid[MATRIX_HEIGHT].copy_from_slice(&strip[FRAME_PIXELS..]);
    grid
}

/// Write one strip as a PNG no larger than `target_max_dimension` on either side.
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoded.
pub fn write_strip_png(
    strip: &StripBuffer,
    output_path: impl AsRef<Path>,
    target_max_dimension: u32,
) -> Result<(), Box<dyn Error>> {
    write_apng(core::slice::from_ref(strip), output_path, target_max_dimension, None)
}

/// Write strips as a looping animated PNG, `frame_delay_ms` per frame.
///
/// # Errors
///
/// Returns an error if `strips` is empty, the delay does not fit in `u16`, or the file
/// cannot be created or encoded.
pub fn write_strips_apng(
    strips: &[StripBuffer],
    output_path: impl AsRef<Path>,
    target_max_dimension: u32,
    frame_delay_ms: u32,
) -> Result<(), Box<dyn Error>> {
    write_apng(strips, output_path, target_max_dimension, Some(frame_delay_ms))
}

fn write_apng(
    strips: &[StripBuffer],
    output_path: impl AsRef<Path>,
    target_max_dimension: u32,
    frame_delay_ms: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    if strips.is_empty() {
        return Err("no strips to render".into());
    }
    let output_path = output_path.as_ref();
    let cell_size = select_cell_size(target_max_dimension);
    let (width, height) = image_size(cell_size);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(output_path)?;
    let mut encoder = Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    if let Some(delay_ms) = frame_delay_ms {
        encoder.set_animated(u32::try_from(strips.len())?, 0)?;
        let mut writer = encoder.write_header()?;
        let delay_num = u16::try_from(delay_ms)?;
        for strip in strips {
            writer.set_frame_delay(delay_num, 1000)?;
            writer.write_image_data(&render(strip, cell_size))?;
        }
        writer.finish()?;
    } else {
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&render(&strips[0], cell_size))?;
        writer.finish()?;
    }
    info!("wrote preview to {}", output_path.display());
    Ok(())
}

/// Largest square cell that keeps the image within `target_max_dimension`.
fn select_cell_size(target_max_dimension: u32) -> u32 {
    let columns = MATRIX_WIDTH as u32;
    let rows = PREVIEW_ROWS as u32;
    (target_max_dimension / columns.max(rows)).max(4)
}

const fn image_size(cell_size: u32) -> (u32, u32) {
    (
        MATRIX_WIDTH as u32 * cell_size,
        PREVIEW_ROWS as u32 * cell_size,
    )
}

/// Draw each LED as a soft-edged disc on black.
fn render(strip: &StripBuffer, cell_size: u32) -> Vec<u8> {
    let grid = strip_to_grid(strip, &MATRIX_LAYOUT);
    let (width, height) = image_size(cell_size);
    let mut bytes = vec![0u8; (width * height * 3) as usize];

    let radius = cell_size as f32 * 0.4;
    let fade = radius / 3.0;
    let center = (cell_size as f32 - 1.0) / 2.0;

    for (row_index, row) in grid.iter().enumerate() {
        for (column_index, color) in row.iter().enumerate() {
            for local_y in 0..cell_size {
                for local_x in 0..cell_size {
                    let dx = local_x as f32 - center;
                    let dy = local_y as f32 - center;
                    let distance = (dx * dx + dy * dy).sqrt();
                    let intensity = ((radius - distance) / fade).clamp(0.0, 1.0);
                    if intensity <= 0.0 {
                        continue;
                    }
                    let x = column_index as u32 * cell_size + local_x;
                    let y = row_index as u32 * cell_size + local_y;
                    let offset = ((y * width + x) * 3) as usize;
                    bytes[offset] = shade(color.r, intensity);
                    bytes[offset + 1] = shade(color.g, intensity);
                    bytes[offset + 2] = shade(color.b, intensity);
                }
            }
        }
    }
    bytes
}

fn shade(channel: u8, intensity: f32) -> u8 {
    (f32::from(channel) * intensity).round() as u8
}
