//! Play JSON-uploaded animations on a serpentine-wired NeoPixel-style (WS2812) LED matrix.
//!
//! Frames arrive as JSON text (`[["#RRGGBB", ...], ...]`) from a small web interface.
//! They are validated into an [`Animation`](animation::Animation), swapped into a shared
//! [`FrameStore`](frame_store::FrameStore), and rendered continuously by a
//! [`PlaybackEngine`](player::PlaybackEngine) that runs independently of request handling.
//! The most recent accepted upload is kept verbatim in flash so it comes back after a reset.
//!
//! # Glossary
//!
//! - **Frame:** one color per logical pixel of the 8×7 active region.
//! - **Status row:** the 8 LEDs after the active region, driven from a fixed palette
//!   rather than from animation data.
//! - **Serpentine wiring:** consecutive rows of the panel alternate direction along one
//!   strip. See [`MatrixLayout`](matrix::MatrixLayout) for the exact convention.
//! - **Install:** atomically replacing the animation held by the store.
//!
//! # Features
//!
//! The core (everything except [`ws2812`], [`storage::rp_flash`], and the radio bring-up)
//! builds on the host with the `host` feature, which is the default so `cargo test`
//! works out of the box. Firmware builds use `--no-default-features --features embedded`.
#![cfg_attr(not(feature = "host"), no_std)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Compile-time checks: exactly one board must be selected (unless testing with host feature)
#[cfg(all(not(any(feature = "pico1", feature = "pico2")), not(feature = "host")))]
compile_error!("Must enable exactly one board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

#[cfg(all(feature = "host", any(feature = "pico1", feature = "pico2")))]
compile_error!("The 'host' feature cannot be combined with a board feature; use --no-default-features");

// This must go first so the logging macros are visible to every other module.
mod fmt;

pub mod access_point;
pub mod animation;
pub mod color;
pub mod control;
mod error;
pub mod frame_store;
pub mod matrix;
pub mod player;
#[cfg(all(feature = "wifi", not(feature = "host")))]
pub mod server;
pub mod storage;
#[cfg(feature = "host")]
pub mod to_png;
#[cfg(not(feature = "host"))]
pub mod ws2812;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
