//! JSON frame data → [`Animation`].
//!
//! Input is a top-level JSON array of frames; each frame is an array of 56 or 64 color
//! tokens (`"#RRGGBB"` or `"RRGGBB"`). Only the first 56 tokens of a frame are stored; the
//! remaining 8 of a 64-token frame address the status row, which the animation never drives.
//!
//! [`ValidationMode::Strict`] makes two passes over the bytes. The first checks the shape
//! of the whole document (frame count, frame kinds, token counts) without decoding colors,
//! so a shape violation anywhere is reported before a color violation anywhere. The second
//! decodes colors and stops at the first bad token. [`ValidationMode::Lenient`] makes one
//! pass that skips malformed frames and decodes bad tokens as black.
//!
//! Semantic problems travel inside the deserialized value rather than as `serde` errors,
//! which keeps `serde` errors meaning "not JSON" and lets the sequence be drained to the end.
//!
//! `serde-json-core` has no `deserialize_any`. Values of unknown kind go through
//! `deserialize_ignored_any`, which dispatches strings to `visit_str`, arrays to `visit_seq`,
//! objects to `visit_map` and every scalar (number, bool, null) to `visit_unit`.

use core::fmt;

use heapless::Vec;
use serde::Deserialize;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use smart_leds::RGB8;

use super::{Animation, MAX_FRAMES};
use crate::color;
use crate::matrix::{BLACK, FRAME_PIXELS, Frame, SUPPORTED_PIXEL_COUNTS};

/// How strictly [`validate`] treats malformed content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationMode {
    /// Live uploads: the first violation rejects the whole document.
    Strict,
    /// Trusted persisted or bundled data: skip bad frames, decode bad tokens as black,
    /// drop frames past [`MAX_FRAMES`].
    Lenient,
}

/// Why frame data was rejected.
///
/// `Display` gives the message returned to the uploader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    /// Not JSON, or the top-level value is not an array.
    #[display("Top-level JSON must be an array of frames")]
    MalformedInput,
    /// The array held no frames (or, when lenient, no usable frames).
    #[display("No frames in upload")]
    EmptySequence,
    /// More than [`MAX_FRAMES`] frames.
    #[display("Too many frames ({count}, at most 120)")]
    TooManyFrames {
        /// Frames in the upload.
        count: usize,
    },
    /// A frame was not an array.
    #[display("Frame {frame} must be an array")]
    MalformedFrame {
        /// Zero-based frame index.
        frame: usize,
    },
    /// A frame had neither 56 nor 64 tokens.
    #[display("Frame {frame} has {count} color elements (each frame must have 56 or 64)")]
    WrongPixelCount {
        /// Zero-based frame index.
        frame: usize,
        /// Tokens in that frame.
        count: usize,
    },
    /// A token was not `#RRGGBB` or `RRGGBB`.
    #[display("Bad color string at frame {frame}, pixel {pixel} (expected #RRGGBB or RRGGBB)")]
    InvalidColorFormat {
        /// Zero-based frame index.
        frame: usize,
        /// Zero-based token index within the frame.
        pixel: usize,
    },
}

/// Parse and check JSON frame data.
///
/// ```rust
/// use matrix_player::animation::{validate, ValidationError, ValidationMode};
///
/// let frame = ["#FF0000"; 56].map(|token| format!("\"{token}\"")).join(",");
/// let raw = format!("[[{frame}],[{frame}]]");
/// let animation = validate(raw.as_bytes(), ValidationMode::Strict)?;
/// assert_eq!(animation.len(), 2);
///
/// assert_eq!(validate(b"[]", ValidationMode::Strict), Err(ValidationError::EmptySequence));
/// # Ok::<(), ValidationError>(())
/// ```
///
/// # Errors
///
/// Returns the first [`ValidationError`] found. In lenient mode only
/// [`ValidationError::MalformedInput`] and [`ValidationError::EmptySequence`] occur.
pub fn validate(raw: &[u8], mode: ValidationMode) -> Result<Animation, ValidationError> {
    match mode {
        ValidationMode::Strict => {
            let (outline, _) = serde_json_core::from_slice::<Outline>(raw)
                .map_err(|_| ValidationError::MalformedInput)?;
            outline.check()?;
            let (decoded, _) = serde_json_core::from_slice::<Decoded<false>>(raw)
                .map_err(|_| ValidationError::MalformedInput)?;
            Animation::from_validated(decoded.frames?)
        }
        ValidationMode::Lenient => {
            let (decoded, _) = serde_json_core::from_slice::<Decoded<true>>(raw)
                .map_err(|_| ValidationError::MalformedInput)?;
            let frames = decoded.frames?;
            if decoded.dropped > 0 {
                warn!("lenient load dropped {} frames", decoded.dropped);
            }
            Animation::from_validated(frames)
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 1: shape only
// ---------------------------------------------------------------------------

struct Outline {
    frame_count: usize,
    first_violation: Option<ValidationError>,
}

impl Outline {
    const fn check(&self) -> Result<(), ValidationError> {
        if self.frame_count == 0 {
            return Err(ValidationError::EmptySequence);
        }
        if self.frame_count > MAX_FRAMES {
            return Err(ValidationError::TooManyFrames {
                count: self.frame_count,
            });
        }
        match self.first_violation {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }
}

impl<'de> Deserialize<'de> for Outline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutlineVisitor;

        impl<'de> Visitor<'de> for OutlineVisitor {
            type Value = Outline;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an array of frames")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Outline, A::Error> {
                let mut outline = Outline {
                    frame_count: 0,
                    first_violation: None,
                };
                while let Some(shape) = seq.next_element::<FrameShape>()? {
                    let frame = outline.frame_count;
                    outline.frame_count += 1;
                    if outline.first_violation.is_some() {
                        continue;
                    }
                    outline.first_violation = match shape {
                        FrameShape::NotArray => Some(ValidationError::MalformedFrame { frame }),
                        FrameShape::Tokens(count) if !SUPPORTED_PIXEL_COUNTS.contains(&count) => {
                            Some(ValidationError::WrongPixelCount { frame, count })
                        }
                        FrameShape::Tokens(_) => None,
                    };
                }
                Ok(outline)
            }
        }

        deserializer.deserialize_seq(OutlineVisitor)
    }
}

enum FrameShape {
    NotArray,
    Tokens(usize),
}

impl<'de> Deserialize<'de> for FrameShape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ShapeVisitor;

        impl<'de> Visitor<'de> for ShapeVisitor {
            type Value = FrameShape;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("any JSON value")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FrameShape, A::Error> {
                let mut count = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    count += 1;
                }
                Ok(FrameShape::Tokens(count))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<FrameShape, A::Error> {
                drain_map(map)?;
                Ok(FrameShape::NotArray)
            }

            fn visit_str<E: de::Error>(self, _: &str) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }

            fn visit_unit<E: de::Error>(self) -> Result<FrameShape, E> {
                Ok(FrameShape::NotArray)
            }
        }

        deserializer.deserialize_ignored_any(ShapeVisitor)
    }
}

// ---------------------------------------------------------------------------
// Pass 2: colors
// ---------------------------------------------------------------------------

struct Decoded<const LENIENT: bool> {
    frames: Result<Vec<Frame, MAX_FRAMES>, ValidationError>,
    dropped: usize,
}

impl<'de, const LENIENT: bool> Deserialize<'de> for Decoded<LENIENT> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecodedVisitor<const LENIENT: bool>;

        impl<'de, const LENIENT: bool> Visitor<'de> for DecodedVisitor<LENIENT> {
            type Value = Decoded<LENIENT>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an array of frames")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut frames = Vec::new();
                let mut dropped = 0;
                let mut frame = 0;
                while let Some(outcome) = seq.next_element_seed(FrameSeed::<LENIENT> { frame })? {
                    frame += 1;
                    match outcome {
                        FrameOutcome::Decoded(decoded) => {
                            if frames.push(decoded).is_err() {
                                dropped += 1;
                            }
                        }
                        FrameOutcome::Skipped => dropped += 1,
                        FrameOutcome::Rejected(error) => {
                            while seq.next_element::<IgnoredAny>()?.is_some() {}
                            return Ok(Decoded {
                                frames: Err(error),
                                dropped,
                            });
                        }
                    }
                }
                Ok(Decoded {
                    frames: Ok(frames),
                    dropped,
                })
            }
        }

        deserializer.deserialize_seq(DecodedVisitor::<LENIENT>)
    }
}

enum FrameOutcome {
    Decoded(Frame),
    Skipped,
    Rejected(ValidationError),
}

struct FrameSeed<const LENIENT: bool> {
    frame: usize,
}

impl<const LENIENT: bool> FrameSeed<LENIENT> {
    const fn malformed(&self) -> FrameOutcome {
        if LENIENT {
            FrameOutcome::Skipped
        } else {
            FrameOutcome::Rejected(ValidationError::MalformedFrame { frame: self.frame })
        }
    }
}

impl<'de, const LENIENT: bool> DeserializeSeed<'de> for FrameSeed<LENIENT> {
    type Value = FrameOutcome;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<FrameOutcome, D::Error> {
        deserializer.deserialize_ignored_any(self)
    }
}

impl<'de, const LENIENT: bool> Visitor<'de> for FrameSeed<LENIENT> {
    type Value = FrameOutcome;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of color tokens")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FrameOutcome, A::Error> {
        let mut pixels = [BLACK; FRAME_PIXELS];
        let mut bad_pixel = None;
        let mut count = 0;
        while let Some(ColorToken(color)) = seq.next_element::<ColorToken>()? {
            match color {
                Some(color) if count < FRAME_PIXELS => pixels[count] = color,
                Some(_) => {}
                None if bad_pixel.is_none() => bad_pixel = Some(count),
                None => {}
            }
            count += 1;
        }

        if !SUPPORTED_PIXEL_COUNTS.contains(&count) {
            return Ok(if LENIENT {
                FrameOutcome::Skipped
            } else {
                FrameOutcome::Rejected(ValidationError::WrongPixelCount {
                    frame: self.frame,
                    count,
                })
            });
        }
        Ok(match bad_pixel {
            Some(pixel) if !LENIENT => FrameOutcome::Rejected(ValidationError::InvalidColorFormat {
                frame: self.frame,
                pixel,
            }),
            // Bad tokens were left black.
            _ => FrameOutcome::Decoded(Frame::new(pixels)),
        })
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<FrameOutcome, A::Error> {
        drain_map(map)?;
        Ok(self.malformed())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }

    fn visit_unit<E: de::Error>(self) -> Result<FrameOutcome, E> {
        Ok(self.malformed())
    }
}

/// One token; `None` when it is not a decodable color string.
struct ColorToken(Option<RGB8>);

impl<'de> Deserialize<'de> for ColorToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenVisitor;

        impl<'de> Visitor<'de> for TokenVisitor {
            type Value = ColorToken;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a #RRGGBB color string")
            }

            fn visit_str<E: de::Error>(self, token: &str) -> Result<ColorToken, E> {
                Ok(ColorToken(color::decode(token).ok()))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ColorToken, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(ColorToken(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<ColorToken, A::Error> {
                drain_map(map)?;
                Ok(ColorToken(None))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<ColorToken, E> {
                Ok(ColorToken(None))
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<ColorToken, E> {
                Ok(ColorToken(None))
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<ColorToken, E> {
                Ok(ColorToken(None))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<ColorToken, E> {
                Ok(ColorToken(None))
            }

            fn visit_unit<E: de::Error>(self) -> Result<ColorToken, E> {
                Ok(ColorToken(None))
            }
        }

        deserializer.deserialize_ignored_any(TokenVisitor)
    }
}

fn drain_map<'de, A: MapAccess<'de>>(mut map: A) -> Result<(), A::Error> {
    while map.next_key::<&'de str>()?.is_some() {
        map.next_value::<IgnoredAny>()?;
    }
    Ok(())
}
