//! Validated, bounded sequences of frames.
//!
//! An [`Animation`] is only created by [`validate`] (or [`Animation::from_frames`]), so every
//! animation the rest of the crate sees holds between 1 and [`MAX_FRAMES`] frames.
mod validate;

use heapless::Vec;

use crate::matrix::Frame;

pub use validate::{ValidationError, ValidationMode, validate};

/// Upper bound on frames per animation.
pub const MAX_FRAMES: usize = 120;

/// A non-empty, bounded, ordered sequence of frames played in a loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    frames: Vec<Frame, MAX_FRAMES>,
}

impl Animation {
    /// Build an animation from already decoded frames.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySequence`] for no frames and
    /// [`ValidationError::TooManyFrames`] for more than [`MAX_FRAMES`].
    pub fn from_frames(frames: &[Frame]) -> Result<Self, ValidationError> {
        if frames.is_empty() {
            return Err(ValidationError::EmptySequence);
        }
        let frames = Vec::from_slice(frames).map_err(|()| ValidationError::TooManyFrames {
            count: frames.len(),
        })?;
        Ok(Self { frames })
    }

    /// Wrap frames the validator produced.
    pub(crate) fn from_validated(frames: Vec<Frame, MAX_FRAMES>) -> Result<Self, ValidationError> {
        if frames.is_empty() {
            return Err(ValidationError::EmptySequence);
        }
        Ok(Self { frames })
    }

    /// Number of frames (always at least 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if there are no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// All frames, in playback order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The frame at `index`, if any.
    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }
}
