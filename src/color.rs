//! Decoding of `#RRGGBB` / `RRGGBB` color tokens into [`RGB8`].
//!
//! See [`decode`].

pub use smart_leds::RGB8;

/// Predefined RGB color constants from the `smart_leds` crate.
#[doc(inline)]
pub use smart_leds::colors;

/// Why a color token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorError {
    /// The token was empty.
    #[display("empty color token")]
    Empty,
    /// The token did not have exactly six hex digits after the optional `#`.
    #[display("expected 6 hex digits, found {len} characters")]
    WrongLength {
        /// Byte length of the token after stripping `#`.
        len: usize,
    },
    /// The token contained something other than `0-9`, `a-f`, `A-F`.
    #[display("color token contains a non-hex character")]
    NonHexDigit,
}

/// Decode a `#RRGGBB` or `RRGGBB` token.
///
/// Hex digits are case-insensitive. The red, green, and blue channels are the top, middle,
/// and low byte of the 24-bit value.
///
/// ```rust
/// use matrix_player::color::{decode, RGB8};
///
/// assert_eq!(decode("#A1B2C3"), Ok(RGB8::new(0xA1, 0xB2, 0xC3)));
/// assert_eq!(decode("a1b2c3"), Ok(RGB8::new(0xA1, 0xB2, 0xC3)));
/// assert!(decode("#ABCD").is_err());
/// ```
///
/// # Errors
///
/// Returns a [`ColorError`] when the token is empty, has the wrong length, or contains a
/// non-hex character (a `+` or `-` sign counts as non-hex).
pub fn decode(token: &str) -> Result<RGB8, ColorError> {
    if token.is_empty() {
        return Err(ColorError::Empty);
    }
    let digits = token.strip_prefix('#').unwrap_or(token);
    if digits.len() != 6 {
        return Err(ColorError::WrongLength { len: digits.len() });
    }

    let mut value: u32 = 0;
    for digit in digits.chars() {
        let nibble = digit.to_digit(16).ok_or(ColorError::NonHexDigit)?;
        value = (value << 4) | nibble;
    }

    let [_, red, green, blue] = value.to_be_bytes();
    Ok(RGB8::new(red, green, blue))
}
