//! Compile-time description of how a W×H panel is threaded onto one LED strip.
//!
//! See [`MatrixLayout`].

/// Compile-time description of panel geometry and wiring.
///
/// `MatrixLayout` maps each position in the wiring order of a NeoPixel-style (WS2812) strip
/// to an `(x, y)` cell of a rectangular panel, and keeps the inverse table so
/// [`map`](Self::map) is a single lookup.
///
/// Coordinates use a screen-style convention: `(0, 0)` is the top-left corner,
/// `x` increases to the right, and `y` increases downward.
///
/// ## Validation
///
/// Layouts are validated when they are constructed, which for `const` layouts means at
/// **compile time**:
/// - coordinates must be in-bounds
/// - every `(x, y)` cell must appear exactly once
///
/// # Example
///
/// ```rust
/// use matrix_player::matrix::layout::MatrixLayout;
///
/// const WIRED: MatrixLayout<6, 3, 2> = MatrixLayout::serpentine_even_rows_right_to_left();
/// const EXPECTED: MatrixLayout<6, 3, 2> =
///     MatrixLayout::new([(2, 0), (1, 0), (0, 0), (0, 1), (1, 1), (2, 1)]);
/// const _: () = assert!(WIRED.equals(&EXPECTED));
///
/// assert_eq!(WIRED.map(0, 0), 2);
/// assert_eq!(WIRED.map(0, 1), 3);
/// ```
///
/// ```text
/// Serpentine 3×2, even rows wired right-to-left:
///   LED2  LED1  LED0
///   LED3  LED4  LED5
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixLayout<const N: usize, const W: usize, const H: usize> {
    map: [(u16, u16); N],
    strip_index: [u16; N],
}

impl<const N: usize, const W: usize, const H: usize> MatrixLayout<N, W, H> {
    /// Build a layout from `(x, y)` listed in strip order, panicking if it is not a bijection.
    ///
    /// ```rust
    /// use matrix_player::matrix::layout::MatrixLayout;
    ///
    /// // 3×2 panel wired left-to-right on both rows.
    /// const LINEAR: MatrixLayout<6, 3, 2> =
    ///     MatrixLayout::new([(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    /// assert_eq!(LINEAR.map(1, 1), 4);
    /// ```
    #[must_use]
    pub const fn new(map: [(u16, u16); N]) -> Self {
        assert!(W > 0 && H > 0, "W and H must be positive");
        assert!(W * H == N, "W*H must equal N");
        assert!(N <= u16::MAX as usize, "total LEDs must fit in u16");

        let mut seen = [false; N];
        let mut strip_index = [0_u16; N];

        let mut led_index = 0;
        while led_index < N {
            let (col, row) = map[led_index];
            let col = col as usize;
            let row = row as usize;

            assert!(col < W, "column out of bounds");
            assert!(row < H, "row out of bounds");

            let cell = row * W + col;
            assert!(!seen[cell], "duplicate (col,row) in mapping");
            seen[cell] = true;
            strip_index[cell] = led_index as u16;

            led_index += 1;
        }

        let mut cell = 0;
        while cell < N {
            assert!(seen[cell], "mapping does not cover every cell");
            cell += 1;
        }

        Self { map, strip_index }
    }

    /// Serpentine row-major wiring where even rows run right-to-left and odd rows
    /// left-to-right.
    ///
    /// This is how the 8×7 panel is wired: `(x, y)` lands on strip index
    /// `y*W + (W-1-x)` for even `y` and `y*W + x` for odd `y`.
    ///
    /// ```rust
    /// use matrix_player::matrix::layout::MatrixLayout;
    ///
    /// const PANEL: MatrixLayout<56, 8, 7> = MatrixLayout::serpentine_even_rows_right_to_left();
    /// assert_eq!(PANEL.map(0, 0), 7);
    /// assert_eq!(PANEL.map(0, 1), 8);
    /// assert_eq!(PANEL.map(7, 6), 48);
    /// ```
    #[must_use]
    pub const fn serpentine_even_rows_right_to_left() -> Self {
        Self::serpentine_even_rows_left_to_right().flip_h()
    }

    /// Serpentine row-major wiring where even rows run left-to-right and odd rows
    /// right-to-left.
    ///
    /// ```rust
    /// use matrix_player::matrix::layout::MatrixLayout;
    ///
    /// const MAP: MatrixLayout<6, 3, 2> = MatrixLayout::serpentine_even_rows_left_to_right();
    /// const EXPECTED: MatrixLayout<6, 3, 2> =
    ///     MatrixLayout::new([(0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 1)]);
    /// const _: () = assert!(MAP.equals(&EXPECTED));
    /// ```
    ///
    /// ```text
    ///   LED0  LED1  LED2
    ///   LED5  LED4  LED3
    /// ```
    #[must_use]
    pub const fn serpentine_even_rows_left_to_right() -> Self {
        assert!(W > 0 && H > 0, "W and H must be positive");
        assert!(W * H == N, "W*H must equal N");

        let mut mapping = [(0_u16, 0_u16); N];
        let mut y_index = 0;
        while y_index < H {
            let mut x_index = 0;
            while x_index < W {
                let led_index = if y_index % 2 == 0 {
                    y_index * W + x_index
                } else {
                    y_index * W + (W - 1 - x_index)
                };
                mapping[led_index] = (x_index as u16, y_index as u16);
                x_index += 1;
            }
            y_index += 1;
        }
        Self::new(mapping)
    }

    /// Flip horizontally (mirror columns).
    ///
    /// ```rust
    /// use matrix_player::matrix::layout::MatrixLayout;
    ///
    /// const A: MatrixLayout<6, 3, 2> = MatrixLayout::serpentine_even_rows_left_to_right();
    /// const B: MatrixLayout<6, 3, 2> = MatrixLayout::serpentine_even_rows_right_to_left();
    /// const _: () = assert!(A.flip_h().equals(&B));
    /// ```
    #[must_use]
    pub const fn flip_h(self) -> Self {
        let mut out = [(0_u16, 0_u16); N];
        let mut i = 0;
        while i < N {
            let (col, row) = self.map[i];
            out[i] = ((W - 1 - col as usize) as u16, row);
            i += 1;
        }
        Self::new(out)
    }

    /// Strip index of the LED at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `x >= W` or `y >= H`.
    #[must_use]
    pub const fn map(&self, x: usize, y: usize) -> usize {
        assert!(x < W && y < H, "(x, y) out of bounds");
        self.strip_index[y * W + x] as usize
    }

    /// Return the array mapping LED wiring order to `(x, y)` coordinates.
    #[must_use]
    pub const fn index_to_xy(&self) -> &[(u16, u16); N] {
        &self.map
    }

    /// Number of columns in the layout.
    #[must_use]
    pub const fn width(&self) -> usize {
        W
    }

    /// Number of rows in the layout.
    #[must_use]
    pub const fn height(&self) -> usize {
        H
    }

    /// Total number of LEDs in the layout.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false; a layout covers at least one cell.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Const equality helper for compile-time asserts.
    #[must_use]
    pub const fn equals(&self, other: &Self) -> bool {
        let mut i = 0;
        while i < N {
            if self.map[i].0 != other.map[i].0 || self.map[i].1 != other.map[i].1 {
                return false;
            }
            i += 1;
        }
        true
    }
}
