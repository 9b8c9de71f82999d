//! Allocation caps.
//!
//! Reformatted copies and decoded rasters are sized by the caller's request,
//! so a request can ask for far more memory than the source occupies (a
//! large destination offset, or a 1-bit source widened to 16 bits). The
//! caps in [`ResourceLimits`] are compared against the final buffer
//! geometry; a failed comparison yields [`LimitExceeded`] and nothing is
//! allocated. Borrowed zero-copy buffers are never checked.

/// Upper bounds for buffers built by [`materialize`](crate::materialize),
/// [`read_region`](crate::read_region) and [`prepare_for_encode`](crate::prepare_for_encode).
///
/// An unset cap does not constrain anything.
///
/// # Example
///
/// ```
/// use zenraster::ResourceLimits;
///
/// let limits = ResourceLimits::none()
///     .with_max_width(16_384)
///     .with_max_memory(256 << 20);
/// assert!(limits.has_any());
/// assert!(limits.check_dimensions(16_384, 2).is_ok());
/// assert!(limits.check_dimensions(16_385, 2).is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResourceLimits {
    /// Largest accepted `width × height` of an output buffer.
    pub max_pixels: Option<u64>,
    /// Largest accepted output buffer, in bytes of sample storage.
    pub max_memory_bytes: Option<u64>,
    /// Widest accepted output buffer.
    pub max_width: Option<u32>,
    /// Tallest accepted output buffer.
    pub max_height: Option<u32>,
}

impl ResourceLimits {
    /// Caps with nothing set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Cap the pixel count.
    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = Some(pixels);
        self
    }

    /// Cap the sample storage size.
    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Cap the buffer width.
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Cap the buffer height.
    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    /// True when at least one cap is set.
    pub fn has_any(&self) -> bool {
        *self != Self::none()
    }

    /// Compare an output buffer's geometry against the width, height and
    /// pixel caps, in that order.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        if let Some(limit) = exceeded(self.max_width, width) {
            return Err(LimitExceeded::Width {
                requested: width,
                limit,
            });
        }
        if let Some(limit) = exceeded(self.max_height, height) {
            return Err(LimitExceeded::Height {
                requested: height,
                limit,
            });
        }
        let pixels = u64::from(width) * u64::from(height);
        match exceeded(self.max_pixels, pixels) {
            Some(limit) => Err(LimitExceeded::Pixels {
                requested: pixels,
                limit,
            }),
            None => Ok(()),
        }
    }

    /// Compare an output buffer's byte size against the memory cap.
    pub fn check_memory(&self, bytes: u64) -> Result<(), LimitExceeded> {
        match exceeded(self.max_memory_bytes, bytes) {
            Some(limit) => Err(LimitExceeded::Memory {
                requested: bytes,
                limit,
            }),
            None => Ok(()),
        }
    }
}

/// The cap, when `value` is above it.
fn exceeded<T: PartialOrd + Copy>(cap: Option<T>, value: T) -> Option<T> {
    cap.filter(|&limit| value > limit)
}

/// An output buffer would be larger than a [`ResourceLimits`] cap allows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LimitExceeded {
    /// Against [`ResourceLimits::max_width`].
    Width {
        /// Buffer width that was asked for.
        requested: u32,
        /// The cap.
        limit: u32,
    },
    /// Against [`ResourceLimits::max_height`].
    Height {
        /// Buffer height that was asked for.
        requested: u32,
        /// The cap.
        limit: u32,
    },
    /// Against [`ResourceLimits::max_pixels`].
    Pixels {
        /// `width × height` that was asked for.
        requested: u64,
        /// The cap.
        limit: u64,
    },
    /// Against [`ResourceLimits::max_memory_bytes`].
    Memory {
        /// Bytes of sample storage that were asked for.
        requested: u64,
        /// The cap.
        limit: u64,
    },
}

impl core::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (what, requested, limit) = match *self {
            Self::Width { requested, limit } => ("width", u64::from(requested), u64::from(limit)),
            Self::Height { requested, limit } => {
                ("height", u64::from(requested), u64::from(limit))
            }
            Self::Pixels { requested, limit } => ("pixel count", requested, limit),
            Self::Memory { requested, limit } => ("buffer bytes", requested, limit),
        };
        write!(f, "{what} {requested} over the limit of {limit}")
    }
}

impl core::error::Error for LimitExceeded {}
