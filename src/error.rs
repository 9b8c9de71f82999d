//! Error type shared by region resolution and reformatting.

use core::fmt;

use crate::limits::LimitExceeded;
use crate::sample::DataType;

/// Coarse classification of a [`LayoutError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Null, empty or inconsistent inputs; bad band selections.
    InvalidArgument,
    /// Bit depth or data type the codec boundary cannot carry.
    UnsupportedFormat,
    /// Region resolution produced nothing to copy.
    Geometry,
    /// A [`ResourceLimits`](crate::ResourceLimits) check failed.
    LimitExceeded,
}

/// Errors from region resolution, band validation and reformatting.
///
/// Every error is reported before any destination buffer is allocated;
/// there are no partial results.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    /// The source image or raster has no pixels.
    EmptySource,
    /// A band index is not below the band count it selects from.
    BandOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of bands available.
        bands: usize,
    },
    /// A band index appears twice in one selection.
    DuplicateBand {
        /// Repeated index.
        index: usize,
    },
    /// The selection names more bands than the source has.
    TooManyBands {
        /// Length of the selection.
        requested: usize,
        /// Number of source bands.
        available: usize,
    },
    /// Source and destination band counts disagree.
    BandCountMismatch {
        /// Bands read from the source.
        source: usize,
        /// Bands expected by the destination.
        destination: usize,
    },
    /// A subsampling period is zero.
    InvalidPeriod {
        /// Horizontal period.
        x: u32,
        /// Vertical period.
        y: u32,
    },
    /// A grid offset is not smaller than its period.
    InvalidGridOffset {
        /// Offending offset.
        offset: u32,
        /// Period on the same axis.
        period: u32,
    },
    /// A sample model is internally inconsistent.
    LayoutMismatch(&'static str),
    /// Backing storage is smaller than the sample model requires.
    InsufficientData {
        /// Elements needed.
        required: usize,
        /// Elements present.
        actual: usize,
    },
    /// Resolution left the source region empty.
    EmptySourceRegion,
    /// Resolution left the destination region empty.
    EmptyDestinationRegion,
    /// The destination region does not overlap the destination image.
    DestinationOutside,
    /// A region reaches outside the raster it addresses.
    RegionOutOfBounds,
    /// Maximum per-band sample size needs more than 16 bits.
    UnsupportedBitDepth(u8),
    /// The data type cannot be handed to the codec.
    UnsupportedDataType(DataType),
    /// A resource limit was exceeded.
    Limit(LimitExceeded),
}

impl LayoutError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySource
            | Self::BandOutOfRange { .. }
            | Self::DuplicateBand { .. }
            | Self::TooManyBands { .. }
            | Self::BandCountMismatch { .. }
            | Self::InvalidPeriod { .. }
            | Self::InvalidGridOffset { .. }
            | Self::LayoutMismatch(_)
            | Self::InsufficientData { .. } => ErrorKind::InvalidArgument,
            Self::UnsupportedBitDepth(_) | Self::UnsupportedDataType(_) => {
                ErrorKind::UnsupportedFormat
            }
            Self::EmptySourceRegion
            | Self::EmptyDestinationRegion
            | Self::DestinationOutside
            | Self::RegionOutOfBounds => ErrorKind::Geometry,
            Self::Limit(_) => ErrorKind::LimitExceeded,
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySource => write!(f, "source has empty bounds"),
            Self::BandOutOfRange { index, bands } => {
                write!(f, "band index {index} out of range for {bands} bands")
            }
            Self::DuplicateBand { index } => write!(f, "band index {index} selected twice"),
            Self::TooManyBands {
                requested,
                available,
            } => write!(
                f,
                "{requested} bands selected but the source has {available}"
            ),
            Self::BandCountMismatch {
                source,
                destination,
            } => write!(
                f,
                "source band count {source} differs from destination band count {destination}"
            ),
            Self::InvalidPeriod { x, y } => {
                write!(f, "subsampling period {x}x{y} must be at least 1x1")
            }
            Self::InvalidGridOffset { offset, period } => {
                write!(f, "grid offset {offset} must be less than period {period}")
            }
            Self::LayoutMismatch(msg) => write!(f, "inconsistent sample model: {msg}"),
            Self::InsufficientData { required, actual } => write!(
                f,
                "sample storage holds {actual} elements but {required} are required"
            ),
            Self::EmptySourceRegion => write!(f, "source region is empty"),
            Self::EmptyDestinationRegion => write!(f, "destination region is empty"),
            Self::DestinationOutside => {
                write!(f, "destination region lies outside the destination image")
            }
            Self::RegionOutOfBounds => write!(f, "region exceeds raster bounds"),
            Self::UnsupportedBitDepth(bits) => {
                write!(f, "unsupported bit depth {bits} (at most 16 bits per sample)")
            }
            Self::UnsupportedDataType(dt) => write!(f, "unsupported data type {dt:?}"),
            Self::Limit(e) => write!(f, "{e}"),
        }
    }
}

impl core::error::Error for LayoutError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Limit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LimitExceeded> for LayoutError {
    fn from(e: LimitExceeded) -> Self {
        Self::Limit(e)
    }
}
