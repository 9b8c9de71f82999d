//! Per-call transform requests and reformatting options.
//!
//! Nothing here is global: every toggle travels with the call that uses it.

use alloc::vec::Vec;

use crate::error::LayoutError;
use crate::geometry::{Point, Rect};
use crate::limits::ResourceLimits;

/// Region, subsampling and band selection requested for one read or write.
///
/// # Example
///
/// ```
/// use zenraster::{Rect, TransformRequest};
///
/// let request = TransformRequest::new()
///     .with_source_region(Rect::new(0, 0, 64, 64))
///     .with_subsampling(2, 2, 1, 0)
///     .with_source_bands([2, 1, 0]);
/// assert!(request.validate().is_ok());
/// assert!(request.is_subsampling());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct TransformRequest {
    /// Region of the source to use; `None` means all of it.
    pub source_region: Option<Rect>,
    /// Horizontal subsampling period (≥ 1).
    pub period_x: u32,
    /// Vertical subsampling period (≥ 1).
    pub period_y: u32,
    /// Leading columns skipped before subsampling (< `period_x`).
    pub grid_x: u32,
    /// Leading rows skipped before subsampling (< `period_y`).
    pub grid_y: u32,
    /// Source bands to use, in output order; `None` means all, in order.
    pub source_bands: Option<Vec<usize>>,
    /// Destination bands receiving the source bands; `None` means all.
    pub destination_bands: Option<Vec<usize>>,
    /// Where the top-left output pixel lands in the destination.
    pub destination_offset: Point,
}

impl Default for TransformRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRequest {
    /// Identity request: whole source, no subsampling, all bands, no offset.
    pub fn new() -> Self {
        Self {
            source_region: None,
            period_x: 1,
            period_y: 1,
            grid_x: 0,
            grid_y: 0,
            source_bands: None,
            destination_bands: None,
            destination_offset: Point::ORIGIN,
        }
    }

    /// Restrict the source to `region`.
    pub fn with_source_region(mut self, region: Rect) -> Self {
        self.source_region = Some(region);
        self
    }

    /// Set subsampling periods and grid offsets.
    pub fn with_subsampling(
        mut self,
        period_x: u32,
        period_y: u32,
        grid_x: u32,
        grid_y: u32,
    ) -> Self {
        self.period_x = period_x;
        self.period_y = period_y;
        self.grid_x = grid_x;
        self.grid_y = grid_y;
        self
    }

    /// Select and order source bands.
    pub fn with_source_bands(mut self, bands: impl Into<Vec<usize>>) -> Self {
        self.source_bands = Some(bands.into());
        self
    }

    /// Select destination bands.
    pub fn with_destination_bands(mut self, bands: impl Into<Vec<usize>>) -> Self {
        self.destination_bands = Some(bands.into());
        self
    }

    /// Place the output at `offset` in the destination.
    pub fn with_destination_offset(mut self, offset: Point) -> Self {
        self.destination_offset = offset;
        self
    }

    /// Whether either period is not 1.
    pub fn is_subsampling(&self) -> bool {
        self.period_x != 1 || self.period_y != 1
    }

    /// Check periods, grid offsets and that no band is selected twice.
    ///
    /// Band indices are range-checked later, against the actual band counts.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidPeriod`], [`LayoutError::InvalidGridOffset`] or
    /// [`LayoutError::DuplicateBand`].
    pub fn validate(&self) -> Result<(), LayoutError> {
        check_periods(self.period_x, self.period_y)?;
        if self.grid_x >= self.period_x {
            return Err(LayoutError::InvalidGridOffset {
                offset: self.grid_x,
                period: self.period_x,
            });
        }
        if self.grid_y >= self.period_y {
            return Err(LayoutError::InvalidGridOffset {
                offset: self.grid_y,
                period: self.period_y,
            });
        }
        for bands in [&self.source_bands, &self.destination_bands]
            .into_iter()
            .flatten()
        {
            check_duplicates(bands)?;
        }
        Ok(())
    }
}

/// Options for [`materialize`](crate::materialize),
/// [`resolve_regions`](crate::resolve_regions) and
/// [`read_region`](crate::read_region).
///
/// ```
/// use zenraster::{ReformatOptions, ResourceLimits};
///
/// let options = ReformatOptions::new()
///     .with_packed_bilevel(true)
///     .with_limits(ResourceLimits::none().with_max_pixels(1 << 24));
/// assert!(options.allow_packed_bilevel);
/// assert!(options.allow_zero_destination_offset);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ReformatOptions {
    /// Accept and produce 1-bit packed buffers for single-band 1-bit data.
    pub allow_packed_bilevel: bool,
    /// When true the requested destination offset always replaces the
    /// current one; when false only a non-zero request does.
    pub allow_zero_destination_offset: bool,
    /// Caps on allocated buffers.
    pub limits: ResourceLimits,
}

impl Default for ReformatOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReformatOptions {
    /// Interleaved output only, requested destination offsets always applied,
    /// no limits.
    pub fn new() -> Self {
        Self {
            allow_packed_bilevel: false,
            allow_zero_destination_offset: true,
            limits: ResourceLimits::none(),
        }
    }

    /// Enable or disable the packed bilevel layout.
    pub fn with_packed_bilevel(mut self, allow: bool) -> Self {
        self.allow_packed_bilevel = allow;
        self
    }

    /// Choose how a zero destination offset is treated.
    pub fn with_zero_destination_offset(mut self, allow: bool) -> Self {
        self.allow_zero_destination_offset = allow;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

pub(crate) fn check_periods(period_x: u32, period_y: u32) -> Result<(), LayoutError> {
    if period_x == 0 || period_y == 0 {
        return Err(LayoutError::InvalidPeriod {
            x: period_x,
            y: period_y,
        });
    }
    Ok(())
}

fn check_duplicates(bands: &[usize]) -> Result<(), LayoutError> {
    for (i, &b) in bands.iter().enumerate() {
        if bands[..i].contains(&b) {
            return Err(LayoutError::DuplicateBand { index: b });
        }
    }
    Ok(())
}

/// Validate a band selection against `available` bands.
pub(crate) fn check_band_selection(bands: &[usize], available: usize) -> Result<(), LayoutError> {
    if bands.len() > available {
        return Err(LayoutError::TooManyBands {
            requested: bands.len(),
            available,
        });
    }
    if let Some(&index) = bands.iter().find(|&&b| b >= available) {
        return Err(LayoutError::BandOutOfRange {
            index,
            bands: available,
        });
    }
    check_duplicates(bands)
}
