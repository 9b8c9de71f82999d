//! Source/destination region resolution.
//!
//! Reconciles the source bounds, a [`TransformRequest`] and an optional
//! destination image into a pair of non-empty regions related by the
//! subsampling transform: the destination extent is
//! `ceil(source extent / period)` on each axis.
//!
//! # Example
//!
//! ```
//! use zenraster::{DestinationPlacement, Point, Rect, ReformatOptions, TransformRequest,
//!     resolve_regions};
//!
//! let request = TransformRequest::new()
//!     .with_subsampling(3, 1, 0, 0)
//!     .with_destination_offset(Point::new(-2, 0));
//! let resolved = resolve_regions(
//!     Rect::new(0, 0, 21, 4),
//!     &request,
//!     &DestinationPlacement::none(),
//!     &ReformatOptions::new(),
//! )
//! .unwrap();
//!
//! // Two destination columns clipped away = six source columns skipped.
//! assert_eq!(resolved.source, Rect::new(6, 0, 15, 4));
//! assert_eq!(resolved.destination, Rect::new(0, 0, 5, 4));
//! ```

use crate::error::LayoutError;
use crate::geometry::{Point, Rect, Size};
use crate::request::{ReformatOptions, TransformRequest, check_band_selection};

/// The destination side of a resolution: where output currently goes and,
/// when a destination image already exists, how large it is.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DestinationPlacement {
    /// Current destination offset, used when the request's offset is zero
    /// and [`ReformatOptions::allow_zero_destination_offset`] is false.
    pub offset: Point,
    /// Size of the destination image, if one exists.
    pub size: Option<Size>,
}

impl DestinationPlacement {
    /// No destination image; output starts at the origin.
    pub const fn none() -> Self {
        Self {
            offset: Point::ORIGIN,
            size: None,
        }
    }

    /// An existing destination image of the given size.
    pub const fn image(size: Size) -> Self {
        Self {
            offset: Point::ORIGIN,
            size: Some(size),
        }
    }

    /// Set the current destination offset.
    pub const fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }
}

/// Final, mutually consistent regions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedRegions {
    /// Region of the source to read, in source coordinates.
    pub source: Rect,
    /// Region of the destination to write, in destination coordinates.
    pub destination: Rect,
}

/// Resolve the source and destination regions for a read.
///
/// Steps, in order: intersect the source bounds with the requested region;
/// skip the grid offset; choose the destination offset; clip a negative
/// destination offset by advancing the source `-offset × period` samples;
/// size the destination as `ceil(source / period)`; clip against the
/// destination image and shrink the source by `excess × period`.
///
/// # Errors
///
/// Request validation errors, [`LayoutError::EmptySource`] for empty source
/// bounds, [`LayoutError::DestinationOutside`] when the destination region
/// misses the destination image, and [`LayoutError::EmptySourceRegion`] /
/// [`LayoutError::EmptyDestinationRegion`] when nothing is left.
pub fn resolve_regions(
    source_bounds: Rect,
    request: &TransformRequest,
    destination: &DestinationPlacement,
    options: &ReformatOptions,
) -> Result<ResolvedRegions, LayoutError> {
    request.validate()?;
    if source_bounds.is_empty() {
        return Err(LayoutError::EmptySource);
    }
    let region = match request.source_region {
        Some(r) => source_bounds
            .intersection(&r)
            .ok_or(LayoutError::EmptySourceRegion)?,
        None => source_bounds,
    };

    let period_x = i64::from(request.period_x);
    let period_y = i64::from(request.period_y);
    let grid_x = i64::from(request.grid_x);
    let grid_y = i64::from(request.grid_y);

    // Grid offset consumes leading samples before any sizing.
    let mut src_x = i64::from(region.x) + grid_x;
    let mut src_y = i64::from(region.y) + grid_y;
    let mut src_w = i64::from(region.width) - grid_x;
    let mut src_h = i64::from(region.height) - grid_y;

    let offset = if options.allow_zero_destination_offset || !request.destination_offset.is_origin()
    {
        request.destination_offset
    } else {
        destination.offset
    };
    let mut dst_x = i64::from(offset.x);
    let mut dst_y = i64::from(offset.y);

    if dst_x < 0 {
        let delta = -dst_x * period_x;
        src_x += delta;
        src_w -= delta;
        dst_x = 0;
    }
    if dst_y < 0 {
        let delta = -dst_y * period_y;
        src_y += delta;
        src_h -= delta;
        dst_y = 0;
    }
    if src_w <= 0 || src_h <= 0 {
        return Err(LayoutError::EmptySourceRegion);
    }

    let subsampled_w = ceil_div(src_w, period_x);
    let subsampled_h = ceil_div(src_h, period_y);
    let mut dst_w = subsampled_w;
    let mut dst_h = subsampled_h;

    if let Some(size) = destination.size {
        let image_w = i64::from(size.width);
        let image_h = i64::from(size.height);
        let right = (dst_x + dst_w).min(image_w);
        let bottom = (dst_y + dst_h).min(image_h);
        if right <= dst_x || bottom <= dst_y {
            return Err(LayoutError::DestinationOutside);
        }
        dst_w = right - dst_x;
        dst_h = bottom - dst_y;

        let excess_x = dst_x + subsampled_w - image_w;
        if excess_x > 0 {
            src_w -= excess_x * period_x;
        }
        let excess_y = dst_y + subsampled_h - image_h;
        if excess_y > 0 {
            src_h -= excess_y * period_y;
        }
    }

    if src_w <= 0 || src_h <= 0 {
        return Err(LayoutError::EmptySourceRegion);
    }
    if dst_w <= 0 || dst_h <= 0 {
        return Err(LayoutError::EmptyDestinationRegion);
    }

    let resolved = ResolvedRegions {
        source: to_rect(src_x, src_y, src_w, src_h)?,
        destination: to_rect(dst_x, dst_y, dst_w, dst_h)?,
    };
    log::trace!(
        "resolved {:?} (period {}x{}, grid {},{}) -> {:?}",
        source_bounds,
        request.period_x,
        request.period_y,
        request.grid_x,
        request.grid_y,
        resolved
    );
    Ok(resolved)
}

/// Source region for a write: the requested region clipped to `bounds`,
/// with the grid offset skipped. Destination offsets play no part.
///
/// # Errors
///
/// [`LayoutError::InvalidPeriod`] / [`LayoutError::InvalidGridOffset`] for a
/// malformed request and [`LayoutError::EmptySourceRegion`] when nothing
/// remains.
pub fn source_region_for_write(
    bounds: Rect,
    request: &TransformRequest,
) -> Result<Rect, LayoutError> {
    request.validate()?;
    if bounds.is_empty() {
        return Err(LayoutError::EmptySource);
    }
    let region = match request.source_region {
        Some(r) => bounds
            .intersection(&r)
            .ok_or(LayoutError::EmptySourceRegion)?,
        None => bounds,
    };
    if request.grid_x >= region.width || request.grid_y >= region.height {
        return Err(LayoutError::EmptySourceRegion);
    }
    to_rect(
        i64::from(region.x) + i64::from(request.grid_x),
        i64::from(region.y) + i64::from(request.grid_y),
        i64::from(region.width - request.grid_x),
        i64::from(region.height - request.grid_y),
    )
}

/// Check the request's band selections against the source band count and
/// the band count the destination expects.
///
/// The number of bands read (source selection length, or all source bands)
/// must equal the number written (destination selection length, or
/// `destination_bands`).
///
/// # Errors
///
/// [`LayoutError::BandOutOfRange`], [`LayoutError::DuplicateBand`],
/// [`LayoutError::TooManyBands`] or [`LayoutError::BandCountMismatch`].
pub fn check_band_settings(
    request: &TransformRequest,
    source_bands: usize,
    destination_bands: usize,
) -> Result<(), LayoutError> {
    if let Some(bands) = &request.source_bands {
        check_band_selection(bands, source_bands)?;
    }
    if let Some(bands) = &request.destination_bands {
        check_band_selection(bands, destination_bands)?;
    }
    let read = request.source_bands.as_ref().map_or(source_bands, |b| b.len());
    let written = request
        .destination_bands
        .as_ref()
        .map_or(destination_bands, |b| b.len());
    if request.source_bands.is_none() && written > source_bands {
        return Err(LayoutError::TooManyBands {
            requested: written,
            available: source_bands,
        });
    }
    if read != written {
        return Err(LayoutError::BandCountMismatch {
            source: read,
            destination: written,
        });
    }
    Ok(())
}

fn ceil_div(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

fn to_rect(x: i64, y: i64, w: i64, h: i64) -> Result<Rect, LayoutError> {
    let x = i32::try_from(x).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let y = i32::try_from(y).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let w = u32::try_from(w).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let h = u32::try_from(h).map_err(|_| LayoutError::RegionOutOfBounds)?;
    Ok(Rect::new(x, y, w, h))
}
