//! Codestream read driver.
//!
//! Bitstream parsing, entropy decoding and wavelet synthesis live behind
//! [`CodestreamDecoder`]. This module chains a decoder to the region
//! resolver: header, region resolution, band validation, then one
//! destination row at a time: decode a source row, compact it (column
//! subsampling and band selection) and store it. The stop token is checked
//! before every row.
//!
//! ```text
//! read_header() ──→ resolve_regions() ──→ check_band_settings()
//!                                            │
//!          ┌─────────────── per destination row ───────────────┐
//!          │ stop.check() → decode_row() → compact → write_bands │
//!          └─────────────────────────────────────────────────────┘
//! ```

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use enough::{Stop, StopReason};

use crate::error::LayoutError;
use crate::geometry::{Point, Rect, Size};
use crate::limits::LimitExceeded;
use crate::raster::{PixelSink, Raster};
use crate::reformat::gather_row;
use crate::region::{DestinationPlacement, ResolvedRegions, check_band_settings, resolve_regions};
use crate::request::{ReformatOptions, TransformRequest};
use crate::sample::{DataType, SampleLayout, SampleModel};

// ---------------------------------------------------------------------------
// Header types
// ---------------------------------------------------------------------------

/// Tile layout of a codestream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileGrid {
    /// Position of the top-left corner of tile `(0, 0)`.
    pub offset: Point,
    /// Nominal tile width.
    pub tile_width: u32,
    /// Nominal tile height.
    pub tile_height: u32,
}

impl TileGrid {
    /// One tile covering an image of `size`.
    pub const fn single(size: Size) -> Self {
        Self {
            offset: Point::ORIGIN,
            tile_width: size.width,
            tile_height: size.height,
        }
    }

    /// Whether an image of `size` spans more than one tile.
    pub fn is_tiled(&self, size: Size) -> bool {
        self.tiles_across(size.width) > 1 || self.tiles_down(size.height) > 1
    }

    /// Number of tile columns covering `width` pixels from the origin.
    pub fn tiles_across(&self, width: u32) -> u32 {
        tile_count(self.offset.x, self.tile_width, width)
    }

    /// Number of tile rows covering `height` pixels from the origin.
    pub fn tiles_down(&self, height: u32) -> u32 {
        tile_count(self.offset.y, self.tile_height, height)
    }
}

fn tile_count(offset: i32, tile: u32, extent: u32) -> u32 {
    if tile == 0 || extent == 0 {
        return 0;
    }
    // Tiles start at `offset + k * tile`; count those overlapping [0, extent).
    let tile = i64::from(tile);
    let first = (-i64::from(offset)).div_euclid(tile);
    let last = (i64::from(extent) - 1 - i64::from(offset)).div_euclid(tile);
    (last - first + 1) as u32
}

/// What [`CodestreamDecoder::read_header`] reports.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct CodestreamInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Tile layout.
    pub tiles: TileGrid,
    /// Significant bits of each component; the length is the band count.
    pub sample_sizes: Vec<u8>,
}

impl CodestreamInfo {
    /// Untiled image with the given component depths.
    pub fn new(width: u32, height: u32, sample_sizes: impl Into<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            tiles: TileGrid::single(Size::new(width, height)),
            sample_sizes: sample_sizes.into(),
        }
    }

    /// Set the tile layout.
    pub fn with_tiles(mut self, tiles: TileGrid) -> Self {
        self.tiles = tiles;
        self
    }

    /// Image bounds, anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Number of components.
    pub fn num_bands(&self) -> usize {
        self.sample_sizes.len()
    }

    /// Whether the image spans more than one tile.
    pub fn is_tiled(&self) -> bool {
        self.tiles.is_tiled(Size::new(self.width, self.height))
    }
}

// ---------------------------------------------------------------------------
// Decoder trait
// ---------------------------------------------------------------------------

/// Source of decoded codestream samples.
///
/// Implementations own the bitstream and produce pixel samples on demand.
pub trait CodestreamDecoder {
    /// The decoder's error type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Parse the main header.
    fn read_header(&mut self) -> Result<CodestreamInfo, Self::Error>;

    /// Decode `width` pixels of row `y` starting at column `x` into `out`,
    /// all components interleaved.
    ///
    /// `out` holds exactly `width × num_bands` samples.
    fn decode_row(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        out: &mut [u32],
    ) -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// ReadError
// ---------------------------------------------------------------------------

/// Errors from [`read_region`] and [`read_into`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ReadError<E> {
    /// Region, band or limit validation failed.
    Layout(LayoutError),
    /// The decoder failed.
    Decoder(E),
    /// The stop token fired between rows.
    Stopped(StopReason),
}

impl<E: fmt::Display> fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(e) => write!(f, "{e}"),
            Self::Decoder(e) => write!(f, "decoder error: {e}"),
            Self::Stopped(reason) => write!(f, "stopped: {reason}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for ReadError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Layout(e) => Some(e),
            Self::Decoder(e) => Some(e),
            Self::Stopped(_) => None,
        }
    }
}

impl<E> From<LayoutError> for ReadError<E> {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl<E> From<LimitExceeded> for ReadError<E> {
    fn from(e: LimitExceeded) -> Self {
        Self::Layout(LayoutError::Limit(e))
    }
}

impl<E> From<StopReason> for ReadError<E> {
    fn from(reason: StopReason) -> Self {
        Self::Stopped(reason)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Decode the region described by `request` into a new raster.
///
/// The raster is anchored at the origin and sized to hold the destination
/// region at its (clipped) destination offset. It has one band per selected
/// source band, 8 or 16 bits wide according to the deepest component of the
/// codestream, selected or not.
///
/// # Errors
///
/// [`ReadError::Layout`] for invalid requests, unsupported depths and
/// exceeded limits (all before allocating), [`ReadError::Decoder`] when the
/// decoder fails and [`ReadError::Stopped`] when `stop` fires.
pub fn read_region<D: CodestreamDecoder + ?Sized>(
    decoder: &mut D,
    request: &TransformRequest,
    options: &ReformatOptions,
    stop: &dyn Stop,
) -> Result<Raster, ReadError<D::Error>> {
    let info = decoder.read_header().map_err(ReadError::Decoder)?;
    let source_bands = info.num_bands();
    let read_bands = request.source_bands.as_ref().map_or(source_bands, Vec::len);
    check_band_settings(request, source_bands, read_bands)?;
    let regions = resolve_regions(
        info.bounds(),
        request,
        &DestinationPlacement::none(),
        options,
    )?;

    // Sizes in read order, then moved to their destination band.
    let read_sizes: Vec<u8> = match &request.source_bands {
        Some(bands) => bands.iter().map(|&b| info.sample_sizes[b]).collect(),
        None => info.sample_sizes.clone(),
    };
    let sample_sizes = match &request.destination_bands {
        Some(bands) => {
            let mut sizes = vec![0u8; read_bands];
            for (&band, &size) in bands.iter().zip(&read_sizes) {
                sizes[band] = size;
            }
            sizes
        }
        None => read_sizes,
    };
    // Depth follows the deepest component in the codestream, read or not.
    let max_bits = info.sample_sizes.iter().copied().max().unwrap_or(0);
    let data_type = DataType::for_bit_depth(max_bits)?;
    let dest = regions.destination;
    let width = u32::try_from(dest.right()).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let height = u32::try_from(dest.bottom()).map_err(|_| LayoutError::RegionOutOfBounds)?;
    options.limits.check_dimensions(width, height)?;
    let model = SampleModel::new(
        width,
        height,
        data_type,
        sample_sizes,
        SampleLayout::interleaved(read_bands, width),
    )?;
    options
        .limits
        .check_memory(model.required_len() as u64 * data_type.byte_size() as u64)?;

    let mut raster = Raster::zeroed(Point::ORIGIN, model);
    decode_rows(decoder, &info, request, regions, &mut raster, Point::ORIGIN, stop)?;
    Ok(raster)
}

/// Decode the region described by `request` into an existing sink.
///
/// Destination coordinates are relative to the sink's top-left corner, and
/// the sink's size clips the destination region. Returns the regions that
/// were used.
///
/// # Errors
///
/// As [`read_region`]; additionally the sink's band count must match the
/// request's destination band selection.
pub fn read_into<D, S>(
    decoder: &mut D,
    request: &TransformRequest,
    sink: &mut S,
    options: &ReformatOptions,
    stop: &dyn Stop,
) -> Result<ResolvedRegions, ReadError<D::Error>>
where
    D: CodestreamDecoder + ?Sized,
    S: PixelSink + ?Sized,
{
    let info = decoder.read_header().map_err(ReadError::Decoder)?;
    check_band_settings(request, info.num_bands(), sink.num_bands())?;
    let bounds = sink.bounds();
    let regions = resolve_regions(
        info.bounds(),
        request,
        &DestinationPlacement::image(bounds.size()),
        options,
    )?;
    decode_rows(
        decoder,
        &info,
        request,
        regions,
        sink,
        bounds.origin(),
        stop,
    )?;
    Ok(regions)
}

fn decode_rows<D, S>(
    decoder: &mut D,
    info: &CodestreamInfo,
    request: &TransformRequest,
    regions: ResolvedRegions,
    sink: &mut S,
    sink_origin: Point,
    stop: &dyn Stop,
) -> Result<(), ReadError<D::Error>>
where
    D: CodestreamDecoder + ?Sized,
    S: PixelSink + ?Sized,
{
    let ResolvedRegions {
        source,
        destination,
    } = regions;
    let source_bands = info.num_bands();
    let bands = request.source_bands.as_deref();
    let read_bands = bands.map_or(source_bands, <[usize]>::len);
    let dest_bands: Vec<usize> = match &request.destination_bands {
        Some(b) => b.clone(),
        None => (0..read_bands).collect(),
    };

    // Resolved source regions lie inside the image, which starts at 0.
    let source_x = u32::try_from(source.x).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let source_y = u32::try_from(source.y).map_err(|_| LayoutError::RegionOutOfBounds)?;
    let out_x = i64::from(sink_origin.x) + i64::from(destination.x);
    let out_y = i64::from(sink_origin.y) + i64::from(destination.y);
    let out_x = i32::try_from(out_x).map_err(|_| LayoutError::RegionOutOfBounds)?;

    log::debug!(
        "decoding {source:?} -> {destination:?} ({} of {source_bands} bands, {} tile(s))",
        read_bands,
        info.tiles.tiles_across(info.width) * info.tiles.tiles_down(info.height)
    );

    let mut row = vec![0u32; source.width as usize * source_bands];
    let mut packed = vec![0u32; destination.width as usize * read_bands];
    for j in 0..destination.height {
        stop.check()?;
        let y = source_y + j * request.period_y;
        decoder
            .decode_row(source_x, y, source.width, &mut row)
            .map_err(ReadError::Decoder)?;
        gather_row(&row, source_bands, bands, request.period_x, &mut packed);
        let dest_y = i32::try_from(out_y + i64::from(j))
            .map_err(|_| LayoutError::RegionOutOfBounds)?;
        sink.write_bands(out_x, dest_y, destination.width, 1, &dest_bands, &packed)?;
        log::trace!("row {j} of {} from source row {y}", destination.height);
    }
    Ok(())
}
