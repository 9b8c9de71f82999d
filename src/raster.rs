//! Banded rasters: sample storage plus a [`SampleModel`] and bounds.
//!
//! [`Raster`] owns its samples; [`RasterRef`] is a borrowed child view over
//! a sub-region and optionally a subset of bands. Pixel access goes through
//! [`PixelSource`] and [`PixelSink`], which move samples as `u32` values in
//! band-interleaved order.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use imgref::ImgRef;
use rgb::{Rgb, Rgba};

use crate::error::LayoutError;
use crate::geometry::{Point, Rect};
use crate::request::check_band_selection;
use crate::sample::{DataType, SampleLayout, SampleModel};

// ---------------------------------------------------------------------------
// Sample storage
// ---------------------------------------------------------------------------

/// Owned backing array of a [`Raster`].
#[derive(Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleBuffer {
    /// Byte elements.
    U8(Vec<u8>),
    /// 16-bit elements.
    U16(Vec<u16>),
    /// 32-bit elements.
    U32(Vec<u32>),
}

impl SampleBuffer {
    /// A zero-filled buffer of `len` elements.
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => Self::U8(vec![0; len]),
            DataType::U16 => Self::U16(vec![0; len]),
            DataType::U32 => Self::U32(vec![0; len]),
        }
    }

    /// Element type.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::U32(_) => DataType::U32,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.as_samples().len()
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the elements.
    pub fn as_samples(&self) -> Samples<'_> {
        match self {
            Self::U8(v) => Samples::U8(v),
            Self::U16(v) => Samples::U16(v),
            Self::U32(v) => Samples::U32(v),
        }
    }

    fn put(&mut self, index: usize, value: u32) {
        // Narrowing keeps the low bits, like a store into a narrower array.
        match self {
            Self::U8(v) => v[index] = value as u8,
            Self::U16(v) => v[index] = value as u16,
            Self::U32(v) => v[index] = value,
        }
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SampleBuffer({:?} x {})", self.data_type(), self.len())
    }
}

impl From<Vec<u8>> for SampleBuffer {
    fn from(v: Vec<u8>) -> Self {
        Self::U8(v)
    }
}

impl From<Vec<u16>> for SampleBuffer {
    fn from(v: Vec<u16>) -> Self {
        Self::U16(v)
    }
}

impl From<Vec<u32>> for SampleBuffer {
    fn from(v: Vec<u32>) -> Self {
        Self::U32(v)
    }
}

/// Borrowed backing array.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Samples<'a> {
    /// Byte elements.
    U8(&'a [u8]),
    /// 16-bit elements.
    U16(&'a [u16]),
    /// 32-bit elements.
    U32(&'a [u32]),
}

impl<'a> Samples<'a> {
    /// Element type.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::U32(_) => DataType::U32,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(s) => s.len(),
            Self::U16(s) => s.len(),
            Self::U32(s) => s.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index`, widened.
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        match self {
            Self::U8(s) => u32::from(s[index]),
            Self::U16(s) => u32::from(s[index]),
            Self::U32(s) => s[index],
        }
    }
}

impl fmt::Debug for Samples<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Samples({:?} x {})", self.data_type(), self.len())
    }
}

/// Value of band `band` at model coordinates `(mx, my)`.
#[inline]
fn sample_at(model: &SampleModel, data: Samples<'_>, mx: u32, my: u32, band: usize) -> u32 {
    if model.is_packed_bilevel() {
        let (byte, bit) = model.bit_position(mx, my);
        (data.get(byte) >> (7 - bit)) & 1
    } else {
        data.get(model.element_index(mx, my, band))
    }
}

fn check_storage(model: &SampleModel, data: Samples<'_>) -> Result<(), LayoutError> {
    if data.data_type() != model.data_type() {
        return Err(LayoutError::LayoutMismatch(
            "storage type differs from the sample model",
        ));
    }
    let required = model.required_len();
    if data.len() < required {
        return Err(LayoutError::InsufficientData {
            required,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Offset of `region` from the origin of `bounds`, or an error when
/// `region` is empty or not contained in `bounds`.
fn region_offset(bounds: Rect, region: Rect) -> Result<(u32, u32), LayoutError> {
    if region.is_empty() || !bounds.contains(&region) {
        return Err(LayoutError::RegionOutOfBounds);
    }
    // contains() guarantees both differences are non-negative.
    Ok((
        (i64::from(region.x) - i64::from(bounds.x)) as u32,
        (i64::from(region.y) - i64::from(bounds.y)) as u32,
    ))
}

fn check_transfer_len(width: u32, rows: u32, bands: usize, len: usize) -> Result<(), LayoutError> {
    let required = width as usize * rows as usize * bands;
    if len < required {
        return Err(LayoutError::InsufficientData {
            required,
            actual: len,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PixelSource / PixelSink
// ---------------------------------------------------------------------------

/// Something pixels can be read from, in absolute coordinates.
pub trait PixelSource {
    /// Bounds of the readable area.
    fn bounds(&self) -> Rect;

    /// Number of bands per pixel.
    fn num_bands(&self) -> usize;

    /// Read `width × rows` pixels with top-left corner `(x, y)` into `out`,
    /// band-interleaved, row-major.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RegionOutOfBounds`] when the area is empty or leaves
    /// [`bounds`](Self::bounds), [`LayoutError::InsufficientData`] when `out`
    /// is too short.
    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        out: &mut [u32],
    ) -> Result<(), LayoutError>;
}

/// Something pixels can be written to, in absolute coordinates.
pub trait PixelSink {
    /// Bounds of the writable area.
    fn bounds(&self) -> Rect;

    /// Number of bands per pixel.
    fn num_bands(&self) -> usize;

    /// Write `width × rows` pixels of `bands.len()` samples each into the
    /// listed bands; other bands are left untouched.
    ///
    /// # Errors
    ///
    /// Region and length errors as [`PixelSource::read_pixels`], plus band
    /// selection errors.
    fn write_bands(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        bands: &[usize],
        samples: &[u32],
    ) -> Result<(), LayoutError>;

    /// Write all bands of `width × rows` pixels.
    ///
    /// # Errors
    ///
    /// As [`write_bands`](Self::write_bands).
    fn write_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        samples: &[u32],
    ) -> Result<(), LayoutError> {
        let all: Vec<usize> = (0..self.num_bands()).collect();
        self.write_bands(x, y, width, rows, &all, samples)
    }
}

// ---------------------------------------------------------------------------
// Raster (owned)
// ---------------------------------------------------------------------------

/// Owned raster: bounds, sample model and storage.
///
/// The model covers exactly the bounds; pixel `(bounds.x, bounds.y)` is
/// model pixel `(0, 0)`.
///
/// # Example
///
/// ```
/// use zenraster::{DataType, Point, PixelSource, Raster, SampleModel};
///
/// let model = SampleModel::interleaved(2, 1, DataType::U8, 3).unwrap();
/// let raster = Raster::new(Point::new(10, 5), model, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
///
/// let mut px = [0u32; 3];
/// raster.read_pixels(11, 5, 1, 1, &mut px).unwrap();
/// assert_eq!(px, [4, 5, 6]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    bounds: Rect,
    model: SampleModel,
    data: SampleBuffer,
}

impl Raster {
    /// Wrap `data` laid out per `model`, with the top-left pixel at `origin`.
    ///
    /// # Errors
    ///
    /// [`LayoutError::LayoutMismatch`] when the storage type differs from
    /// the model's, [`LayoutError::InsufficientData`] when it is too short.
    pub fn new(
        origin: Point,
        model: SampleModel,
        data: impl Into<SampleBuffer>,
    ) -> Result<Self, LayoutError> {
        let data = data.into();
        check_storage(&model, data.as_samples())?;
        Ok(Self {
            bounds: Rect::new(origin.x, origin.y, model.width(), model.height()),
            model,
            data,
        })
    }

    /// A zero-filled raster for `model`.
    pub fn zeroed(origin: Point, model: SampleModel) -> Self {
        let data = SampleBuffer::zeroed(model.data_type(), model.required_len());
        Self {
            bounds: Rect::new(origin.x, origin.y, model.width(), model.height()),
            model,
            data,
        }
    }

    /// Bounds in absolute coordinates.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Sample model.
    #[inline]
    pub fn model(&self) -> &SampleModel {
        &self.model
    }

    /// Number of bands.
    #[inline]
    pub fn num_bands(&self) -> usize {
        self.model.num_bands()
    }

    /// Backing storage.
    #[inline]
    pub fn samples(&self) -> Samples<'_> {
        self.data.as_samples()
    }

    /// Consume the raster and return its storage.
    pub fn into_samples(self) -> SampleBuffer {
        self.data
    }

    /// Borrow the whole raster as a view.
    pub fn as_view(&self) -> RasterRef<'_> {
        RasterRef {
            bounds: self.bounds,
            model: self.model.clone(),
            model_x: 0,
            model_y: 0,
            data: self.data.as_samples(),
        }
    }

    /// Zero-copy child view of `region`, which keeps absolute coordinates.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RegionOutOfBounds`] when `region` is empty or not
    /// inside [`bounds`](Self::bounds).
    pub fn view(&self, region: Rect) -> Result<RasterRef<'_>, LayoutError> {
        self.as_view().view(region)
    }

    /// Sample of `band` at absolute `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the pixel is outside the bounds or `band` is out of range.
    pub fn sample(&self, x: i32, y: i32, band: usize) -> u32 {
        self.as_view().sample(x, y, band)
    }

    fn put(&mut self, mx: u32, my: u32, band: usize, value: u32) {
        if self.model.is_packed_bilevel() {
            let (byte, bit) = self.model.bit_position(mx, my);
            if let SampleBuffer::U8(v) = &mut self.data {
                let mask = 0x80u8 >> bit;
                if value & 1 != 0 {
                    v[byte] |= mask;
                } else {
                    v[byte] &= !mask;
                }
            }
        } else {
            let index = self.model.element_index(mx, my, band);
            self.data.put(index, value);
        }
    }
}

impl PixelSource for Raster {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn num_bands(&self) -> usize {
        self.model.num_bands()
    }

    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        out: &mut [u32],
    ) -> Result<(), LayoutError> {
        self.as_view().read_pixels(x, y, width, rows, out)
    }
}

impl PixelSink for Raster {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn num_bands(&self) -> usize {
        self.model.num_bands()
    }

    fn write_bands(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        bands: &[usize],
        samples: &[u32],
    ) -> Result<(), LayoutError> {
        let (ox, oy) = region_offset(self.bounds, Rect::new(x, y, width, rows))?;
        check_band_selection(bands, self.model.num_bands())?;
        check_transfer_len(width, rows, bands.len(), samples.len())?;
        let mut values = samples.iter();
        for row in 0..rows {
            for col in 0..width {
                for &band in bands {
                    if let Some(&v) = values.next() {
                        self.put(ox + col, oy + row, band, v);
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Raster({:?}, {} bands {:?})",
            self.bounds,
            self.model.num_bands(),
            self.model.data_type()
        )
    }
}

// ---------------------------------------------------------------------------
// RasterRef (borrowed child view)
// ---------------------------------------------------------------------------

/// Borrowed view of a region (and possibly a band subset) of a raster.
///
/// Absolute pixel `(bounds.x + i, bounds.y + j)` is model pixel
/// `(model_x + i, model_y + j)` of the shared storage.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterRef<'a> {
    bounds: Rect,
    model: SampleModel,
    model_x: u32,
    model_y: u32,
    data: Samples<'a>,
}

impl<'a> RasterRef<'a> {
    /// View `data` laid out per `model`, with the top-left pixel at `origin`.
    ///
    /// # Errors
    ///
    /// As [`Raster::new`].
    pub fn new(origin: Point, model: SampleModel, data: Samples<'a>) -> Result<Self, LayoutError> {
        check_storage(&model, data)?;
        Ok(Self {
            bounds: Rect::new(origin.x, origin.y, model.width(), model.height()),
            model,
            model_x: 0,
            model_y: 0,
            data,
        })
    }

    /// Bounds in absolute coordinates.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Sample model of the underlying storage.
    #[inline]
    pub fn model(&self) -> &SampleModel {
        &self.model
    }

    /// Model coordinates of this view's top-left pixel.
    #[inline]
    pub fn model_origin(&self) -> (u32, u32) {
        (self.model_x, self.model_y)
    }

    /// Underlying storage, shared with the parent.
    #[inline]
    pub fn samples(&self) -> Samples<'a> {
        self.data
    }

    /// Number of bands visible through this view.
    #[inline]
    pub fn num_bands(&self) -> usize {
        self.model.num_bands()
    }

    /// Narrower child view of `region`.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RegionOutOfBounds`] when `region` is empty or not
    /// inside this view.
    pub fn view(&self, region: Rect) -> Result<RasterRef<'a>, LayoutError> {
        let (dx, dy) = region_offset(self.bounds, region)?;
        Ok(RasterRef {
            bounds: region,
            model: self.model.clone(),
            model_x: self.model_x + dx,
            model_y: self.model_y + dy,
            data: self.data,
        })
    }

    /// Child view exposing only `bands`, in that order.
    ///
    /// # Errors
    ///
    /// Band selection errors from [`SampleModel::select_bands`] and
    /// duplicate indices.
    pub fn select_bands(&self, bands: &[usize]) -> Result<RasterRef<'a>, LayoutError> {
        check_band_selection(bands, self.model.num_bands())?;
        Ok(RasterRef {
            bounds: self.bounds,
            model: self.model.select_bands(bands)?,
            model_x: self.model_x,
            model_y: self.model_y,
            data: self.data,
        })
    }

    /// Sample of `band` at absolute `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the pixel is outside the bounds or `band` is out of range.
    pub fn sample(&self, x: i32, y: i32, band: usize) -> u32 {
        let (ox, oy) = match region_offset(self.bounds, Rect::new(x, y, 1, 1)) {
            Ok(o) => o,
            Err(_) => panic!("pixel ({x}, {y}) outside {:?}", self.bounds),
        };
        assert!(
            band < self.num_bands(),
            "band {band} out of range for {} bands",
            self.num_bands()
        );
        sample_at(
            &self.model,
            self.data,
            self.model_x + ox,
            self.model_y + oy,
            band,
        )
    }

    /// Read one row of `width` pixels starting at view-relative column `col`
    /// of view-relative row `row`. Bounds are checked by the caller.
    pub(crate) fn read_row_into(&self, col: u32, row: u32, width: u32, out: &mut [u32]) {
        let bands = self.num_bands();
        let my = self.model_y + row;
        if let SampleLayout::Interleaved { .. } = self.model.layout() {
            for (i, px) in out.chunks_exact_mut(bands).take(width as usize).enumerate() {
                let mx = self.model_x + col + i as u32;
                for (band, slot) in px.iter_mut().enumerate() {
                    *slot = self.data.get(self.model.element_index(mx, my, band));
                }
            }
        } else {
            for (i, slot) in out.iter_mut().take(width as usize).enumerate() {
                *slot = sample_at(&self.model, self.data, self.model_x + col + i as u32, my, 0);
            }
        }
    }
}

impl PixelSource for RasterRef<'_> {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn num_bands(&self) -> usize {
        self.model.num_bands()
    }

    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: u32,
        rows: u32,
        out: &mut [u32],
    ) -> Result<(), LayoutError> {
        let (ox, oy) = region_offset(self.bounds, Rect::new(x, y, width, rows))?;
        let bands = self.num_bands();
        check_transfer_len(width, rows, bands, out.len())?;
        let row_len = width as usize * bands;
        for (row, chunk) in out.chunks_exact_mut(row_len).take(rows as usize).enumerate() {
            self.read_row_into(ox, oy + row as u32, width, chunk);
        }
        Ok(())
    }
}

impl fmt::Debug for RasterRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RasterRef({:?} at model ({}, {}), {} bands {:?})",
            self.bounds,
            self.model_x,
            self.model_y,
            self.model.num_bands(),
            self.model.data_type()
        )
    }
}

// ---------------------------------------------------------------------------
// ImgRef → Raster (TryFrom, always copies)
// ---------------------------------------------------------------------------

macro_rules! impl_from_imgref {
    ($pixel:ident, $component:ty, $data_type:expr, [$($field:ident),+]) => {
        impl<'a> TryFrom<ImgRef<'a, $pixel<$component>>> for Raster {
            type Error = LayoutError;

            fn try_from(img: ImgRef<'a, $pixel<$component>>) -> Result<Self, LayoutError> {
                let bands = [$(stringify!($field)),+].len();
                let model = SampleModel::interleaved(
                    img.width() as u32,
                    img.height() as u32,
                    $data_type,
                    bands,
                )?;
                let mut data: Vec<$component> = Vec::with_capacity(model.required_len());
                for row in img.rows() {
                    for px in row {
                        $(data.push(px.$field);)+
                    }
                }
                Raster::new(Point::ORIGIN, model, data)
            }
        }
    };
}

impl_from_imgref!(Rgb, u8, DataType::U8, [r, g, b]);
impl_from_imgref!(Rgba, u8, DataType::U8, [r, g, b, a]);
impl_from_imgref!(Rgb, u16, DataType::U16, [r, g, b]);
impl_from_imgref!(Rgba, u16, DataType::U16, [r, g, b, a]);
