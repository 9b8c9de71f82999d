//! Layout reformatting for the codec boundary.
//!
//! [`needs_reformat`] decides whether a raster's storage can be handed to a
//! codec as-is. [`materialize`] either wraps the storage in a zero-copy
//! [`CodecBuffer`] or builds a fresh interleaved (or packed bilevel) copy,
//! applying subsampling and band selection on the way.
//!
//! # Example
//!
//! ```
//! use zenraster::{DataType, Point, Raster, Rect, ReformatOptions, SampleModel, materialize};
//!
//! let model = SampleModel::interleaved(4, 2, DataType::U8, 3).unwrap();
//! let raster = Raster::new(Point::ORIGIN, model, vec![7u8; 24]).unwrap();
//! let view = raster.as_view();
//!
//! // Identity layout: the codec reads the raster's own storage.
//! let direct = materialize(&view, Rect::new(0, 0, 4, 2), None, 1, 1, &ReformatOptions::new())
//!     .unwrap();
//! assert!(direct.is_borrowed());
//!
//! // Swapping bands forces a copy.
//! let swapped = materialize(
//!     &view,
//!     Rect::new(0, 0, 4, 2),
//!     Some(&[2, 1, 0]),
//!     1,
//!     1,
//!     &ReformatOptions::new(),
//! )
//! .unwrap();
//! assert!(!swapped.is_borrowed());
//! ```

use alloc::borrow::Cow;
use alloc::vec;
use alloc::vec::Vec;

use crate::codec::{CodecBuffer, CodecDataType, CodecSamples};
use crate::error::LayoutError;
use crate::geometry::{Point, Rect, subsampled_len};
use crate::raster::{PixelSink, Raster, RasterRef, SampleBuffer, Samples};
use crate::region::source_region_for_write;
use crate::request::{ReformatOptions, TransformRequest, check_band_selection, check_periods};
use crate::sample::{DataType, SampleLayout, SampleModel, is_identity};

/// Whether `model` must be copied before a codec can consume it.
///
/// The first matching rule wins:
///
/// 1. a band selection that is not the identity over all bands;
/// 2. subsampling on either axis;
/// 3. a contiguous interleaved layout with identity band offsets and a
///    codec-supported data type needs no copy;
/// 4. with `allow_packed_bilevel`, a single 1-bit band in a packed bilevel
///    layout needs no copy;
/// 5. anything else needs a copy.
pub fn needs_reformat(
    model: &SampleModel,
    bands: Option<&[usize]>,
    period_x: u32,
    period_y: u32,
    allow_packed_bilevel: bool,
) -> bool {
    let num_bands = model.num_bands();
    if let Some(bands) = bands
        && !is_identity(bands, num_bands)
    {
        return true;
    }
    if period_x != 1 || period_y != 1 {
        return true;
    }
    match model.layout() {
        SampleLayout::Interleaved { .. } => {
            !(model.layout().is_contiguous_interleaved(num_bands)
                && model.data_type().is_codec_supported())
        }
        SampleLayout::PackedBilevel { .. } => {
            !(allow_packed_bilevel && num_bands == 1 && model.sample_sizes()[0] == 1)
        }
    }
}

/// How a reformatted buffer is filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    /// Row-at-a-time subsampling, with band selection folded in.
    Subsample,
    /// All bands, same layout family and element type.
    Direct,
    /// Band-selected or type-converting row copy.
    Banded,
}

/// Produce a codec buffer for `region` of `source`.
///
/// `region` is clipped to the source bounds. When no copy is needed (see
/// [`needs_reformat`]) the result borrows the source's storage, with
/// `offset` (and `bit_offset` for bilevel data) pointing at the region's
/// top-left sample. Otherwise a new buffer of
/// `ceil(width / period_x) × ceil(height / period_y)` pixels is allocated at
/// the origin, 8-bit or 16-bit according to the widest band of the source
/// (selected or not), and filled. Only a single-band 1-bit source is packed.
///
/// # Errors
///
/// [`LayoutError::InvalidPeriod`], band selection errors,
/// [`LayoutError::EmptySourceRegion`] when `region` misses the source,
/// [`LayoutError::UnsupportedBitDepth`] above 16 bits and
/// [`LayoutError::Limit`] when the copy would exceed
/// [`ReformatOptions::limits`]. All are reported before allocating.
pub fn materialize<'a>(
    source: &RasterRef<'a>,
    region: Rect,
    bands: Option<&[usize]>,
    period_x: u32,
    period_y: u32,
    options: &ReformatOptions,
) -> Result<CodecBuffer<'a>, LayoutError> {
    check_periods(period_x, period_y)?;
    if let Some(bands) = bands {
        check_band_selection(bands, source.num_bands())?;
    }
    let region = source
        .bounds()
        .intersection(&region)
        .ok_or(LayoutError::EmptySourceRegion)?;
    let view = source.view(region)?;

    if !needs_reformat(
        source.model(),
        bands,
        period_x,
        period_y,
        options.allow_packed_bilevel,
    ) {
        log::debug!("zero-copy codec buffer for {region:?}");
        return borrow_storage(&view);
    }

    let selected = match bands {
        Some(bands) => view.select_bands(bands)?,
        None => view.clone(),
    };
    let max_bits = source.model().max_sample_size();
    let data_type = DataType::for_bit_depth(max_bits)?;
    let width = subsampled_len(region.width, period_x);
    let height = subsampled_len(region.height, period_y);
    let bilevel = options.allow_packed_bilevel && source.num_bands() == 1 && max_bits == 1;

    options.limits.check_dimensions(width, height)?;
    let dest_model = if bilevel {
        SampleModel::bilevel(width, height)?
    } else {
        SampleModel::interleaved(width, height, data_type, selected.num_bands())?
    };
    let bytes = dest_model.required_len() as u64 * dest_model.data_type().byte_size() as u64;
    options.limits.check_memory(bytes)?;

    let strategy = if period_x != 1 || period_y != 1 {
        Strategy::Subsample
    } else if bands.is_none()
        && source.model().is_packed_bilevel() == dest_model.is_packed_bilevel()
        && source.model().data_type() == dest_model.data_type()
    {
        Strategy::Direct
    } else {
        Strategy::Banded
    };
    log::debug!(
        "reformat {region:?} -> {width}x{height} {} band(s), {:?}{}, {strategy:?}",
        selected.num_bands(),
        data_type,
        if bilevel { " packed" } else { "" },
    );

    let mut dest = Raster::zeroed(Point::ORIGIN, dest_model);
    match strategy {
        Strategy::Subsample => subsample_copy(&view, bands, period_x, period_y, &mut dest)?,
        Strategy::Direct => row_copy(&view, &mut dest)?,
        Strategy::Banded => row_copy(&selected, &mut dest)?,
    }
    into_codec_buffer(dest)
}

/// Source region and codec buffer for writing `image` per `request`.
///
/// The region is the request's source region clipped to the image, with
/// the grid offset skipped; destination offsets and destination bands play
/// no part in encoding.
///
/// # Errors
///
/// As [`source_region_for_write`] and [`materialize`].
pub fn prepare_for_encode<'a>(
    image: &RasterRef<'a>,
    request: &TransformRequest,
    options: &ReformatOptions,
) -> Result<CodecBuffer<'a>, LayoutError> {
    let region = source_region_for_write(image.bounds(), request)?;
    materialize(
        image,
        region,
        request.source_bands.as_deref(),
        request.period_x,
        request.period_y,
        options,
    )
}

/// Wrap a view's storage without copying.
fn borrow_storage<'a>(view: &RasterRef<'a>) -> Result<CodecBuffer<'a>, LayoutError> {
    let model = view.model();
    let (mx, my) = view.model_origin();
    let size = view.bounds().size();
    let (data_type, offset, bit_offset) = match model.layout() {
        SampleLayout::PackedBilevel { .. } => {
            let (byte, bit) = model.bit_position(mx, my);
            (CodecDataType::Bit, byte, bit)
        }
        SampleLayout::Interleaved { .. } => {
            let data_type = match model.data_type() {
                DataType::U16 => CodecDataType::UShort,
                _ => CodecDataType::Byte,
            };
            (data_type, model.element_index(mx, my, 0), 0)
        }
    };
    let samples = match view.samples() {
        Samples::U8(s) => CodecSamples::U8(Cow::Borrowed(s)),
        Samples::U16(s) => CodecSamples::U16(Cow::Borrowed(s)),
        other => return Err(LayoutError::UnsupportedDataType(other.data_type())),
    };
    Ok(CodecBuffer {
        data_type,
        bands: model.num_bands(),
        width: size.width,
        height: size.height,
        stride: model.layout().row_stride(),
        offset,
        bit_offset,
        samples,
    })
}

fn into_codec_buffer(dest: Raster) -> Result<CodecBuffer<'static>, LayoutError> {
    let bilevel = dest.model().is_packed_bilevel();
    let bands = dest.num_bands();
    let stride = dest.model().layout().row_stride();
    let Rect { width, height, .. } = dest.bounds();
    let (data_type, samples) = match dest.into_samples() {
        SampleBuffer::U8(v) if bilevel => (CodecDataType::Bit, CodecSamples::from(v)),
        SampleBuffer::U8(v) => (CodecDataType::Byte, CodecSamples::from(v)),
        SampleBuffer::U16(v) => (CodecDataType::UShort, CodecSamples::from(v)),
        other => return Err(LayoutError::UnsupportedDataType(other.data_type())),
    };
    Ok(CodecBuffer {
        data_type,
        bands,
        width,
        height,
        stride,
        offset: 0,
        bit_offset: 0,
        samples,
    })
}

/// Gather every `period_x`-th pixel of `row`, keeping `bands` (all when
/// `None`) in order, into `out`.
///
/// `row` holds `source_bands` samples per pixel; `out` receives
/// `out.len() / bands.len()` pixels.
pub(crate) fn gather_row(
    row: &[u32],
    source_bands: usize,
    bands: Option<&[usize]>,
    period_x: u32,
    out: &mut [u32],
) {
    let step = source_bands * period_x as usize;
    match bands {
        Some(bands) => {
            for (px, dst) in out.chunks_exact_mut(bands.len()).enumerate() {
                let base = px * step;
                for (slot, &band) in dst.iter_mut().zip(bands) {
                    *slot = row[base + band];
                }
            }
        }
        None => {
            for (px, dst) in out.chunks_exact_mut(source_bands).enumerate() {
                let base = px * step;
                dst.copy_from_slice(&row[base..base + source_bands]);
            }
        }
    }
}

/// Subsampled copy: one full source row is read into a scratch row, then
/// gathered into a second scratch row and stored.
fn subsample_copy(
    view: &RasterRef<'_>,
    bands: Option<&[usize]>,
    period_x: u32,
    period_y: u32,
    dest: &mut Raster,
) -> Result<(), LayoutError> {
    let source_bands = view.num_bands();
    let source_width = view.bounds().width;
    let Rect { width, height, .. } = dest.bounds();
    let dest_bands: Vec<usize> = (0..dest.num_bands()).collect();
    let mut row = vec![0u32; source_width as usize * source_bands];
    let mut packed = vec![0u32; width as usize * dest_bands.len()];
    for y in 0..height {
        view.read_row_into(0, y * period_y, source_width, &mut row);
        gather_row(&row, source_bands, bands, period_x, &mut packed);
        dest.write_bands(0, y as i32, width, 1, &dest_bands, &packed)?;
    }
    Ok(())
}

/// Same-size copy of every band of `view` into `dest`, one row at a time.
fn row_copy(view: &RasterRef<'_>, dest: &mut Raster) -> Result<(), LayoutError> {
    let Rect { width, height, .. } = dest.bounds();
    let dest_bands: Vec<usize> = (0..dest.num_bands()).collect();
    let mut row = vec![0u32; width as usize * dest_bands.len()];
    for y in 0..height {
        view.read_row_into(0, y, width, &mut row);
        dest.write_bands(0, y as i32, width, 1, &dest_bands, &row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{LimitExceeded, ResourceLimits};
    use crate::raster::PixelSource;

    fn rgb8(origin: Point, width: u32, height: u32) -> Raster {
        let model = SampleModel::interleaved(width, height, DataType::U8, 3).unwrap();
        let data: Vec<u8> = (0..model.required_len()).map(|i| i as u8).collect();
        Raster::new(origin, model, data).unwrap()
    }

    fn opts() -> ReformatOptions {
        ReformatOptions::new()
    }

    // ── needs_reformat ──────────────────────────────────────────────────

    #[test]
    fn identity_interleaved_needs_no_copy() {
        let m = SampleModel::interleaved(4, 4, DataType::U8, 3).unwrap();
        assert!(!needs_reformat(&m, None, 1, 1, false));
        assert!(!needs_reformat(&m, Some(&[0, 1, 2]), 1, 1, false));
    }

    #[test]
    fn selections_and_periods_need_copy() {
        let m = SampleModel::interleaved(4, 4, DataType::U8, 3).unwrap();
        assert!(needs_reformat(&m, Some(&[2, 1, 0]), 1, 1, false));
        assert!(needs_reformat(&m, Some(&[0, 1]), 1, 1, false));
        assert!(needs_reformat(&m, None, 2, 1, false));
        // Vertical-only subsampling counts too.
        assert!(needs_reformat(&m, None, 1, 2, false));
    }

    #[test]
    fn non_contiguous_layouts_need_copy() {
        let bgr = SampleModel::new(
            2,
            1,
            DataType::U8,
            vec![8, 8, 8],
            SampleLayout::Interleaved {
                band_offsets: vec![2, 1, 0],
                pixel_stride: 3,
                row_stride: 6,
            },
        )
        .unwrap();
        assert!(needs_reformat(&bgr, None, 1, 1, false));
        let padded = SampleModel::new(
            2,
            1,
            DataType::U8,
            vec![8, 8, 8],
            SampleLayout::Interleaved {
                band_offsets: vec![0, 1, 2],
                pixel_stride: 4,
                row_stride: 8,
            },
        )
        .unwrap();
        assert!(needs_reformat(&padded, None, 1, 1, false));
    }

    #[test]
    fn wide_storage_needs_copy_even_when_contiguous() {
        let m = SampleModel::new(
            2,
            1,
            DataType::U32,
            vec![12],
            SampleLayout::interleaved(1, 2),
        )
        .unwrap();
        assert!(needs_reformat(&m, None, 1, 1, false));
    }

    #[test]
    fn bilevel_needs_copy_unless_allowed() {
        let m = SampleModel::bilevel(9, 2).unwrap();
        assert!(!needs_reformat(&m, None, 1, 1, true));
        assert!(needs_reformat(&m, None, 1, 1, false));
        assert!(needs_reformat(&m, None, 2, 1, true));
    }

    // ── Zero-copy ───────────────────────────────────────────────────────

    #[test]
    fn zero_copy_whole_raster() {
        let r = rgb8(Point::ORIGIN, 4, 3);
        let b = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap();
        assert!(b.is_borrowed());
        assert_eq!(b.data_type, CodecDataType::Byte);
        assert_eq!((b.width, b.height, b.bands), (4, 3, 3));
        assert_eq!(b.stride, 12);
        assert_eq!(b.offset, 0);
    }

    #[test]
    fn zero_copy_sub_region_translates_origin() {
        let r = rgb8(Point::new(10, 20), 4, 3);
        let b = materialize(&r.as_view(), Rect::new(11, 21, 2, 2), None, 1, 1, &opts()).unwrap();
        assert!(b.is_borrowed());
        assert_eq!(b.offset, 12 + 3);
        for y in 0..2 {
            for x in 0..2 {
                for band in 0..3 {
                    assert_eq!(
                        b.sample(x, y, band),
                        r.sample(11 + x as i32, 21 + y as i32, band)
                    );
                }
            }
        }
    }

    #[test]
    fn zero_copy_region_is_clipped() {
        let r = rgb8(Point::ORIGIN, 4, 3);
        let b = materialize(&r.as_view(), Rect::new(2, -5, 10, 6), None, 1, 1, &opts()).unwrap();
        assert_eq!((b.width, b.height), (2, 1));
        assert_eq!(b.offset, 6);
    }

    #[test]
    fn bilevel_zero_copy_bit_offset() {
        let model = SampleModel::new(
            20,
            2,
            DataType::U8,
            vec![1],
            SampleLayout::PackedBilevel {
                bit_offset: 6,
                row_stride: 4,
            },
        )
        .unwrap();
        let data = vec![0x5Au8, 0xC3, 0x0F, 0xF0, 0x96, 0x69, 0xA5, 0x3C];
        let r = Raster::new(Point::ORIGIN, model, data).unwrap();
        let options = opts().with_packed_bilevel(true);
        let b = materialize(&r.as_view(), Rect::new(3, 1, 10, 1), None, 1, 1, &options).unwrap();
        assert!(b.is_borrowed());
        assert_eq!(b.data_type, CodecDataType::Bit);
        // Bit 6 + 3 = 9 of row 1: byte 4 + 1, bit 1.
        assert_eq!(b.offset, 5);
        assert_eq!(b.bit_offset, 1);
        assert_eq!(b.stride, 4);
        for x in 0..10 {
            assert_eq!(b.sample(x, 0, 0), r.sample(3 + x as i32, 1, 0));
        }
    }

    // ── Reformat paths ──────────────────────────────────────────────────

    #[test]
    fn band_permutation_copies() {
        let r = rgb8(Point::ORIGIN, 2, 1);
        let b = materialize(&r.as_view(), r.bounds(), Some(&[2, 0]), 1, 1, &opts()).unwrap();
        assert!(!b.is_borrowed());
        assert_eq!(b.bands, 2);
        assert_eq!(b.stride, 4);
        assert_eq!(b.row_u8(0), Some(&[2u8, 0, 5, 3][..]));
    }

    #[test]
    fn non_identity_offsets_copy_in_band_order() {
        let model = SampleModel::new(
            2,
            1,
            DataType::U8,
            vec![8, 8, 8],
            SampleLayout::Interleaved {
                band_offsets: vec![2, 1, 0],
                pixel_stride: 3,
                row_stride: 6,
            },
        )
        .unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![10u8, 20, 30, 40, 50, 60]).unwrap();
        let b = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap();
        assert_eq!(b.row_u8(0), Some(&[30u8, 20, 10, 60, 50, 40][..]));
    }

    #[test]
    fn subsampling_picks_every_nth_pixel() {
        let r = rgb8(Point::ORIGIN, 5, 3);
        let b = materialize(&r.as_view(), r.bounds(), None, 2, 2, &opts()).unwrap();
        assert_eq!((b.width, b.height), (3, 2));
        assert_eq!(b.stride, 9);
        assert_eq!(b.row_u8(0), Some(&[0u8, 1, 2, 6, 7, 8, 12, 13, 14][..]));
        assert_eq!(b.row_u8(1), Some(&[30u8, 31, 32, 36, 37, 38, 42, 43, 44][..]));
    }

    #[test]
    fn subsampling_with_band_permutation() {
        let r = rgb8(Point::ORIGIN, 5, 1);
        let b = materialize(&r.as_view(), r.bounds(), Some(&[2, 1, 0]), 2, 1, &opts()).unwrap();
        assert_eq!(b.row_u8(0), Some(&[2u8, 1, 0, 8, 7, 6, 14, 13, 12][..]));
    }

    #[test]
    fn subsample_one_equals_banded_copy() {
        let r = rgb8(Point::new(-3, 4), 6, 5);
        let view = r.view(Rect::new(-2, 5, 4, 3)).unwrap();
        let bands = [2, 0];
        let model = || SampleModel::interleaved(4, 3, DataType::U8, 2).unwrap();

        let mut subsampled = Raster::zeroed(Point::ORIGIN, model());
        subsample_copy(&view, Some(&bands), 1, 1, &mut subsampled).unwrap();
        let mut banded = Raster::zeroed(Point::ORIGIN, model());
        row_copy(&view.select_bands(&bands).unwrap(), &mut banded).unwrap();
        assert_eq!(subsampled, banded);
    }

    #[test]
    fn depth_follows_widest_source_band() {
        let model = SampleModel::new(
            2,
            1,
            DataType::U16,
            vec![8, 8, 12],
            SampleLayout::interleaved(3, 2),
        )
        .unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![1u16, 2, 3000, 4, 5, 4000]).unwrap();
        // The unselected 12-bit band still sets the depth.
        let narrow = materialize(&r.as_view(), r.bounds(), Some(&[0, 1]), 1, 1, &opts()).unwrap();
        assert_eq!(narrow.data_type, CodecDataType::UShort);
        assert_eq!(narrow.bands, 2);
        assert_eq!(narrow.row_u16(0), Some(&[1u16, 2, 4, 5][..]));
        let wide = materialize(&r.as_view(), r.bounds(), Some(&[2]), 1, 1, &opts()).unwrap();
        assert_eq!(wide.data_type, CodecDataType::UShort);
        assert_eq!(wide.row_u16(0), Some(&[3000u16, 4000][..]));
    }

    #[test]
    fn deep_unselected_band_rejected() {
        let model = SampleModel::new(
            2,
            1,
            DataType::U32,
            vec![8, 24],
            SampleLayout::interleaved(2, 2),
        )
        .unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![1u32, 1 << 20, 2, 1 << 21]).unwrap();
        let err = materialize(&r.as_view(), r.bounds(), Some(&[0]), 1, 1, &opts()).unwrap_err();
        assert_eq!(err, LayoutError::UnsupportedBitDepth(24));
        let err = materialize(&r.as_view(), r.bounds(), Some(&[0]), 2, 1, &opts()).unwrap_err();
        assert_eq!(err, LayoutError::UnsupportedBitDepth(24));
    }

    #[test]
    fn one_bit_band_of_multi_band_source_not_packed() {
        let model = SampleModel::new(
            4,
            1,
            DataType::U8,
            vec![1, 1],
            SampleLayout::interleaved(2, 4),
        )
        .unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![1u8, 0, 0, 1, 1, 1, 0, 0]).unwrap();
        let options = opts().with_packed_bilevel(true);
        let b = materialize(&r.as_view(), r.bounds(), Some(&[1]), 1, 1, &options).unwrap();
        assert_eq!(b.data_type, CodecDataType::Byte);
        assert!(!b.is_bilevel());
        assert_eq!(b.bands, 1);
        assert_eq!(b.row_u8(0), Some(&[0u8, 1, 1, 0][..]));
    }

    #[test]
    fn wide_storage_narrowed_to_u16() {
        let model = SampleModel::new(
            2,
            1,
            DataType::U32,
            vec![16],
            SampleLayout::interleaved(1, 2),
        )
        .unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![65535u32, 7]).unwrap();
        let b = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap();
        assert_eq!(b.data_type, CodecDataType::UShort);
        assert_eq!(b.row_u16(0), Some(&[65535u16, 7][..]));
    }

    #[test]
    fn deep_samples_rejected() {
        let model = SampleModel::interleaved(2, 1, DataType::U32, 1).unwrap();
        let r = Raster::new(Point::ORIGIN, model, vec![0u32, 0]).unwrap();
        let err = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap_err();
        assert_eq!(err, LayoutError::UnsupportedBitDepth(32));
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn one_bit_band_packed_when_allowed() {
        let model = SampleModel::new(
            10,
            1,
            DataType::U8,
            vec![1],
            SampleLayout::Interleaved {
                band_offsets: vec![0],
                pixel_stride: 2,
                row_stride: 20,
            },
        )
        .unwrap();
        let bits = [1u8, 0, 1, 1, 0, 0, 0, 0, 1, 1];
        let data: Vec<u8> = bits.iter().flat_map(|&b| [b, 9]).collect();
        let r = Raster::new(Point::ORIGIN, model, data).unwrap();

        let packed = materialize(
            &r.as_view(),
            r.bounds(),
            None,
            1,
            1,
            &opts().with_packed_bilevel(true),
        )
        .unwrap();
        assert_eq!(packed.data_type, CodecDataType::Bit);
        assert_eq!(packed.stride, 2);
        assert_eq!(packed.samples, CodecSamples::from(vec![0b1011_0000u8, 0b1100_0000]));

        let bytes = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap();
        assert_eq!(bytes.data_type, CodecDataType::Byte);
        assert_eq!(bytes.row_u8(0), Some(&bits[..]));
    }

    #[test]
    fn bilevel_source_unpacked_when_not_allowed() {
        let r = Raster::new(
            Point::ORIGIN,
            SampleModel::bilevel(4, 1).unwrap(),
            vec![0b1001_0000u8],
        )
        .unwrap();
        let b = materialize(&r.as_view(), r.bounds(), None, 1, 1, &opts()).unwrap();
        assert_eq!(b.data_type, CodecDataType::Byte);
        assert_eq!(b.row_u8(0), Some(&[1u8, 0, 0, 1][..]));
    }

    #[test]
    fn bilevel_subsampled_stays_packed() {
        let r = Raster::new(
            Point::ORIGIN,
            SampleModel::bilevel(8, 1).unwrap(),
            vec![0b1010_1010u8],
        )
        .unwrap();
        let options = opts().with_packed_bilevel(true);
        let b = materialize(&r.as_view(), r.bounds(), None, 2, 1, &options).unwrap();
        assert!(b.is_bilevel());
        assert_eq!(b.width, 4);
        assert_eq!(b.samples, CodecSamples::from(vec![0b1111_0000u8]));
    }

    // ── Errors and limits ───────────────────────────────────────────────

    #[test]
    fn invalid_arguments_fail_before_copy() {
        let r = rgb8(Point::ORIGIN, 4, 4);
        let v = r.as_view();
        assert_eq!(
            materialize(&v, r.bounds(), Some(&[0, 1, 3]), 1, 1, &opts()),
            Err(LayoutError::BandOutOfRange { index: 3, bands: 3 })
        );
        assert_eq!(
            materialize(&v, r.bounds(), Some(&[0, 0, 1]), 1, 1, &opts()),
            Err(LayoutError::DuplicateBand { index: 0 })
        );
        assert_eq!(
            materialize(&v, r.bounds(), Some(&[0, 1, 2, 0]), 1, 1, &opts()),
            Err(LayoutError::TooManyBands {
                requested: 4,
                available: 3
            })
        );
        assert_eq!(
            materialize(&v, Rect::new(10, 10, 2, 2), None, 1, 1, &opts()),
            Err(LayoutError::EmptySourceRegion)
        );
        assert_eq!(
            materialize(&v, r.bounds(), None, 0, 1, &opts()),
            Err(LayoutError::InvalidPeriod { x: 0, y: 1 })
        );
    }

    #[test]
    fn limits_checked_before_allocation() {
        let r = rgb8(Point::ORIGIN, 10, 10);
        let v = r.as_view();
        let options = opts().with_limits(ResourceLimits::none().with_max_pixels(50));
        assert_eq!(
            materialize(&v, r.bounds(), Some(&[0]), 1, 1, &options),
            Err(LayoutError::Limit(LimitExceeded::Pixels {
                requested: 100,
                limit: 50
            }))
        );
        let options = opts().with_limits(ResourceLimits::none().with_max_memory(99));
        assert_eq!(
            materialize(&v, r.bounds(), Some(&[0]), 1, 1, &options),
            Err(LayoutError::Limit(LimitExceeded::Memory {
                requested: 100,
                limit: 99
            }))
        );
        // Subsampling shrinks the allocation under the limit.
        assert!(materialize(&v, r.bounds(), Some(&[0]), 2, 1, &options).is_ok());
        // Zero-copy allocates nothing.
        assert!(materialize(&v, r.bounds(), None, 1, 1, &options).is_ok());
    }

    // ── Encode preparation ──────────────────────────────────────────────

    #[test]
    fn prepare_for_encode_applies_request() {
        let r = rgb8(Point::ORIGIN, 6, 4);
        let request = TransformRequest::new()
            .with_source_region(Rect::new(0, 0, 6, 4))
            .with_subsampling(2, 2, 1, 1)
            .with_source_bands([1]);
        let b = prepare_for_encode(&r.as_view(), &request, &opts()).unwrap();
        // Region (1, 1, 5, 3) → 3 × 2 pixels.
        assert_eq!((b.width, b.height, b.bands), (3, 2, 1));
        let mut px = [0u32; 3];
        r.read_pixels(1, 1, 1, 1, &mut px).unwrap();
        assert_eq!(b.sample(0, 0, 0), px[1]);
        r.read_pixels(5, 3, 1, 1, &mut px).unwrap();
        assert_eq!(b.sample(2, 1, 0), px[1]);
    }

    #[test]
    fn prepare_for_encode_identity_is_zero_copy() {
        let r = rgb8(Point::ORIGIN, 6, 4);
        let b = prepare_for_encode(&r.as_view(), &TransformRequest::new(), &opts()).unwrap();
        assert!(b.is_borrowed());
    }

    #[test]
    fn gather_row_with_and_without_bands() {
        let row: Vec<u32> = (0..12).collect();
        let mut out = [0u32; 6];
        gather_row(&row, 3, None, 2, &mut out);
        assert_eq!(out, [0, 1, 2, 6, 7, 8]);
        let mut out = [0u32; 4];
        gather_row(&row, 3, Some(&[2, 0]), 1, &mut out);
        assert_eq!(out, [2, 0, 5, 3]);
    }
}
