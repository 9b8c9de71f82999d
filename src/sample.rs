//! Sample models: how pixel samples are laid out in a backing array.
//!
//! A [`SampleModel`] describes a `width × height` grid of pixels stored in
//! a flat array of [`DataType`] elements. The [`SampleLayout`] tag says how
//! a `(x, y, band)` triple maps to an element (or, for bilevel data, to a
//! single bit of a byte).

use alloc::vec::Vec;

use crate::error::LayoutError;

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// Storage type of one element of the backing array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DataType {
    /// 8-bit unsigned integer.
    U8 = 1,
    /// 16-bit unsigned integer.
    U16 = 2,
    /// 32-bit unsigned integer. Never accepted at the codec boundary.
    U32 = 4,
}

impl DataType {
    /// Byte size of one element.
    #[inline]
    pub const fn byte_size(self) -> usize {
        self as usize
    }

    /// Bit width of one element.
    #[inline]
    pub const fn bits(self) -> u8 {
        (self as u8) * 8
    }

    /// Whether codecs accept this type directly.
    #[inline]
    pub const fn is_codec_supported(self) -> bool {
        matches!(self, Self::U8 | Self::U16)
    }

    /// Smallest codec-supported type that holds `bits`-bit samples.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnsupportedBitDepth`] above 16 bits.
    pub fn for_bit_depth(bits: u8) -> Result<Self, LayoutError> {
        if bits <= 8 {
            Ok(Self::U8)
        } else if bits <= 16 {
            Ok(Self::U16)
        } else {
            Err(LayoutError::UnsupportedBitDepth(bits))
        }
    }
}

// ---------------------------------------------------------------------------
// SampleLayout
// ---------------------------------------------------------------------------

/// Element addressing scheme of a [`SampleModel`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleLayout {
    /// One element per sample.
    ///
    /// Sample `(x, y, b)` lives at
    /// `y * row_stride + x * pixel_stride + band_offsets[b]`.
    Interleaved {
        /// Element offset of each band within a pixel.
        band_offsets: Vec<usize>,
        /// Elements between horizontally adjacent pixels.
        pixel_stride: usize,
        /// Elements between vertically adjacent pixels.
        row_stride: usize,
    },
    /// One bit per pixel, single band, most significant bit first.
    ///
    /// Pixel `(x, y)` lives in byte `y * row_stride + (bit_offset + x) / 8`
    /// at bit `7 - (bit_offset + x) % 8`.
    PackedBilevel {
        /// Bit position of pixel `(0, 0)` counted from the start of the array.
        bit_offset: usize,
        /// Bytes between vertically adjacent pixels.
        row_stride: usize,
    },
}

impl SampleLayout {
    /// Tightly packed pixel-interleaved layout with band offsets `0..bands`.
    pub fn interleaved(bands: usize, width: u32) -> Self {
        Self::Interleaved {
            band_offsets: (0..bands).collect(),
            pixel_stride: bands,
            row_stride: width as usize * bands,
        }
    }

    /// Tightly packed bilevel layout starting at bit 0.
    pub fn packed_bilevel(width: u32) -> Self {
        Self::PackedBilevel {
            bit_offset: 0,
            row_stride: (width as usize).div_ceil(8),
        }
    }

    /// Elements (bytes, for bilevel) between vertically adjacent pixels.
    pub fn row_stride(&self) -> usize {
        match self {
            Self::Interleaved { row_stride, .. } | Self::PackedBilevel { row_stride, .. } => {
                *row_stride
            }
        }
    }

    /// Whether this is an interleaved layout whose pixels are contiguous runs
    /// of `bands` samples in band order, which is what codecs consume.
    pub fn is_contiguous_interleaved(&self, bands: usize) -> bool {
        match self {
            Self::Interleaved {
                band_offsets,
                pixel_stride,
                ..
            } => *pixel_stride == bands && is_identity(band_offsets, bands),
            Self::PackedBilevel { .. } => false,
        }
    }
}

/// Whether `seq` is exactly `0, 1, .., len - 1`.
pub(crate) fn is_identity(seq: &[usize], len: usize) -> bool {
    seq.len() == len && seq.iter().enumerate().all(|(i, &v)| v == i)
}

// ---------------------------------------------------------------------------
// SampleModel
// ---------------------------------------------------------------------------

/// Geometry, depth and layout of a backing sample array.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleModel {
    width: u32,
    height: u32,
    data_type: DataType,
    sample_sizes: Vec<u8>,
    layout: SampleLayout,
}

impl SampleModel {
    /// Create a sample model with validation.
    ///
    /// `sample_sizes` holds the significant bits of each band; its length is
    /// the band count.
    ///
    /// # Errors
    ///
    /// [`LayoutError::EmptySource`] for zero dimensions, and
    /// [`LayoutError::LayoutMismatch`] when the sizes, the data type and the
    /// layout contradict each other.
    pub fn new(
        width: u32,
        height: u32,
        data_type: DataType,
        sample_sizes: Vec<u8>,
        layout: SampleLayout,
    ) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::EmptySource);
        }
        if sample_sizes.is_empty() {
            return Err(LayoutError::LayoutMismatch("no bands"));
        }
        if sample_sizes
            .iter()
            .any(|&s| s == 0 || s > data_type.bits())
        {
            return Err(LayoutError::LayoutMismatch(
                "sample size is zero or wider than the data type",
            ));
        }
        match &layout {
            SampleLayout::Interleaved {
                band_offsets,
                pixel_stride,
                ..
            } => {
                if band_offsets.len() != sample_sizes.len() {
                    return Err(LayoutError::LayoutMismatch(
                        "band offset count differs from band count",
                    ));
                }
                if *pixel_stride == 0 {
                    return Err(LayoutError::LayoutMismatch("pixel stride is zero"));
                }
            }
            SampleLayout::PackedBilevel { row_stride, .. } => {
                if sample_sizes.as_slice() != [1] {
                    return Err(LayoutError::LayoutMismatch(
                        "packed bilevel layout needs exactly one 1-bit band",
                    ));
                }
                if data_type != DataType::U8 {
                    return Err(LayoutError::LayoutMismatch(
                        "packed bilevel layout needs byte storage",
                    ));
                }
                if row_stride.saturating_mul(8) < width as usize {
                    return Err(LayoutError::LayoutMismatch(
                        "row stride too small for packed bilevel width",
                    ));
                }
            }
        }
        Ok(Self {
            width,
            height,
            data_type,
            sample_sizes,
            layout,
        })
    }

    /// Tightly packed pixel-interleaved model using the full element width
    /// for every band.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn interleaved(
        width: u32,
        height: u32,
        data_type: DataType,
        bands: usize,
    ) -> Result<Self, LayoutError> {
        Self::new(
            width,
            height,
            data_type,
            alloc::vec![data_type.bits(); bands],
            SampleLayout::interleaved(bands, width),
        )
    }

    /// Tightly packed 1-bit single-band model.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn bilevel(width: u32, height: u32) -> Result<Self, LayoutError> {
        Self::new(
            width,
            height,
            DataType::U8,
            alloc::vec![1],
            SampleLayout::packed_bilevel(width),
        )
    }

    /// Width of the addressed grid in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the addressed grid in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Element type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Significant bits of each band.
    #[inline]
    pub fn sample_sizes(&self) -> &[u8] {
        &self.sample_sizes
    }

    /// Layout tag.
    #[inline]
    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    /// Number of bands.
    #[inline]
    pub fn num_bands(&self) -> usize {
        self.sample_sizes.len()
    }

    /// Largest per-band sample size in bits.
    pub fn max_sample_size(&self) -> u8 {
        self.sample_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Whether this is a single-band, 1-bit, 1-bit-per-pixel model.
    pub fn is_packed_bilevel(&self) -> bool {
        matches!(self.layout, SampleLayout::PackedBilevel { .. })
    }

    /// Minimum number of elements a backing array must hold.
    pub fn required_len(&self) -> usize {
        let last_x = self.width as usize - 1;
        let last_y = self.height as usize - 1;
        match &self.layout {
            SampleLayout::Interleaved {
                band_offsets,
                pixel_stride,
                row_stride,
            } => {
                let max_band = band_offsets.iter().copied().max().unwrap_or(0);
                last_y * row_stride + last_x * pixel_stride + max_band + 1
            }
            SampleLayout::PackedBilevel {
                bit_offset,
                row_stride,
            } => last_y * row_stride + (bit_offset + last_x) / 8 + 1,
        }
    }

    /// Element index of sample `(x, y, band)` in an interleaved model.
    ///
    /// Callers have already checked the layout tag and bounds.
    #[inline]
    pub(crate) fn element_index(&self, x: u32, y: u32, band: usize) -> usize {
        match &self.layout {
            SampleLayout::Interleaved {
                band_offsets,
                pixel_stride,
                row_stride,
            } => y as usize * row_stride + x as usize * pixel_stride + band_offsets[band],
            SampleLayout::PackedBilevel { .. } => self.bit_position(x, y).0,
        }
    }

    /// `(byte index, bit index from the most significant end)` of pixel
    /// `(x, y)` in a bilevel model.
    #[inline]
    pub(crate) fn bit_position(&self, x: u32, y: u32) -> (usize, u8) {
        let (bit_offset, row_stride) = match self.layout {
            SampleLayout::PackedBilevel {
                bit_offset,
                row_stride,
            } => (bit_offset, row_stride),
            SampleLayout::Interleaved { row_stride, .. } => (0, row_stride),
        };
        let bit = bit_offset + x as usize;
        (y as usize * row_stride + bit / 8, (bit % 8) as u8)
    }

    /// A model over the same array exposing only `bands`, in that order.
    ///
    /// # Errors
    ///
    /// [`LayoutError::BandOutOfRange`] for an index past the band count.
    pub fn select_bands(&self, bands: &[usize]) -> Result<Self, LayoutError> {
        let available = self.num_bands();
        if let Some(&index) = bands.iter().find(|&&b| b >= available) {
            return Err(LayoutError::BandOutOfRange {
                index,
                bands: available,
            });
        }
        let sample_sizes = bands.iter().map(|&b| self.sample_sizes[b]).collect();
        let layout = match &self.layout {
            SampleLayout::Interleaved {
                band_offsets,
                pixel_stride,
                row_stride,
            } => SampleLayout::Interleaved {
                band_offsets: bands.iter().map(|&b| band_offsets[b]).collect(),
                pixel_stride: *pixel_stride,
                row_stride: *row_stride,
            },
            SampleLayout::PackedBilevel { .. } => {
                if bands.len() != 1 {
                    return Err(LayoutError::LayoutMismatch(
                        "packed bilevel layout needs exactly one 1-bit band",
                    ));
                }
                self.layout.clone()
            }
        };
        Self::new(
            self.width,
            self.height,
            self.data_type,
            sample_sizes,
            layout,
        )
    }
}
