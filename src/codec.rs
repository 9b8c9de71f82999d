//! Codec-boundary buffers.
//!
//! A [`CodecBuffer`] is the exact memory layout handed to a codec call:
//! band-interleaved 8- or 16-bit samples with identity band order, or
//! packed 1-bit bilevel rows. It either borrows the caller's storage
//! (zero-copy) or owns a freshly reformatted copy.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::fmt;

use imgref::ImgRef;
use rgb::{AsPixels as _, Rgb, Rgba};

/// Element type at the codec boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecDataType {
    /// Packed 1-bit samples, most significant bit first.
    Bit,
    /// 8-bit samples.
    Byte,
    /// 16-bit samples.
    UShort,
}

impl CodecDataType {
    /// Bits per sample.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bit => 1,
            Self::Byte => 8,
            Self::UShort => 16,
        }
    }
}

/// Sample storage of a [`CodecBuffer`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CodecSamples<'a> {
    /// Bytes (8-bit samples or packed bilevel rows).
    U8(Cow<'a, [u8]>),
    /// 16-bit samples.
    U16(Cow<'a, [u16]>),
}

impl CodecSamples<'_> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(c) => c.len(),
            Self::U16(c) => c.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the storage is borrowed from the source.
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::U8(Cow::Borrowed(_)) | Self::U16(Cow::Borrowed(_)))
    }

    /// Detach from the source, copying borrowed storage.
    pub fn into_owned(self) -> CodecSamples<'static> {
        match self {
            Self::U8(c) => CodecSamples::U8(Cow::Owned(c.into_owned())),
            Self::U16(c) => CodecSamples::U16(Cow::Owned(c.into_owned())),
        }
    }

    #[inline]
    fn get(&self, index: usize) -> u32 {
        match self {
            Self::U8(c) => u32::from(c[index]),
            Self::U16(c) => u32::from(c[index]),
        }
    }
}

impl From<Vec<u8>> for CodecSamples<'static> {
    fn from(v: Vec<u8>) -> Self {
        Self::U8(Cow::Owned(v))
    }
}

impl From<Vec<u16>> for CodecSamples<'static> {
    fn from(v: Vec<u16>) -> Self {
        Self::U16(Cow::Owned(v))
    }
}

impl fmt::Debug for CodecSamples<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, len) = match self {
            Self::U8(c) => ("u8", c.len()),
            Self::U16(c) => ("u16", c.len()),
        };
        let ownership = if self.is_borrowed() { "borrowed" } else { "owned" };
        write!(f, "CodecSamples({kind} x {len}, {ownership})")
    }
}

/// Layout descriptor plus storage, ready for a codec call.
///
/// For interleaved buffers, sample `(x, y, band)` is element
/// `offset + y * stride + x * bands + band`. For [`CodecDataType::Bit`],
/// pixel `(x, y)` is bit `7 - (bit_offset + x) % 8` of byte
/// `offset + y * stride + (bit_offset + x) / 8`.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CodecBuffer<'a> {
    /// Element type.
    pub data_type: CodecDataType,
    /// Samples per pixel.
    pub bands: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Elements (bytes, for bilevel) between the starts of adjacent rows.
    pub stride: usize,
    /// Element index of sample `(0, 0, 0)`.
    pub offset: usize,
    /// Bit position of pixel `(0, 0)` within its byte (bilevel only).
    pub bit_offset: u8,
    /// Storage.
    pub samples: CodecSamples<'a>,
}

impl<'a> CodecBuffer<'a> {
    /// Whether this buffer borrows the source's storage.
    pub fn is_borrowed(&self) -> bool {
        self.samples.is_borrowed()
    }

    /// Whether this is a packed 1-bit buffer.
    pub fn is_bilevel(&self) -> bool {
        self.data_type == CodecDataType::Bit
    }

    /// Detach from the source, copying borrowed storage.
    pub fn into_owned(self) -> CodecBuffer<'static> {
        CodecBuffer {
            data_type: self.data_type,
            bands: self.bands,
            width: self.width,
            height: self.height,
            stride: self.stride,
            offset: self.offset,
            bit_offset: self.bit_offset,
            samples: self.samples.into_owned(),
        }
    }

    /// Sample of `band` at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the pixel or band is out of range.
    pub fn sample(&self, x: u32, y: u32, band: usize) -> u32 {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{}",
            self.width,
            self.height
        );
        assert!(band < self.bands, "band {band} out of range for {}", self.bands);
        let row = self.offset + y as usize * self.stride;
        if self.is_bilevel() {
            let bit = self.bit_offset as usize + x as usize;
            (self.samples.get(row + bit / 8) >> (7 - bit % 8)) & 1
        } else {
            self.samples.get(row + x as usize * self.bands + band)
        }
    }

    /// Elements of row `y` covering the row's pixels.
    ///
    /// Returns `None` for bilevel buffers and 16-bit buffers.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_u8(&self, y: u32) -> Option<&[u8]> {
        assert!(y < self.height, "row {y} out of range for height {}", self.height);
        match &self.samples {
            CodecSamples::U8(c) if self.data_type == CodecDataType::Byte => {
                let start = self.offset + y as usize * self.stride;
                Some(&c[start..start + self.width as usize * self.bands])
            }
            _ => None,
        }
    }

    /// 16-bit counterpart of [`row_u8`](Self::row_u8).
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_u16(&self, y: u32) -> Option<&[u16]> {
        assert!(y < self.height, "row {y} out of range for height {}", self.height);
        match &self.samples {
            CodecSamples::U16(c) => {
                let start = self.offset + y as usize * self.stride;
                Some(&c[start..start + self.width as usize * self.bands])
            }
            CodecSamples::U8(_) => None,
        }
    }

    /// Elements spanned by the image when it has `bands` bands and a stride
    /// that is a whole number of pixels.
    fn pixel_span<'s, T>(&self, data: &'s [T], bands: usize) -> Option<(&'s [T], usize)> {
        if self.is_bilevel()
            || self.bands != bands
            || self.stride % bands != 0
            || self.height == 0
        {
            return None;
        }
        let len = (self.height as usize - 1) * self.stride + self.width as usize * bands;
        let span = data.get(self.offset..self.offset + len)?;
        Some((span, self.stride / bands))
    }
}

macro_rules! impl_imgref_view {
    ($name:ident, $variant:ident, $pixel:ident, $component:ty, $bands:expr) => {
        impl<'a> CodecBuffer<'a> {
            #[doc = concat!(
                "View as an `ImgRef<", stringify!($pixel), "<", stringify!($component),
                ">>`, or `None` when the type or band count differs."
            )]
            pub fn $name(&self) -> Option<ImgRef<'_, $pixel<$component>>> {
                let CodecSamples::$variant(data) = &self.samples else {
                    return None;
                };
                if self.data_type == CodecDataType::Bit {
                    return None;
                }
                let data: &[$component] = data;
                let (span, stride_px) = self.pixel_span(data, $bands)?;
                let pixels: &[$pixel<$component>] = span.as_pixels();
                Some(ImgRef::new_stride(
                    pixels,
                    self.width as usize,
                    self.height as usize,
                    stride_px,
                ))
            }
        }
    };
}

impl_imgref_view!(as_rgb8, U8, Rgb, u8, 3);
impl_imgref_view!(as_rgba8, U8, Rgba, u8, 4);
impl_imgref_view!(as_rgb16, U16, Rgb, u16, 3);
impl_imgref_view!(as_rgba16, U16, Rgba, u16, 4);

impl fmt::Debug for CodecBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CodecBuffer({}x{}, {} x {:?}, stride {}, offset {}+{}b, {:?})",
            self.width,
            self.height,
            self.bands,
            self.data_type,
            self.stride,
            self.offset,
            self.bit_offset,
            self.samples
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn rgb8(width: u32, height: u32, stride: usize, offset: usize) -> CodecBuffer<'static> {
        let len = offset + stride * height as usize;
        CodecBuffer {
            data_type: CodecDataType::Byte,
            bands: 3,
            width,
            height,
            stride,
            offset,
            bit_offset: 0,
            samples: (0..len).map(|i| i as u8).collect::<Vec<u8>>().into(),
        }
    }

    #[test]
    fn interleaved_sample_addressing() {
        let b = rgb8(2, 2, 9, 3);
        assert_eq!(b.sample(0, 0, 0), 3);
        assert_eq!(b.sample(1, 1, 2), 3 + 9 + 3 + 2);
        assert_eq!(b.row_u8(1), Some(&[12u8, 13, 14, 15, 16, 17][..]));
        assert!(b.row_u16(0).is_none());
    }

    #[test]
    fn bilevel_sample_addressing() {
        let b = CodecBuffer {
            data_type: CodecDataType::Bit,
            bands: 1,
            width: 6,
            height: 2,
            stride: 1,
            offset: 1,
            bit_offset: 2,
            samples: vec![0xFFu8, 0b0010_0001, 0b0000_0100].into(),
        };
        assert_eq!(b.sample(0, 0, 0), 1);
        assert_eq!(b.sample(1, 0, 0), 0);
        assert_eq!(b.sample(5, 0, 0), 1);
        assert_eq!(b.sample(3, 1, 0), 1);
        assert!(b.row_u8(0).is_none());
        assert!(b.as_rgb8().is_none());
    }

    #[test]
    fn rgb8_view_respects_stride_and_offset() {
        let b = rgb8(2, 2, 9, 3);
        let img = b.as_rgb8().unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 2);
        assert_eq!(img.stride(), 3);
        assert_eq!(img[(1usize, 1usize)], Rgb::new(15, 16, 17));
        assert!(b.as_rgba8().is_none());
        assert!(b.as_rgb16().is_none());
    }

    #[test]
    fn view_rejects_partial_pixel_stride() {
        let b = rgb8(2, 2, 7, 0);
        assert!(b.as_rgb8().is_none());
    }

    #[test]
    fn rgba16_view() {
        let data: Vec<u16> = (0..8).collect();
        let b = CodecBuffer {
            data_type: CodecDataType::UShort,
            bands: 4,
            width: 1,
            height: 2,
            stride: 4,
            offset: 0,
            bit_offset: 0,
            samples: data.into(),
        };
        let img = b.as_rgba16().unwrap();
        assert_eq!(img[(0usize, 1usize)], Rgba::new(4, 5, 6, 7));
        assert_eq!(b.row_u16(1), Some(&[4u16, 5, 6, 7][..]));
    }

    #[test]
    fn borrowed_and_owned() {
        let data = [1u8, 2, 3];
        let b = CodecBuffer {
            data_type: CodecDataType::Byte,
            bands: 3,
            width: 1,
            height: 1,
            stride: 3,
            offset: 0,
            bit_offset: 0,
            samples: CodecSamples::U8(Cow::Borrowed(&data)),
        };
        assert!(b.is_borrowed());
        let owned = b.into_owned();
        assert!(!owned.is_borrowed());
        assert_eq!(owned.sample(0, 0, 2), 3);
        assert!(!alloc::format!("{owned:?}").contains("borrowed"));
    }
}
