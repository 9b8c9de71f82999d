//! Pixel layout reformatting and region resolution at the codec boundary.
//!
//! Codecs want one memory layout: band-interleaved 8- or 16-bit samples in
//! band order, or packed 1-bit rows. Images arrive in whatever layout their
//! producer chose, and reads and writes come with a region of interest,
//! subsampling and a band selection. This crate bridges the two:
//!
//! - [`resolve_regions`] / [`source_region_for_write`] / [`check_band_settings`]:
//!   reconcile source bounds, a [`TransformRequest`] and a destination into
//!   a pair of non-empty regions
//! - [`needs_reformat`] / [`materialize`] / [`prepare_for_encode`]: hand a
//!   [`Raster`]'s storage to a codec as a zero-copy [`CodecBuffer`], or build
//!   a fresh copy with subsampling and band selection applied
//! - [`read_region`] / [`read_into`]: drive a [`CodestreamDecoder`] row by
//!   row into a new raster or an existing [`PixelSink`], with cooperative
//!   cancellation through [`Stop`]
//! - [`ResourceLimits`]: caps checked before anything is allocated
//!
//! Options travel with each call in [`ReformatOptions`]; there is no global
//! state.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod codec;
mod decode;
mod error;
mod geometry;
mod limits;
mod raster;
mod reformat;
mod region;
mod request;
mod sample;

pub use codec::{CodecBuffer, CodecDataType, CodecSamples};
pub use decode::{CodestreamDecoder, CodestreamInfo, ReadError, TileGrid, read_into, read_region};
pub use error::{ErrorKind, LayoutError};
pub use geometry::{Point, Rect, Size, subsampled_len};
pub use limits::{LimitExceeded, ResourceLimits};
pub use raster::{PixelSink, PixelSource, Raster, RasterRef, SampleBuffer, Samples};
pub use reformat::{materialize, needs_reformat, prepare_for_encode};
pub use region::{
    DestinationPlacement, ResolvedRegions, check_band_settings, resolve_regions,
    source_region_for_write,
};
pub use request::{ReformatOptions, TransformRequest};
pub use sample::{DataType, SampleLayout, SampleModel};

// Re-exports for decoder implementors and users.
pub use enough::{Stop, StopReason, Unstoppable};
pub use imgref::{Img, ImgRef};
pub use rgb;
pub use rgb::{Rgb, Rgba};
