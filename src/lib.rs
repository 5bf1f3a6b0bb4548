//! swathcal: subsetting, pseudo-scan reordering, radiometric calibration and
//! navigation of multi-dimensional satellite swath data.
//!
//! A request names a subset per dimension; the pipeline resolves it against
//! the array, extracts exactly those samples through a [`io::DimensionReader`],
//! calibrates them to physical units, reorders tiled sounder data into image
//! order and attaches a pixel <-> longitude/latitude coordinate system.

pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    ArrayData, AttributeValue, BoundingBox, Dimension, ElementType, LinearAxis, SampleGrid,
    SwathError, SwathImage, SwathReal, SwathResult,
};

pub use io::{DimensionReader, MemoryReader, SerializedReader};

pub use crate::core::{
    ArrayExtractor, CalibratorConfig, ChannelDescriptor, RangeCalibrator, ScanReorderer,
    SubsetRequest, SwathAdapter, SwathConfig, SwathField, SwathNavigator, SwathResampler,
};
