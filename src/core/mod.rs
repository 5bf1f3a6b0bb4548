//! Core swath processing modules

pub mod calibrate;
pub mod extract;
pub mod lookup;
pub mod navigation;
pub mod reorder;
pub mod reproject;
pub mod spectrum;
pub mod subset;
pub mod swath;

// Re-export main types
pub use calibrate::{
    AttributeNames, BrightnessTemperatureStage, CalibrationStage, CalibratorConfig, ChannelLayout,
    Coefficient, DecodeConfig, Decoder, LinearDecode, LookupStage, RangeCalibrator,
    SolarZenithCorrection, StageConfig, StageContext,
};
pub use extract::{ArrayExtractor, Extraction};
pub use lookup::{CountTable, InterpolationMode, LookupTable};
pub use navigation::{
    CoordinateTransform, DataDomain, GeoWindow, NavigationParams, SwathCoordinateSystem,
    SwathNavigator,
};
pub use reorder::{align_to_tiles, ScanReorderer, TileAlignment, TileOffsets};
pub use reproject::{GeoGridded, ResampleMethod, ResampleParams, SwathResampler};
pub use spectrum::{BandProfile, ChannelDescriptor};
pub use subset::{IndexRange, SubsetRange, SubsetRequest};
pub use swath::{GeolocationConfig, SwathAdapter, SwathConfig, SwathField, TilingConfig};
