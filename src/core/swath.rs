//! End-to-end swath reads: subset, extract, calibrate, reorder, navigate

use crate::core::calibrate::{ChannelLayout, RangeCalibrator};
use crate::core::extract::{ArrayExtractor, Extraction};
use crate::core::navigation::{
    CoordinateTransform, NavigationParams, SwathCoordinateSystem, SwathNavigator,
};
use crate::core::reorder::{
    align_to_tiles, ScanReorderer, TileAlignment, TileOffsets, TILE_EDGE, TILE_SIZE,
};
use crate::core::reproject::{GeoGridded, SwathResampler};
use crate::core::subset::{SubsetRange, SubsetRequest};
use crate::io::reader::{dimensions_of, DimensionReader};
use crate::types::{Dimension, LinearAxis, SampleGrid, SwathError, SwathImage, SwathResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Native (line, FOR, IFOV) storage of tiled sounders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub ifov_dimension: String,
    #[serde(default = "default_tile_offsets")]
    pub offsets: TileOffsets,
    /// Spectral dimension summed over by convolved reads
    #[serde(default)]
    pub channel_dimension: Option<String>,
}

impl TilingConfig {
    pub fn new(ifov_dimension: &str, offsets: TileOffsets) -> Self {
        Self {
            ifov_dimension: ifov_dimension.to_string(),
            offsets,
            channel_dimension: None,
        }
    }

    pub fn with_channel_dimension(mut self, dimension: &str) -> Self {
        self.channel_dimension = Some(dimension.to_string());
        self
    }
}

fn default_tile_offsets() -> TileOffsets {
    TileOffsets::CRIS_FSR
}

/// Geolocation arrays and their relation to the data grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationConfig {
    pub lon_array: String,
    pub lat_array: String,
    pub track_dimension: String,
    pub xtrack_dimension: String,
    #[serde(default)]
    pub params: NavigationParams,
}

/// Description of one swath array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwathConfig {
    pub array: String,
    pub track_dimension: String,
    pub xtrack_dimension: String,
    #[serde(default)]
    pub tiling: Option<TilingConfig>,
    #[serde(default)]
    pub geolocation: Option<GeolocationConfig>,
}

impl SwathConfig {
    pub fn new(array: &str, track_dimension: &str, xtrack_dimension: &str) -> Self {
        Self {
            array: array.to_string(),
            track_dimension: track_dimension.to_string(),
            xtrack_dimension: xtrack_dimension.to_string(),
            tiling: None,
            geolocation: None,
        }
    }

    pub fn from_json(json: &str) -> SwathResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Calibrated 2-D field with its sample grid and optional navigation
#[derive(Debug, Clone)]
pub struct SwathField {
    /// (track, xtrack)
    pub values: SwathImage,
    pub grid: SampleGrid,
    pub coordinates: Option<SwathCoordinateSystem>,
}

impl SwathField {
    /// Values sampled at the pixels of the navigation domain
    pub fn values_on_domain(&self) -> SwathResult<SwathImage> {
        let cs = self
            .coordinates
            .as_ref()
            .ok_or_else(|| SwathError::Navigation("field has no coordinate system".to_string()))?;
        let domain = cs.domain();
        if self.values.dim() == domain.shape() {
            return Ok(self.values.clone());
        }

        let (track_axis, xtrack_axis) = match (self.grid.axis(0), self.grid.axis(1)) {
            (Some(t), Some(x)) => (t, x),
            _ => return Err(SwathError::DimensionMismatch("grid is not 2-D".to_string())),
        };
        let (rows, cols) = self.values.dim();
        let index = |axis: &LinearAxis, value: f64, n: usize| -> Option<usize> {
            let g = axis.grid(value).round();
            (g >= 0.0 && (g as usize) < n).then_some(g as usize)
        };
        Ok(Array2::from_shape_fn(domain.shape(), |(i, j)| {
            let t = index(&track_axis, domain.track.value(i as f64), rows);
            let x = index(&xtrack_axis, domain.xtrack.value(j as f64), cols);
            match (t, x) {
                (Some(t), Some(x)) => self.values[[t, x]],
                _ => f32::NAN,
            }
        }))
    }

    /// Resample onto a regular lon/lat grid
    pub fn reproject(&self, resampler: &SwathResampler) -> SwathResult<GeoGridded> {
        let values = self.values_on_domain()?;
        match &self.coordinates {
            Some(cs) => resampler.resample_swath(&values, cs),
            None => Err(SwathError::Navigation("no coordinate system".to_string())),
        }
    }
}

/// Reads calibrated, spatially ordered swath fields from one array
pub struct SwathAdapter {
    config: SwathConfig,
    extractor: ArrayExtractor,
    calibrator: RangeCalibrator,
    reorderer: Option<ScanReorderer>,
    navigator: Option<SwathNavigator>,
    dimensions: Vec<Dimension>,
    track_length: usize,
    xtrack_length: usize,
}

fn dimension_length(dimensions: &[Dimension], name: &str, array: &str) -> SwathResult<usize> {
    dimensions
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.length)
        .ok_or_else(|| {
            SwathError::DimensionMismatch(format!("array {} has no dimension {}", array, name))
        })
}

/// Arrange a flat buffer holding one (track, xtrack) plane into a (track, xtrack) image
fn plane_image(
    values: Vec<f32>,
    extraction: &Extraction,
    track_dim: &str,
    xtrack_dim: &str,
) -> SwathResult<SwathImage> {
    let missing = || {
        SwathError::DimensionMismatch(format!(
            "{} lacks {} or {}",
            extraction.array, track_dim, xtrack_dim
        ))
    };
    let t = extraction.dimension_index(track_dim).ok_or_else(missing)?;
    let x = extraction.dimension_index(xtrack_dim).ok_or_else(missing)?;
    let shape = extraction.shape();
    let image = if t < x {
        Array2::from_shape_vec((shape[t], shape[x]), values)
    } else {
        Array2::from_shape_vec((shape[x], shape[t]), values)
            .map(|a| a.reversed_axes().as_standard_layout().to_owned())
    };
    image.map_err(|e| SwathError::DimensionMismatch(format!("{}: {}", extraction.array, e)))
}

/// Every dimension other than `keep` must resolve to a single index
fn check_single_plane(extraction: &Extraction, keep: &[&str]) -> SwathResult<()> {
    for (dim, range) in extraction.dimensions.iter().zip(&extraction.ranges) {
        if !keep.contains(&dim.name.as_str()) && range.count != 1 {
            return Err(SwathError::DimensionMismatch(format!(
                "{}: select a single index along {} (got {})",
                extraction.array, dim.name, range.count
            )));
        }
    }
    Ok(())
}

/// The reorder reads native buffers as (track, xtrack, ifov); other
/// dimensions may sit anywhere since reads select a single index along them.
fn check_tiled_order(dimensions: &[Dimension], array: &str, order: [&str; 3]) -> SwathResult<()> {
    let position = |name: &str| dimensions.iter().position(|d| d.name == name);
    match order.map(position) {
        [Some(t), Some(x), Some(f)] if t < x && x < f => Ok(()),
        _ => Err(SwathError::DimensionMismatch(format!(
            "{} must be stored in ({}, {}, {}) order, found ({})",
            array,
            order[0],
            order[1],
            order[2],
            dimensions
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Per-IFOV weighted sum over the channel axis of `layout`
fn convolve(values: &[f32], layout: &ChannelLayout, weights: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len() / layout.count().max(1)];
    for (i, &v) in values.iter().enumerate() {
        out[layout.sample(i)] += weights[layout.position(i)] * v;
    }
    out
}

impl SwathAdapter {
    pub fn new(
        reader: Arc<dyn DimensionReader>,
        config: SwathConfig,
        calibrator: RangeCalibrator,
    ) -> SwathResult<Self> {
        let dimensions = dimensions_of(reader.as_ref(), &config.array)?;
        let mut track_length =
            dimension_length(&dimensions, &config.track_dimension, &config.array)?;
        let mut xtrack_length =
            dimension_length(&dimensions, &config.xtrack_dimension, &config.array)?;

        let reorderer = match &config.tiling {
            Some(tiling) => {
                let ifov = dimension_length(&dimensions, &tiling.ifov_dimension, &config.array)?;
                if ifov != TILE_SIZE {
                    return Err(SwathError::DimensionMismatch(format!(
                        "{} has {} IFOVs, expected {}",
                        tiling.ifov_dimension, ifov, TILE_SIZE
                    )));
                }
                check_tiled_order(
                    &dimensions,
                    &config.array,
                    [
                        config.track_dimension.as_str(),
                        config.xtrack_dimension.as_str(),
                        tiling.ifov_dimension.as_str(),
                    ],
                )?;
                track_length *= TILE_EDGE;
                xtrack_length *= TILE_EDGE;
                Some(ScanReorderer::new(tiling.offsets))
            }
            None => None,
        };

        let extractor = ArrayExtractor::new(reader);
        let navigator = match &config.geolocation {
            None => None,
            Some(geo) => Some(match (&config.tiling, reorderer) {
                (Some(tiling), Some(reorderer)) => {
                    let load = |array: &str| {
                        tiled_lattice(&extractor, array, geo, &tiling.ifov_dimension, &reorderer)
                    };
                    SwathNavigator::new(load(&geo.lon_array)?, load(&geo.lat_array)?, geo.params)?
                }
                _ => SwathNavigator::from_extractor(
                    &extractor,
                    &geo.lon_array,
                    &geo.lat_array,
                    &geo.track_dimension,
                    &geo.xtrack_dimension,
                    geo.params,
                )?,
            }),
        };

        log::info!(
            "Swath adapter for {}: {}x{} (track x xtrack){}{}",
            config.array,
            track_length,
            xtrack_length,
            if reorderer.is_some() { ", tiled" } else { "" },
            if navigator.is_some() { ", navigated" } else { "" }
        );

        Ok(Self {
            config,
            extractor,
            calibrator,
            reorderer,
            navigator,
            dimensions,
            track_length,
            xtrack_length,
        })
    }

    pub fn config(&self) -> &SwathConfig {
        &self.config
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Spatial (track, xtrack) size; tiled arrays count IFOVs
    pub fn shape(&self) -> (usize, usize) {
        (self.track_length, self.xtrack_length)
    }

    pub fn navigator(&self) -> Option<&SwathNavigator> {
        self.navigator.as_ref()
    }

    pub fn calibrator(&self) -> &RangeCalibrator {
        &self.calibrator
    }

    fn spatial_range(
        &self,
        request: &SubsetRequest,
        dimension: &str,
        length: usize,
    ) -> SubsetRange {
        request
            .get(dimension)
            .copied()
            .unwrap_or_else(|| SubsetRange::full(length))
    }

    /// Snap the spatial request to whole tiles, read every IFOV and calibrate.
    /// Dimensions named in `free` may select more than one index.
    fn read_tiles(
        &self,
        tiling: &TilingConfig,
        request: &SubsetRequest,
        free: Option<&str>,
    ) -> SwathResult<TiledRead> {
        let track_dim = self.config.track_dimension.as_str();
        let xtrack_dim = self.config.xtrack_dimension.as_str();
        let track = align_to_tiles(&self.spatial_range(request, track_dim, self.track_length))?;
        let xtrack = align_to_tiles(&self.spatial_range(request, xtrack_dim, self.xtrack_length))?;

        let mut native = request.clone();
        native.set(track_dim, track.native);
        native.set(xtrack_dim, xtrack.native);
        native.set(&tiling.ifov_dimension, SubsetRange::full(TILE_SIZE));

        let extraction = self.extractor.extract(&self.config.array, &native)?;
        let mut keep = vec![track_dim, xtrack_dim, tiling.ifov_dimension.as_str()];
        keep.extend(free);
        check_single_plane(&extraction, &keep)?;
        let values = self
            .calibrator
            .calibrate_extraction(&self.extractor, &extraction, &native)?;

        let count = |dim: &str| {
            extraction
                .dimension_index(dim)
                .map(|i| extraction.ranges[i].count)
                .unwrap_or(1)
        };
        Ok(TiledRead {
            lines: TILE_EDGE * count(track_dim),
            elems: TILE_EDGE * count(xtrack_dim),
            values,
            extraction,
            track,
            xtrack,
        })
    }

    /// Reorder a per-IFOV buffer into the spatial field of a tiled read
    fn tiled_field(
        &self,
        reorderer: &ScanReorderer,
        tiles: &TiledRead,
        values: &[f32],
    ) -> SwathResult<SwathField> {
        let image = reorderer.reorder_image(values, tiles.elems, tiles.lines)?;
        let grid = SampleGrid::Linear {
            axes: vec![
                LinearAxis::new(tiles.track.spatial.first, 1.0, tiles.lines),
                LinearAxis::new(tiles.xtrack.spatial.first, 1.0, tiles.elems),
            ],
        };
        self.field(image, grid, &tiles.track.spatial, &tiles.xtrack.spatial)
    }

    fn field(
        &self,
        values: SwathImage,
        grid: SampleGrid,
        nav_track: &SubsetRange,
        nav_xtrack: &SubsetRange,
    ) -> SwathResult<SwathField> {
        let coordinates = match &self.navigator {
            Some(navigator) => Some(navigator.coordinate_system(nav_track, nav_xtrack)?),
            None => None,
        };

        log::debug!("Read {}: field {:?}", self.config.array, values.dim());
        Ok(SwathField {
            values,
            grid,
            coordinates,
        })
    }

    /// Calibrated field for `request`; tiled arrays are snapped to whole fields of regard
    pub fn read(&self, request: &SubsetRequest) -> SwathResult<SwathField> {
        if let (Some(reorderer), Some(tiling)) = (&self.reorderer, &self.config.tiling) {
            let tiles = self.read_tiles(tiling, request, None)?;
            return self.tiled_field(reorderer, &tiles, &tiles.values);
        }

        let track_dim = self.config.track_dimension.as_str();
        let xtrack_dim = self.config.xtrack_dimension.as_str();
        let extraction = self.extractor.extract(&self.config.array, request)?;
        check_single_plane(&extraction, &[track_dim, xtrack_dim])?;
        let calibrated = self
            .calibrator
            .calibrate_extraction(&self.extractor, &extraction, request)?;
        let image = plane_image(calibrated, &extraction, track_dim, xtrack_dim)?;

        let t = extraction.ranges[extraction.dimension_index(track_dim).unwrap_or(0)];
        let x = extraction.ranges[extraction.dimension_index(xtrack_dim).unwrap_or(1)];
        let grid = if t.covers(self.track_length) && x.covers(self.xtrack_length) {
            SampleGrid::Integer {
                lengths: vec![t.count, x.count],
            }
        } else {
            SampleGrid::Linear {
                axes: vec![
                    LinearAxis::new(t.start as f64, t.stride as f64, t.count),
                    LinearAxis::new(x.start as f64, x.stride as f64, x.count),
                ],
            }
        };
        let nav_track = SubsetRange::new(t.start as f64, t.last_index() as f64, t.stride as f64);
        let nav_xtrack = SubsetRange::new(x.start as f64, x.last_index() as f64, x.stride as f64);
        self.field(image, grid, &nav_track, &nav_xtrack)
    }

    /// Weighted sum over the channels selected by `request` for every IFOV,
    /// reordered into a spatial field. `weights` holds one entry per selected channel.
    pub fn read_convolved(
        &self,
        request: &SubsetRequest,
        weights: &[f32],
    ) -> SwathResult<SwathField> {
        let (reorderer, tiling) = match (&self.reorderer, &self.config.tiling) {
            (Some(reorderer), Some(tiling)) => (reorderer, tiling),
            _ => {
                return Err(SwathError::DimensionMismatch(format!(
                    "{} is not tiled; convolved reads need native IFOV storage",
                    self.config.array
                )))
            }
        };
        let channel_dim = tiling.channel_dimension.as_deref().ok_or_else(|| {
            SwathError::DimensionMismatch(format!(
                "no channel dimension configured for {}",
                self.config.array
            ))
        })?;

        let tiles = self.read_tiles(tiling, request, Some(channel_dim))?;
        let layout = ChannelLayout::from_extraction(&tiles.extraction, Some(channel_dim))?;
        if weights.len() != layout.count() {
            return Err(SwathError::DimensionMismatch(format!(
                "{} weights for {} selected channels",
                weights.len(),
                layout.count()
            )));
        }

        let convolved = convolve(&tiles.values, &layout, weights);
        log::debug!(
            "Convolved {} channels of {} into {} IFOVs",
            layout.count(),
            self.config.array,
            convolved.len()
        );
        self.tiled_field(reorderer, &tiles, &convolved)
    }
}

/// Calibrated native buffer of a tiled read with its tile alignment
struct TiledRead {
    extraction: Extraction,
    values: Vec<f32>,
    track: TileAlignment,
    xtrack: TileAlignment,
    lines: usize,
    elems: usize,
}

/// Read a native (line, FOR, IFOV) geolocation array into a spatial lattice
fn tiled_lattice(
    extractor: &ArrayExtractor,
    array: &str,
    geo: &GeolocationConfig,
    ifov_dimension: &str,
    reorderer: &ScanReorderer,
) -> SwathResult<Array2<f32>> {
    let extraction = extractor.extract(array, &SubsetRequest::new())?;
    let expected = [
        geo.track_dimension.as_str(),
        geo.xtrack_dimension.as_str(),
        ifov_dimension,
    ];
    let order: Vec<Option<usize>> = expected
        .iter()
        .map(|d| extraction.dimension_index(d))
        .collect();
    if order != [Some(0), Some(1), Some(2)] || extraction.dimensions.len() != 3 {
        return Err(SwathError::DimensionMismatch(format!(
            "{} must be stored as ({}, {}, {})",
            array, geo.track_dimension, geo.xtrack_dimension, ifov_dimension
        )));
    }
    let shape = extraction.shape();
    reorderer.reorder_image(
        &extraction.data.to_f32_vec(),
        TILE_EDGE * shape[1],
        TILE_EDGE * shape[0],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibrate::{Coefficient, Decoder, LinearDecode};
    use crate::io::MemoryReader;
    use crate::types::ArrayData;

    fn identity_calibrator() -> RangeCalibrator {
        RangeCalibrator::new(Decoder::Linear(LinearDecode::new(
            Coefficient::Scalar(1.0),
            Coefficient::Scalar(0.0),
        )))
    }

    fn adapter(reader: MemoryReader, config: SwathConfig) -> SwathResult<SwathAdapter> {
        SwathAdapter::new(Arc::new(reader), config, identity_calibrator())
    }

    fn tiled_reader() -> MemoryReader {
        // 2 scans x 2 FORs x 9 IFOVs, value = native index
        let values: Vec<f32> = (0..36).map(|v| v as f32).collect();
        let mut reader = MemoryReader::new();
        reader
            .add_array(
                "radiance",
                &[("scan", 2), ("for", 2), ("fov", 9)],
                ArrayData::Float32(values),
            )
            .unwrap();
        reader
    }

    fn tiled_config() -> SwathConfig {
        SwathConfig {
            tiling: Some(TilingConfig::new("fov", TileOffsets::ROW_MAJOR)),
            ..SwathConfig::new("radiance", "scan", "for")
        }
    }

    #[test]
    fn test_tiled_read_reorders_to_spatial() {
        let adapter = adapter(tiled_reader(), tiled_config()).unwrap();
        assert_eq!(adapter.shape(), (6, 6));

        let field = adapter.read(&SubsetRequest::new()).unwrap();
        assert_eq!(field.values.dim(), (6, 6));
        // row 0: FOR 0 IFOVs 0..3 then FOR 1 IFOVs 0..3
        let row = field.values.row(0).to_vec();
        assert_eq!(row, vec![0.0, 1.0, 2.0, 9.0, 10.0, 11.0]);
        assert_eq!(field.values[[3, 0]], 18.0);
        assert!(field.coordinates.is_none());
    }

    #[test]
    fn test_tiled_subset_snaps_to_tiles() {
        let adapter = adapter(tiled_reader(), tiled_config()).unwrap();
        let request = SubsetRequest::new()
            .with("scan", 1.0, 4.0, 1.0)
            .with("for", 3.0, 5.0, 1.0);
        let field = adapter.read(&request).unwrap();
        assert_eq!(field.values.dim(), (3, 3));
        assert_eq!(
            field.grid,
            SampleGrid::Linear {
                axes: vec![LinearAxis::new(0.0, 1.0, 3), LinearAxis::new(3.0, 1.0, 3)]
            }
        );
        assert_eq!(field.values[[0, 0]], 9.0);
    }

    #[test]
    fn test_plain_read_and_transpose() {
        let mut reader = MemoryReader::new();
        // stored (xtrack, track)
        let raw = ArrayData::Int16(vec![0, 1, 2, 3, 4, 5]);
        reader
            .add_array("bt", &[("x", 3), ("y", 2)], raw)
            .unwrap();
        let adapter = adapter(reader, SwathConfig::new("bt", "y", "x")).unwrap();
        let field = adapter.read(&SubsetRequest::new()).unwrap();
        assert_eq!(field.values.dim(), (2, 3));
        assert_eq!(field.values.row(0).to_vec(), vec![0.0, 2.0, 4.0]);
        let lengths = vec![2, 3];
        assert_eq!(field.grid, SampleGrid::Integer { lengths });
    }

    #[test]
    fn test_extra_dimension_must_be_single() {
        let mut reader = MemoryReader::new();
        reader
            .add_array(
                "r",
                &[("band", 2), ("y", 2), ("x", 2)],
                ArrayData::Float32(vec![0.0; 8]),
            )
            .unwrap();
        let adapter = adapter(reader, SwathConfig::new("r", "y", "x")).unwrap();
        assert!(matches!(
            adapter.read(&SubsetRequest::new()),
            Err(SwathError::DimensionMismatch(_))
        ));
        let band = SubsetRequest::new().with("band", 1.0, 1.0, 1.0);
        let field = adapter.read(&band).unwrap();
        assert_eq!(field.values.dim(), (2, 2));
    }

    #[test]
    fn test_bad_ifov_dimension_rejected() {
        let mut reader = MemoryReader::new();
        reader
            .add_array(
                "radiance",
                &[("scan", 1), ("for", 1), ("fov", 4)],
                ArrayData::Float32(vec![0.0; 4]),
            )
            .unwrap();
        let result = adapter(reader, tiled_config());
        assert!(matches!(result, Err(SwathError::DimensionMismatch(_))));
    }

    #[test]
    fn test_tiled_storage_order_checked() {
        let mut reader = MemoryReader::new();
        let values: Vec<f32> = (0..18).map(|v| v as f32).collect();
        reader
            .add_array(
                "radiance",
                &[("scan", 1), ("fov", 9), ("for", 2)],
                ArrayData::Float32(values),
            )
            .unwrap();
        let result = adapter(reader, tiled_config());
        assert!(matches!(result, Err(SwathError::DimensionMismatch(_))));

        // extra dimensions may lead
        let mut reader = MemoryReader::new();
        reader
            .add_array(
                "radiance",
                &[("band", 1), ("scan", 1), ("for", 2), ("fov", 9)],
                ArrayData::Float32(vec![0.0; 18]),
            )
            .unwrap();
        assert!(adapter(reader, tiled_config()).is_ok());
    }

    #[test]
    fn test_convolved_read_row_major() {
        let mut reader = MemoryReader::new();
        // 1 scan x 1 FOR x 9 IFOVs x 2 channels: channel 0 = ifov, channel 1 = 100
        let values: Vec<f32> = (0..9).flat_map(|k| [k as f32, 100.0]).collect();
        reader
            .add_array(
                "radiance",
                &[("scan", 1), ("for", 1), ("fov", 9), ("chan", 2)],
                ArrayData::Float32(values),
            )
            .unwrap();
        let mut config = tiled_config();
        config.tiling =
            Some(TilingConfig::new("fov", TileOffsets::ROW_MAJOR).with_channel_dimension("chan"));
        let adapter = adapter(reader, config).unwrap();

        let all = SubsetRequest::new();
        let field = adapter.read_convolved(&all, &[2.0, 0.5]).unwrap();
        assert_eq!(field.values.dim(), (3, 3));
        assert_eq!(field.values[[0, 0]], 50.0);
        assert_eq!(field.values[[2, 2]], 2.0 * 8.0 + 50.0);
        assert!(adapter.read_convolved(&all, &[1.0]).is_err());
    }

    #[test]
    fn test_convolved_read_needs_tiling() {
        let mut reader = MemoryReader::new();
        let raw = ArrayData::Float32(vec![1.0, 2.0]);
        reader
            .add_array("bt", &[("y", 1), ("x", 2)], raw)
            .unwrap();
        let adapter = adapter(reader, SwathConfig::new("bt", "y", "x")).unwrap();
        let all = SubsetRequest::new();
        assert!(adapter.read_convolved(&all, &[1.0]).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "array": "ES_RealLW",
            "track_dimension": "scan",
            "xtrack_dimension": "for",
            "tiling": {"ifov_dimension": "fov"},
            "geolocation": {
                "lon_array": "Longitude", "lat_array": "Latitude",
                "track_dimension": "scan", "xtrack_dimension": "for"
            }
        }"#;
        let config = SwathConfig::from_json(json).unwrap();
        assert_eq!(config.tiling.unwrap().offsets, TileOffsets::CRIS_FSR);
        let geolocation = config.geolocation.unwrap();
        assert_eq!(geolocation.params, NavigationParams::default());
    }
}
