use approx::assert_abs_diff_eq;
use std::sync::Arc;
use swathcal::core::navigation::CoordinateTransform;
use swathcal::core::reorder::{ScanReorderer, TileOffsets};
use swathcal::core::reproject::{ResampleMethod, ResampleParams};
use swathcal::core::swath::{GeolocationConfig, TilingConfig};
use swathcal::core::{CalibratorConfig, NavigationParams};
use swathcal::{
    ArrayData, AttributeValue, LinearAxis, MemoryReader, RangeCalibrator, SampleGrid, SubsetRequest,
    SwathAdapter, SwathConfig, SwathResampler,
};

const SCANS: usize = 2;
const FORS: usize = 3;
const CHANNELS: usize = 4;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// CrIS-like granule: radiance (scan, for, fov, channel) with raw = native_pixel * 10 + channel,
/// geolocation (scan, for, fov) laid out so the spatial lattice is
/// lon = 30 + 0.1 col, lat = 40 - 0.1 row.
fn granule() -> MemoryReader {
    let pixels = SCANS * FORS * 9;
    let mut raw: Vec<i16> = Vec::with_capacity(pixels * CHANNELS);
    for pixel in 0..pixels {
        for channel in 0..CHANNELS {
            raw.push((pixel * 10 + channel) as i16);
        }
    }
    // native pixel 0, channel 2 is a fill value
    raw[2] = -999;

    let lines = SCANS * 3;
    let elems = FORS * 3;
    let mut lon = Vec::with_capacity(lines * elems);
    let mut lat = Vec::with_capacity(lines * elems);
    for row in 0..lines {
        for col in 0..elems {
            lon.push(30.0 + 0.1 * col as f32);
            lat.push(40.0 - 0.1 * row as f32);
        }
    }
    let reorderer = ScanReorderer::new(TileOffsets::CRIS_FSR);
    let native_lon = reorderer.restore(&lon, elems, lines).unwrap();
    let native_lat = reorderer.restore(&lat, elems, lines).unwrap();

    let dims = [
        ("scan", SCANS),
        ("for", FORS),
        ("fov", 9),
        ("channel", CHANNELS),
    ];
    let mut reader = MemoryReader::new();
    reader
        .add_array("ES_RealLW", &dims, ArrayData::Int16(raw))
        .unwrap();
    let attributes = [
        ("scale_factor", AttributeValue::Float(vec![0.5])),
        ("add_offset", AttributeValue::Float(vec![0.0])),
        ("_FillValue", AttributeValue::Int(vec![-999])),
    ];
    for (name, value) in attributes {
        reader.set_attribute("ES_RealLW", name, value).unwrap();
    }

    let geo_dims = [("scan", SCANS), ("for", FORS), ("fov", 9)];
    reader
        .add_array("Longitude", &geo_dims, ArrayData::Float32(native_lon))
        .unwrap();
    reader
        .add_array("Latitude", &geo_dims, ArrayData::Float32(native_lat))
        .unwrap();
    reader
}

fn adapter() -> SwathAdapter {
    let reader = Arc::new(granule());
    let config = SwathConfig {
        tiling: Some(
            TilingConfig::new("fov", TileOffsets::CRIS_FSR).with_channel_dimension("channel"),
        ),
        geolocation: Some(GeolocationConfig {
            lon_array: "Longitude".to_string(),
            lat_array: "Latitude".to_string(),
            track_dimension: "scan".to_string(),
            xtrack_dimension: "for".to_string(),
            params: NavigationParams::default(),
        }),
        ..SwathConfig::new("ES_RealLW", "scan", "for")
    };
    let calibrator_config = CalibratorConfig {
        channel_dimension: Some("channel".to_string()),
        ..CalibratorConfig::default()
    };
    let calibrator =
        RangeCalibrator::from_config(&calibrator_config, reader.as_ref(), "ES_RealLW").unwrap();
    SwathAdapter::new(reader, config, calibrator).unwrap()
}

#[test]
fn test_tiled_granule_reads_in_spatial_order() {
    init_logging();
    let adapter = adapter();
    assert_eq!(adapter.shape(), (6, 9));

    let request = SubsetRequest::new().with("channel", 2.0, 2.0, 1.0);
    let field = adapter.read(&request).unwrap();
    assert_eq!(field.values.dim(), (6, 9));

    // CrIS FSR: IFOV 0 sits at tile position (2, 0), IFOV 6 at (0, 0)
    assert!(field.values[[2, 0]].is_nan());
    assert_abs_diff_eq!(field.values[[0, 0]], 0.5 * (6.0 * 10.0 + 2.0));
    // scan 1, FOR 1, IFOV 6 -> native pixel 42
    assert_abs_diff_eq!(field.values[[3, 3]], 0.5 * (42.0 * 10.0 + 2.0));

    let finite = field.values.iter().filter(|v| v.is_finite()).count();
    assert_eq!(finite, 6 * 9 - 1);
}

#[test]
fn test_navigation_follows_reordered_geolocation() {
    init_logging();
    let adapter = adapter();
    let request = SubsetRequest::new().with("channel", 0.0, 0.0, 1.0);
    let field = adapter.read(&request).unwrap();
    let cs = field.coordinates.as_ref().unwrap();

    assert!(!cs.interpolates());
    let (lon, lat) = cs.to_geographic(4.0, 5.0);
    assert_abs_diff_eq!(lon, 30.5, epsilon = 1e-5);
    assert_abs_diff_eq!(lat, 39.6, epsilon = 1e-5);

    let (track, xtrack) = cs.to_pixel(30.5, 39.6);
    assert_abs_diff_eq!(track, 4.0, epsilon = 1e-3);
    assert_abs_diff_eq!(xtrack, 5.0, epsilon = 1e-3);
}

#[test]
fn test_subset_snaps_to_fields_of_regard() {
    init_logging();
    let adapter = adapter();
    let request = SubsetRequest::new()
        .with("scan", 3.0, 5.0, 1.0)
        .with("for", 0.0, 5.0, 1.0)
        .with("channel", 1.0, 1.0, 1.0);
    let field = adapter.read(&request).unwrap();

    assert_eq!(field.values.dim(), (3, 6));
    assert_eq!(
        field.grid,
        SampleGrid::Linear {
            axes: vec![LinearAxis::new(3.0, 1.0, 3), LinearAxis::new(0.0, 1.0, 6)]
        }
    );
    // scan 1, FOR 0, IFOV 6 -> native pixel 33
    assert_abs_diff_eq!(field.values[[0, 0]], 0.5 * (33.0 * 10.0 + 1.0));

    let cs = field.coordinates.as_ref().unwrap();
    assert_eq!(cs.domain().track.first, 3.0);
    let (lon, lat) = cs.to_geographic(3.0, 0.0);
    assert_abs_diff_eq!(lon, 30.0, epsilon = 1e-5);
    assert_abs_diff_eq!(lat, 39.7, epsilon = 1e-5);
}

#[test]
fn test_multiple_channels_rejected_for_image_read() {
    let adapter = adapter();
    assert!(adapter.read(&SubsetRequest::new()).is_err());
}

#[test]
fn test_reproject_calibrated_field() {
    init_logging();
    let adapter = adapter();
    let request = SubsetRequest::new().with("channel", 2.0, 2.0, 1.0);
    let field = adapter.read(&request).unwrap();

    let resampler = SwathResampler::new(ResampleParams {
        resolution_deg: 0.1,
        method: ResampleMethod::Nearest,
    })
    .unwrap();
    let gridded = field.reproject(&resampler).unwrap();

    assert_abs_diff_eq!(gridded.lon.first, 30.0, epsilon = 1e-5);
    assert_abs_diff_eq!(gridded.lat.first, 40.0, epsilon = 1e-5);
    // north-west corner is spatial pixel (0, 0)
    assert_abs_diff_eq!(gridded.values[[0, 0]], 31.0);
    assert!(gridded.coverage() > 0.5);
}

#[test]
fn test_convolved_read_sums_weighted_channels() {
    init_logging();
    let adapter = adapter();
    let request = SubsetRequest::new().with("channel", 0.0, 1.0, 1.0);
    let field = adapter.read_convolved(&request, &[0.25, 0.75]).unwrap();
    assert_eq!(field.values.dim(), (6, 9));

    // pixel p: 0.25 * 0.5 * (10p) + 0.75 * 0.5 * (10p + 1) = 5p + 0.375
    assert_abs_diff_eq!(field.values[[0, 0]], 5.0 * 6.0 + 0.375);
    assert_abs_diff_eq!(field.values[[3, 3]], 5.0 * 42.0 + 0.375);
    assert!(field.values.iter().all(|v| v.is_finite()));
    assert!(field.coordinates.is_some());

    // a fill value in any summed channel poisons that IFOV
    let all = adapter
        .read_convolved(&SubsetRequest::new(), &[0.25; 4])
        .unwrap();
    assert!(all.values[[2, 0]].is_nan());
    assert_abs_diff_eq!(all.values[[0, 0]], 0.25 * 0.5 * (4.0 * 60.0 + 6.0));

    assert!(adapter.read_convolved(&request, &[1.0; 3]).is_err());
}
