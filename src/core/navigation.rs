//! Swath navigation: mapping between data pixel coordinates and longitude/latitude
//! through a (possibly coarser) geolocation lattice.

use crate::core::extract::ArrayExtractor;
use crate::core::subset::{IndexRange, SubsetRange, SubsetRequest};
use crate::types::{BoundingBox, LinearAxis, SwathError, SwathResult};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

/// Spherical earth radius used for the inverse-mapping projection, metres
pub const EARTH_RADIUS_M: f64 = 6_367_470.0;

/// Longitude spread above which a lattice cell is treated as crossing the dateline
const DATELINE_SPREAD_DEG: f64 = 300.0;

const NEWTON_ITERATIONS: usize = 12;
/// Tolerance in cell units when testing whether a point lies inside a lattice cell
const CELL_EPS: f64 = 1e-4;

/// Skip ratio and offset of the geolocation lattice relative to the data, per axis.
/// Data index = lattice index * ratio + offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationParams {
    pub track_ratio: f64,
    pub xtrack_ratio: f64,
    pub track_offset: f64,
    pub xtrack_offset: f64,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            track_ratio: 1.0,
            xtrack_ratio: 1.0,
            track_offset: 0.0,
            xtrack_offset: 0.0,
        }
    }
}

impl NavigationParams {
    fn validate(&self) -> SwathResult<()> {
        for (name, ratio) in [("track", self.track_ratio), ("xtrack", self.xtrack_ratio)] {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(SwathError::Navigation(format!(
                    "{} ratio must be positive, got {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }
}

/// Physical pixel coordinates covered by a data subset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataDomain {
    pub track: LinearAxis,
    pub xtrack: LinearAxis,
}

impl DataDomain {
    pub fn new(track: LinearAxis, xtrack: LinearAxis) -> Self {
        Self { track, xtrack }
    }

    /// (track, xtrack) sample counts
    pub fn shape(&self) -> (usize, usize) {
        (self.track.length, self.xtrack.length)
    }

    /// The four corner pixels as (track, xtrack)
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (t0, t1) = (self.track.first, self.track.last());
        let (x0, x1) = (self.xtrack.first, self.xtrack.last());
        [(t0, x0), (t0, x1), (t1, x0), (t1, x1)]
    }
}

/// Lattice index ranges and data domain for one navigated request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoWindow {
    pub track: IndexRange,
    pub xtrack: IndexRange,
    pub domain: DataDomain,
}

fn axis_window(
    name: &str,
    range: &SubsetRange,
    ratio: f64,
    offset: f64,
    lattice_len: usize,
) -> SwathResult<(IndexRange, LinearAxis)> {
    let stride = range.step.trunc();
    if !(stride >= 1.0) {
        return Err(SwathError::InvalidRange(format!(
            "{}: step must be >= 1, got {}",
            name, range.step
        )));
    }

    let geo_stride = if ratio / stride <= 1.0 {
        (stride / ratio).round().max(1.0) as i64
    } else {
        1
    };
    let geo_start = ((range.first - offset) / ratio).ceil() as i64;
    let geo_end = ((range.last - offset) / ratio).trunc() as i64;
    if geo_start < 0 || geo_end < geo_start {
        return Err(SwathError::Navigation(format!(
            "{}: data range {}..{} holds no geolocation sample",
            name, range.first, range.last
        )));
    }

    let count = (geo_end - geo_start) / geo_stride + 1;
    let geo_end = geo_start + (count - 1) * geo_stride;
    if geo_end as usize >= lattice_len {
        return Err(SwathError::Navigation(format!(
            "{}: geolocation index {} beyond lattice length {}",
            name, geo_end, lattice_len
        )));
    }

    let first = (geo_start as f64 * ratio + offset).trunc();
    let last = (geo_end as f64 * ratio + offset).trunc();
    let length = ((last - first) / stride + 1.0).trunc() as usize;

    Ok((
        IndexRange::new(geo_start as usize, count as usize, geo_stride as usize),
        LinearAxis::from_bounds(first, last, length),
    ))
}

/// Spherical Lambert azimuthal equal-area projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertAzimuthalEqualArea {
    radius: f64,
    lon0: f64,
    sin_lat0: f64,
    cos_lat0: f64,
}

impl LambertAzimuthalEqualArea {
    /// Centre given in degrees
    pub fn new(radius: f64, center_lon: f64, center_lat: f64) -> Self {
        let lat0 = center_lat.to_radians();
        Self {
            radius,
            lon0: center_lon.to_radians(),
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos(),
        }
    }

    /// Projected (x, y) in metres; NaN for the antipode and non-finite input
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        if !(lon.is_finite() && lat.is_finite()) || lat.abs() > 90.0 {
            return (f64::NAN, f64::NAN);
        }
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let dlon = lon.to_radians() - self.lon0;
        let denom = 1.0 + self.sin_lat0 * sin_lat + self.cos_lat0 * cos_lat * dlon.cos();
        if denom <= 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let k = (2.0 / denom).sqrt();
        (
            self.radius * k * cos_lat * dlon.sin(),
            self.radius * k * (self.cos_lat0 * sin_lat - self.sin_lat0 * cos_lat * dlon.cos()),
        )
    }
}

/// Pixel <-> geographic mapping
pub trait CoordinateTransform: Send + Sync {
    /// Pixel domain the transform is defined over
    fn domain(&self) -> DataDomain;

    /// (track, xtrack) to (lon, lat); NaN where undefined
    fn to_geographic(&self, track: f64, xtrack: f64) -> (f64, f64);

    /// (lon, lat) to (track, xtrack); NaN outside the swath
    fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Geographic envelope of the domain corners
    fn envelope(&self) -> Option<BoundingBox> {
        let corners: Vec<(f64, f64)> = self
            .domain()
            .corners()
            .iter()
            .map(|&(t, x)| self.to_geographic(t, x))
            .collect();
        BoundingBox::from_points(&corners)
    }
}

/// Coordinate system of one navigated data subset. Immutable once built.
#[derive(Debug, Clone)]
pub struct SwathCoordinateSystem {
    domain: DataDomain,
    lon: Array2<f32>,
    lat: Array2<f32>,
    track_sub: LinearAxis,
    xtrack_sub: LinearAxis,
    interpolate: bool,
    kept_lines: Vec<usize>,
    projection: LambertAzimuthalEqualArea,
    proj_x: Array2<f64>,
    proj_y: Array2<f64>,
}

/// Lattice lines whose centre sample is a valid location
fn valid_lines(lon: &Array2<f32>, lat: &Array2<f32>) -> Vec<usize> {
    let center = lon.ncols() / 2;
    (0..lon.nrows())
        .filter(|&row| {
            let (x, y) = (lon[[row, center]], lat[[row, center]]);
            !(x.is_nan() || y.is_nan()) && y.abs() <= 90.0
        })
        .collect()
}

impl SwathCoordinateSystem {
    /// `lon`/`lat` are the lattice window (track x xtrack) covering `domain`
    pub fn new(domain: DataDomain, lon: Array2<f32>, lat: Array2<f32>) -> SwathResult<Self> {
        if lon.dim() != lat.dim() {
            return Err(SwathError::Navigation(format!(
                "longitude shape {:?} differs from latitude shape {:?}",
                lon.dim(),
                lat.dim()
            )));
        }
        let (rows, cols) = lon.dim();
        if rows < 2 || cols < 2 {
            return Err(SwathError::Navigation(format!(
                "geolocation lattice {}x{} is smaller than 2x2",
                rows, cols
            )));
        }
        for axis in [&domain.track, &domain.xtrack] {
            if axis.length == 0 || !(axis.step.is_finite() && axis.step > 0.0) {
                return Err(SwathError::Navigation(format!(
                    "data domain axis {:?} is not increasing",
                    axis
                )));
            }
        }

        let kept_lines = valid_lines(&lon, &lat);
        if kept_lines.len() < 2 {
            return Err(SwathError::Navigation(format!(
                "only {} of {} geolocation lines are valid",
                kept_lines.len(),
                rows
            )));
        }
        if kept_lines.len() < rows {
            log::warn!(
                "Removed {} missing geolocation line(s) of {}",
                rows - kept_lines.len(),
                rows
            );
        }

        let center_row = kept_lines[kept_lines.len() / 2];
        let center_col = cols / 2;
        let projection = LambertAzimuthalEqualArea::new(
            EARTH_RADIUS_M,
            lon[[center_row, center_col]] as f64,
            lat[[center_row, center_col]] as f64,
        );

        let mut proj_x = Array2::from_elem((kept_lines.len(), cols), f64::NAN);
        let mut proj_y = Array2::from_elem((kept_lines.len(), cols), f64::NAN);
        for (k, &row) in kept_lines.iter().enumerate() {
            for col in 0..cols {
                let (x, y) = projection.forward(lon[[row, col]] as f64, lat[[row, col]] as f64);
                proj_x[[k, col]] = x;
                proj_y[[k, col]] = y;
            }
        }

        let (track_len, xtrack_len) = domain.shape();
        log::debug!(
            "Coordinate system: domain {}x{}, lattice {}x{}",
            track_len,
            xtrack_len,
            rows,
            cols
        );

        Ok(Self {
            domain,
            track_sub: LinearAxis::from_bounds(0.0, (rows - 1) as f64, track_len),
            xtrack_sub: LinearAxis::from_bounds(0.0, (cols - 1) as f64, xtrack_len),
            interpolate: track_len != rows || xtrack_len != cols,
            lon,
            lat,
            kept_lines,
            projection,
            proj_x,
            proj_y,
        })
    }

    pub fn lattice_shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    /// Whether pixel coordinates are interpolated over a coarser lattice
    pub fn interpolates(&self) -> bool {
        self.interpolate
    }

    /// Lattice lines kept for inverse mapping
    pub fn kept_lines(&self) -> &[usize] {
        &self.kept_lines
    }

    fn valid_location(lon: f64, lat: f64) -> (f64, f64) {
        if lat.is_nan() || lat.abs() > 90.0 {
            (f64::NAN, f64::NAN)
        } else {
            (lon, lat)
        }
    }

    fn sample(&self, row: usize, col: usize) -> (f64, f64) {
        (self.lon[[row, col]] as f64, self.lat[[row, col]] as f64)
    }

    fn interpolate_lattice(&self, row: f64, col: f64) -> (f64, f64) {
        let (rows, cols) = self.lon.dim();
        let limit = |v: f64, n: usize| v >= -CELL_EPS && v <= (n - 1) as f64 + CELL_EPS;
        if !(limit(row, rows) && limit(col, cols)) {
            return (f64::NAN, f64::NAN);
        }

        let r0 = (row.floor().max(0.0) as usize).min(rows - 2);
        let c0 = (col.floor().max(0.0) as usize).min(cols - 2);

        let corners = [
            self.lon[[r0, c0]],
            self.lon[[r0, c0 + 1]],
            self.lon[[r0 + 1, c0]],
            self.lon[[r0 + 1, c0 + 1]],
        ];
        let min = corners.iter().cloned().fold(f32::INFINITY, f32::min) as f64;
        let max = corners.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;
        if max - min > DATELINE_SPREAD_DEG {
            let r = ((row + 0.5).floor().max(0.0) as usize).min(rows - 1);
            let c = ((col + 0.5).floor().max(0.0) as usize).min(cols - 1);
            return self.sample(r, c);
        }

        let dr = row - r0 as f64;
        let dc = col - c0 as f64;
        let blend = |a: &Array2<f32>| -> f64 {
            let v00 = a[[r0, c0]] as f64;
            let v01 = a[[r0, c0 + 1]] as f64;
            let v10 = a[[r0 + 1, c0]] as f64;
            let v11 = a[[r0 + 1, c0 + 1]] as f64;
            v00 * (1.0 - dr) * (1.0 - dc)
                + v01 * (1.0 - dr) * dc
                + v10 * dr * (1.0 - dc)
                + v11 * dr * dc
        };
        (blend(&self.lon), blend(&self.lat))
    }

    fn projected(&self, row: usize, col: usize) -> (f64, f64) {
        (self.proj_x[[row, col]], self.proj_y[[row, col]])
    }

    /// Local (u, v) of point (x, y) in projected cell (row, col); u runs along columns
    fn invert_cell(&self, row: usize, col: usize, x: f64, y: f64) -> Option<(f64, f64)> {
        let p00 = self.projected(row, col);
        let p01 = self.projected(row, col + 1);
        let p10 = self.projected(row + 1, col);
        let p11 = self.projected(row + 1, col + 1);
        let finite = |p: &(f64, f64)| p.0.is_finite() && p.1.is_finite();
        if ![p00, p01, p10, p11].iter().all(finite) {
            return None;
        }

        let ax = (p01.0 - p00.0, p01.1 - p00.1);
        let ay = (p10.0 - p00.0, p10.1 - p00.1);
        let d = (p11.0 - p01.0 - p10.0 + p00.0, p11.1 - p01.1 - p10.1 + p00.1);

        let (mut u, mut v) = (0.5, 0.5);
        for _ in 0..NEWTON_ITERATIONS {
            let fx = p00.0 + u * ax.0 + v * ay.0 + u * v * d.0 - x;
            let fy = p00.1 + u * ax.1 + v * ay.1 + u * v * d.1 - y;
            let jxu = ax.0 + v * d.0;
            let jxv = ay.0 + u * d.0;
            let jyu = ax.1 + v * d.1;
            let jyv = ay.1 + u * d.1;
            let det = jxu * jyv - jxv * jyu;
            if det.abs() < f64::EPSILON {
                return None;
            }
            let du = (jyv * fx - jxv * fy) / det;
            let dv = (jxu * fy - jyu * fx) / det;
            u -= du;
            v -= dv;
            if du.abs() + dv.abs() < 1e-12 {
                break;
            }
        }
        (u.is_finite() && v.is_finite()).then_some((u, v))
    }

    fn inside(u: f64, v: f64) -> bool {
        (-CELL_EPS..=1.0 + CELL_EPS).contains(&u) && (-CELL_EPS..=1.0 + CELL_EPS).contains(&v)
    }

    /// Fractional (kept row, column) of projected point, walking from `start`
    fn locate(&self, x: f64, y: f64, start: (usize, usize)) -> Option<(f64, f64, (usize, usize))> {
        let (rows, cols) = self.proj_x.dim();
        let (mut r, mut c) = (start.0.min(rows - 2), start.1.min(cols - 2));

        for _ in 0..(rows + cols) {
            match self.invert_cell(r, c, x, y) {
                Some((u, v)) if Self::inside(u, v) => {
                    return Some((r as f64 + v, c as f64 + u, (r, c)))
                }
                Some((u, v)) => {
                    let step = |pos: usize, t: f64, n: usize| -> usize {
                        if t < 0.0 {
                            pos.saturating_sub(1)
                        } else if t > 1.0 {
                            (pos + 1).min(n - 2)
                        } else {
                            pos
                        }
                    };
                    let next = (step(r, v, rows), step(c, u, cols));
                    if next == (r, c) {
                        // pushed against the lattice edge
                        return None;
                    }
                    r = next.0;
                    c = next.1;
                }
                None => break,
            }
        }
        self.locate_exhaustive(x, y)
    }

    /// Nearest lattice node, then the cells sharing it
    fn locate_exhaustive(&self, x: f64, y: f64) -> Option<(f64, f64, (usize, usize))> {
        let (rows, cols) = self.proj_x.dim();
        let mut best: Option<(usize, usize, f64)> = None;
        for r in 0..rows {
            for c in 0..cols {
                let (px, py) = self.projected(r, c);
                let dist = (px - x).powi(2) + (py - y).powi(2);
                if dist.is_finite() && best.map_or(true, |b| dist < b.2) {
                    best = Some((r, c, dist));
                }
            }
        }
        let (br, bc, _) = best?;
        for r in [br.saturating_sub(1), br.min(rows - 2)] {
            for c in [bc.saturating_sub(1), bc.min(cols - 2)] {
                if let Some((u, v)) = self.invert_cell(r, c, x, y) {
                    if Self::inside(u, v) {
                        return Some((r as f64 + v, c as f64 + u, (r, c)));
                    }
                }
            }
        }
        None
    }

    /// Fractional kept-line index back to the original lattice line
    fn original_line(&self, kept_row: f64) -> f64 {
        let last = self.kept_lines.len() - 1;
        let i0 = (kept_row.floor().max(0.0) as usize).min(last - 1);
        let frac = kept_row - i0 as f64;
        let a = self.kept_lines[i0] as f64;
        let b = self.kept_lines[i0 + 1] as f64;
        a + frac * (b - a)
    }

    /// Inverse mapping with a starting lattice cell; returns the cell found for reuse
    pub fn to_pixel_from(
        &self,
        lon: f64,
        lat: f64,
        hint: Option<(usize, usize)>,
    ) -> ((f64, f64), Option<(usize, usize)>) {
        let (x, y) = self.projection.forward(lon, lat);
        if !(x.is_finite() && y.is_finite()) {
            return ((f64::NAN, f64::NAN), None);
        }
        let start = hint.unwrap_or((self.proj_x.nrows() / 2, self.proj_x.ncols() / 2));
        match self.locate(x, y, start) {
            Some((kept_row, col, cell)) => {
                let row = self.original_line(kept_row);
                let track = self.domain.track.value(self.track_sub.grid(row));
                let xtrack = self.domain.xtrack.value(self.xtrack_sub.grid(col));
                ((track, xtrack), Some(cell))
            }
            None => ((f64::NAN, f64::NAN), None),
        }
    }
}

impl CoordinateTransform for SwathCoordinateSystem {
    fn domain(&self) -> DataDomain {
        self.domain
    }

    fn to_geographic(&self, track: f64, xtrack: f64) -> (f64, f64) {
        let gt = self.domain.track.grid(track);
        let gx = self.domain.xtrack.grid(xtrack);
        if !(gt.is_finite() && gx.is_finite()) {
            return (f64::NAN, f64::NAN);
        }

        if !self.interpolate {
            let (rows, cols) = self.lon.dim();
            let r = (gt + 0.5).floor();
            let c = (gx + 0.5).floor();
            if r < 0.0 || c < 0.0 || r as usize >= rows || c as usize >= cols {
                return (f64::NAN, f64::NAN);
            }
            let (lon, lat) = self.sample(r as usize, c as usize);
            return Self::valid_location(lon, lat);
        }

        let (lon, lat) =
            self.interpolate_lattice(self.track_sub.value(gt), self.xtrack_sub.value(gx));
        Self::valid_location(lon, lat)
    }

    fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.to_pixel_from(lon, lat, None).0
    }
}

/// All geometry is fixed at construction, so systems compare by type alone
impl PartialEq for SwathCoordinateSystem {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Full geolocation lattice plus its relation to the data grid
#[derive(Debug, Clone)]
pub struct SwathNavigator {
    lon: Array2<f32>,
    lat: Array2<f32>,
    params: NavigationParams,
}

impl SwathNavigator {
    pub fn new(lon: Array2<f32>, lat: Array2<f32>, params: NavigationParams) -> SwathResult<Self> {
        params.validate()?;
        if lon.dim() != lat.dim() {
            return Err(SwathError::Navigation(format!(
                "longitude shape {:?} differs from latitude shape {:?}",
                lon.dim(),
                lat.dim()
            )));
        }
        log::info!(
            "Swath navigator: lattice {:?}, params {:?}",
            lon.dim(),
            params
        );
        Ok(Self { lon, lat, params })
    }

    /// Read the full lon/lat lattice; dimensions are reordered to (track, xtrack)
    pub fn from_extractor(
        extractor: &ArrayExtractor,
        lon_array: &str,
        lat_array: &str,
        track_dim: &str,
        xtrack_dim: &str,
        params: NavigationParams,
    ) -> SwathResult<Self> {
        let read = |array: &str| -> SwathResult<Array2<f32>> {
            let extraction = extractor.extract(array, &SubsetRequest::new())?;
            let (track_axis, xtrack_axis) = match (
                extraction.dimension_index(track_dim),
                extraction.dimension_index(xtrack_dim),
            ) {
                (Some(t), Some(x)) if extraction.dimensions.len() == 2 => (t, x),
                _ => {
                    return Err(SwathError::DimensionMismatch(format!(
                        "{} must be 2-D over ({}, {})",
                        array, track_dim, xtrack_dim
                    )))
                }
            };
            let shape = extraction.shape();
            let grid = Array2::from_shape_vec((shape[0], shape[1]), extraction.data.to_f32_vec())
                .map_err(|e| SwathError::DimensionMismatch(format!("{}: {}", array, e)))?;
            Ok(if track_axis < xtrack_axis {
                grid
            } else {
                grid.reversed_axes().as_standard_layout().to_owned()
            })
        };
        Self::new(read(lon_array)?, read(lat_array)?, params)
    }

    pub fn params(&self) -> &NavigationParams {
        &self.params
    }

    /// (track, xtrack) size of the lattice
    pub fn lattice_shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    /// Lattice window and data domain covering a data subset
    pub fn geo_window(&self, track: &SubsetRange, xtrack: &SubsetRange) -> SwathResult<GeoWindow> {
        let (rows, cols) = self.lon.dim();
        let p = &self.params;
        let (track_range, track_axis) =
            axis_window("track", track, p.track_ratio, p.track_offset, rows)?;
        let (xtrack_range, xtrack_axis) =
            axis_window("xtrack", xtrack, p.xtrack_ratio, p.xtrack_offset, cols)?;
        Ok(GeoWindow {
            track: track_range,
            xtrack: xtrack_range,
            domain: DataDomain::new(track_axis, xtrack_axis),
        })
    }

    pub fn coordinate_system(
        &self,
        track: &SubsetRange,
        xtrack: &SubsetRange,
    ) -> SwathResult<SwathCoordinateSystem> {
        let window = self.geo_window(track, xtrack)?;
        let (t, x) = (window.track, window.xtrack);
        let window_slice = s![
            t.start..=t.last_index();t.stride as isize,
            x.start..=x.last_index();x.stride as isize
        ];
        let lon = self.lon.slice(window_slice).to_owned();
        let lat = self.lat.slice(window_slice).to_owned();
        SwathCoordinateSystem::new(window.domain, lon, lat)
    }
}
