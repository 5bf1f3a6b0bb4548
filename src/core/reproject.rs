//! Swath-to-grid reprojection onto a regular longitude/latitude grid

use crate::core::navigation::{CoordinateTransform, SwathCoordinateSystem};
use crate::types::{LinearAxis, SampleGrid, SwathError, SwathImage, SwathResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How a swath value is taken for an inverse-mapped grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleMethod {
    Nearest,
    Bilinear,
}

/// Reprojection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleParams {
    /// Target grid spacing in degrees
    pub resolution_deg: f64,
    pub method: ResampleMethod,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            resolution_deg: 0.1,
            method: ResampleMethod::Nearest,
        }
    }
}

/// Values on a regular north-up lon/lat grid
#[derive(Debug, Clone)]
pub struct GeoGridded {
    pub values: SwathImage,
    pub lon: LinearAxis,
    pub lat: LinearAxis,
}

impl GeoGridded {
    pub fn grid(&self) -> SampleGrid {
        SampleGrid::Geographic {
            lon: self.lon,
            lat: self.lat,
        }
    }

    /// Share of cells holding a finite value
    pub fn coverage(&self) -> f64 {
        let valid = self.values.iter().filter(|v| v.is_finite()).count();
        valid as f64 / self.values.len().max(1) as f64
    }
}

/// Inverse-mapping resampler
#[derive(Debug, Clone)]
pub struct SwathResampler {
    params: ResampleParams,
}

impl SwathResampler {
    pub fn new(params: ResampleParams) -> SwathResult<Self> {
        if !(params.resolution_deg.is_finite() && params.resolution_deg > 0.0) {
            return Err(SwathError::Navigation(format!(
                "resolution must be positive, got {}",
                params.resolution_deg
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &ResampleParams {
        &self.params
    }

    /// Target axes covering the swath envelope
    pub fn target_axes<T: CoordinateTransform>(
        &self,
        transform: &T,
    ) -> SwathResult<(LinearAxis, LinearAxis)> {
        let bbox = transform.envelope().ok_or_else(|| {
            SwathError::Navigation("swath corners have no valid location".to_string())
        })?;
        let res = self.params.resolution_deg;
        let n_lon = ((bbox.max_lon - bbox.min_lon) / res).floor() as usize + 1;
        let n_lat = ((bbox.max_lat - bbox.min_lat) / res).floor() as usize + 1;
        Ok((
            LinearAxis::new(bbox.min_lon, res, n_lon),
            LinearAxis::new(bbox.max_lat, -res, n_lat),
        ))
    }

    /// Value of `values` at fractional array position (row, col)
    fn sample(&self, values: &SwathImage, row: f64, col: f64) -> f32 {
        let (rows, cols) = values.dim();
        if !(row.is_finite() && col.is_finite()) {
            return f32::NAN;
        }
        match self.params.method {
            ResampleMethod::Nearest => {
                let r = (row + 0.5).floor();
                let c = (col + 0.5).floor();
                if r < 0.0 || c < 0.0 || r as usize >= rows || c as usize >= cols {
                    f32::NAN
                } else {
                    values[[r as usize, c as usize]]
                }
            }
            ResampleMethod::Bilinear => {
                let tol = 1e-6;
                if row < -tol
                    || col < -tol
                    || row > (rows - 1) as f64 + tol
                    || col > (cols - 1) as f64 + tol
                {
                    return f32::NAN;
                }
                if rows < 2 || cols < 2 {
                    let r = (row.round() as usize).min(rows - 1);
                    let c = (col.round() as usize).min(cols - 1);
                    return values[[r, c]];
                }
                let r0 = (row.floor().max(0.0) as usize).min(rows - 2);
                let c0 = (col.floor().max(0.0) as usize).min(cols - 2);
                let dr = row - r0 as f64;
                let dc = col - c0 as f64;

                let v00 = values[[r0, c0]] as f64;
                let v01 = values[[r0, c0 + 1]] as f64;
                let v10 = values[[r0 + 1, c0]] as f64;
                let v11 = values[[r0 + 1, c0 + 1]] as f64;

                (v00 * (1.0 - dr) * (1.0 - dc)
                    + v01 * (1.0 - dr) * dc
                    + v10 * dr * (1.0 - dc)
                    + v11 * dr * dc) as f32
            }
        }
    }

    fn resample_row<T, F>(
        &self,
        values: &SwathImage,
        transform: &T,
        lon: &LinearAxis,
        lat: f64,
        to_pixel: &F,
    ) -> Vec<f32>
    where
        T: CoordinateTransform,
        F: Fn(&T, f64, f64, Option<(usize, usize)>) -> ((f64, f64), Option<(usize, usize)>),
    {
        let domain = transform.domain();
        let mut hint = None;
        (0..lon.length)
            .map(|j| {
                let ((track, xtrack), cell) = to_pixel(transform, lon.value(j as f64), lat, hint);
                if cell.is_some() {
                    hint = cell;
                }
                self.sample(values, domain.track.grid(track), domain.xtrack.grid(xtrack))
            })
            .collect()
    }

    fn resample_with<T, F>(
        &self,
        values: &SwathImage,
        transform: &T,
        to_pixel: F,
    ) -> SwathResult<GeoGridded>
    where
        T: CoordinateTransform,
        F: Fn(&T, f64, f64, Option<(usize, usize)>) -> ((f64, f64), Option<(usize, usize)>) + Sync,
    {
        let domain = transform.domain();
        if values.dim() != domain.shape() {
            return Err(SwathError::DimensionMismatch(format!(
                "swath values {:?} do not match navigation domain {:?}",
                values.dim(),
                domain.shape()
            )));
        }

        let (lon, lat) = self.target_axes(transform)?;
        log::info!(
            "Reprojecting {:?} swath onto {}x{} grid at {} deg ({:?})",
            values.dim(),
            lat.length,
            lon.length,
            self.params.resolution_deg,
            self.params.method
        );

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<f32>> = {
            use rayon::prelude::*;
            (0..lat.length)
                .into_par_iter()
                .map(|i| self.resample_row(values, transform, &lon, lat.value(i as f64), &to_pixel))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<f32>> = (0..lat.length)
            .map(|i| self.resample_row(values, transform, &lon, lat.value(i as f64), &to_pixel))
            .collect();

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((lat.length, lon.length), flat)
            .map_err(|e| SwathError::DimensionMismatch(format!("Shape error: {}", e)))?;

        let gridded = GeoGridded { values, lon, lat };
        log::debug!("Reprojection coverage: {:.1}%", gridded.coverage() * 100.0);
        Ok(gridded)
    }

    /// Resample onto the regular grid using any coordinate transform
    pub fn resample<T: CoordinateTransform>(
        &self,
        values: &SwathImage,
        transform: &T,
    ) -> SwathResult<GeoGridded> {
        self.resample_with(values, transform, |t: &T, lon, lat, _| {
            (t.to_pixel(lon, lat), None)
        })
    }

    /// Resample through a swath coordinate system, reusing the lattice cell found
    /// for the previous cell of each row as the search start
    pub fn resample_swath(
        &self,
        values: &SwathImage,
        cs: &SwathCoordinateSystem,
    ) -> SwathResult<GeoGridded> {
        self.resample_with(values, cs, |t: &SwathCoordinateSystem, lon, lat, hint| {
            t.to_pixel_from(lon, lat, hint)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::navigation::DataDomain;
    use approx::assert_abs_diff_eq;

    /// lon = 100 + 0.5 * xtrack, lat = 10 - 0.5 * track
    struct Affine {
        domain: DataDomain,
    }

    impl CoordinateTransform for Affine {
        fn domain(&self) -> DataDomain {
            self.domain
        }

        fn to_geographic(&self, track: f64, xtrack: f64) -> (f64, f64) {
            (100.0 + 0.5 * xtrack, 10.0 - 0.5 * track)
        }

        fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
            let track = (10.0 - lat) / 0.5;
            let xtrack = (lon - 100.0) / 0.5;
            let (rows, cols) = self.domain.shape();
            if track < 0.0
                || xtrack < 0.0
                || track > (rows - 1) as f64
                || xtrack > (cols - 1) as f64
            {
                (f64::NAN, f64::NAN)
            } else {
                (track, xtrack)
            }
        }
    }

    fn swath() -> (SwathImage, Affine) {
        let values = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32);
        let domain = DataDomain::new(LinearAxis::new(0.0, 1.0, 3), LinearAxis::new(0.0, 1.0, 4));
        (values, Affine { domain })
    }

    #[test]
    fn test_nearest_resample_on_matching_grid() {
        let (values, transform) = swath();
        let resampler = SwathResampler::new(ResampleParams {
            resolution_deg: 0.5,
            method: ResampleMethod::Nearest,
        })
        .unwrap();
        let out = resampler.resample(&values, &transform).unwrap();
        assert_eq!(out.values.dim(), (3, 4));
        assert_eq!(out.lat.first, 10.0);
        assert_eq!(out.lon.first, 100.0);
        assert_eq!(out.values, values);
        assert_eq!(out.grid().lengths(), vec![3, 4]);
    }

    #[test]
    fn test_bilinear_midpoints() {
        let (values, transform) = swath();
        let resampler = SwathResampler::new(ResampleParams {
            resolution_deg: 0.25,
            method: ResampleMethod::Bilinear,
        })
        .unwrap();
        let out = resampler.resample(&values, &transform).unwrap();
        assert_eq!(out.values.dim(), (5, 7));
        // lat 9.75 / lon 100.25 -> track 0.5, xtrack 0.5
        assert_abs_diff_eq!(out.values[[1, 1]], 2.5, epsilon = 1e-5);
        assert!(out.coverage() > 0.99);
    }

    #[test]
    fn test_cells_outside_swath_are_nan() {
        let values = Array2::from_elem((3, 3), 1.0f32);
        let domain = DataDomain::new(LinearAxis::new(0.0, 1.0, 3), LinearAxis::new(0.0, 1.0, 3));
        // rotated swath: envelope is larger than the footprint
        struct Diamond(DataDomain);
        impl CoordinateTransform for Diamond {
            fn domain(&self) -> DataDomain {
                self.0
            }
            fn to_geographic(&self, t: f64, x: f64) -> (f64, f64) {
                (t + x, x - t)
            }
            fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
                let t = (lon - lat) / 2.0;
                let x = (lon + lat) / 2.0;
                if (0.0..=2.0).contains(&t) && (0.0..=2.0).contains(&x) {
                    (t, x)
                } else {
                    (f64::NAN, f64::NAN)
                }
            }
        }
        let resampler = SwathResampler::new(ResampleParams::default()).unwrap();
        let out = resampler.resample(&values, &Diamond(domain)).unwrap();
        let nan_count = out.values.iter().filter(|v| v.is_nan()).count();
        assert!(nan_count > 0);
        assert!(out.values.iter().any(|v| *v == 1.0));
    }

    #[test]
    fn test_shape_mismatch_and_bad_params() {
        let (_, transform) = swath();
        let resampler = SwathResampler::new(ResampleParams::default()).unwrap();
        let wrong = Array2::<f32>::zeros((2, 2));
        assert!(matches!(
            resampler.resample(&wrong, &transform),
            Err(SwathError::DimensionMismatch(_))
        ));
        assert!(SwathResampler::new(ResampleParams {
            resolution_deg: 0.0,
            method: ResampleMethod::Nearest
        })
        .is_err());
    }
}
