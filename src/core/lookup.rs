use crate::types::{ArrayData, SwathError, SwathResult};
use serde::{Deserialize, Serialize};

/// How a table domain is searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Uniformly spaced domain; index computed directly
    LinearUniform,
    /// Arbitrary monotonic domain; nearest entry by binary search
    General,
}

/// Relative tolerance on the spacing of a uniform table
const UNIFORM_TOLERANCE: f64 = 1e-4;

/// Two parallel, monotonically ordered sequences plus a search mode
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    domain: Vec<f64>,
    codomain: Vec<f64>,
    mode: InterpolationMode,
    ascending: bool,
}

fn strict_direction(values: &[f64]) -> Option<bool> {
    if values.len() < 2 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let ascending = values[1] > values[0];
    let ok = values
        .windows(2)
        .all(|w| if ascending { w[1] > w[0] } else { w[1] < w[0] });
    ok.then_some(ascending)
}

impl LookupTable {
    pub fn new(domain: Vec<f64>, codomain: Vec<f64>, mode: InterpolationMode) -> SwathResult<Self> {
        if domain.len() != codomain.len() {
            return Err(SwathError::CalibrationConfig(format!(
                "lookup table domain has {} entries but codomain has {}",
                domain.len(),
                codomain.len()
            )));
        }
        let ascending = strict_direction(&domain).ok_or_else(|| {
            SwathError::CalibrationConfig(
                "lookup table domain must hold at least two finite, strictly monotonic values"
                    .to_string(),
            )
        })?;

        if mode == InterpolationMode::LinearUniform {
            let step = (domain[domain.len() - 1] - domain[0]) / (domain.len() - 1) as f64;
            let uniform = domain
                .windows(2)
                .all(|w| ((w[1] - w[0]) - step).abs() <= UNIFORM_TOLERANCE * step.abs());
            if !uniform {
                return Err(SwathError::CalibrationConfig(
                    "lookup table domain is not uniformly spaced".to_string(),
                ));
            }
        }

        Ok(Self {
            domain,
            codomain,
            mode,
            ascending,
        })
    }

    /// Table converting in the opposite direction; the codomain must be strictly monotonic too
    pub fn inverse(&self) -> SwathResult<Self> {
        LookupTable::new(
            self.codomain.clone(),
            self.domain.clone(),
            InterpolationMode::General,
        )
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn codomain(&self) -> &[f64] {
        &self.codomain
    }

    /// (min, max) of the domain
    fn bounds(&self) -> (f64, f64) {
        let n = self.domain.len();
        if self.ascending {
            (self.domain[0], self.domain[n - 1])
        } else {
            (self.domain[n - 1], self.domain[0])
        }
    }

    /// Index of the domain entry selected for `x`, `None` outside the table
    pub fn index_of(&self, x: f64) -> Option<usize> {
        let (lo, hi) = self.bounds();
        if !x.is_finite() || x < lo || x > hi {
            return None;
        }
        match self.mode {
            InterpolationMode::LinearUniform => {
                let n = self.domain.len();
                let step = (self.domain[n - 1] - self.domain[0]) / (n - 1) as f64;
                let idx = ((x - self.domain[0]) / step).round();
                Some((idx.max(0.0) as usize).min(n - 1))
            }
            InterpolationMode::General => Some(self.nearest_index(x)),
        }
    }

    /// Nearest entry for an `x` already known to lie within the bounds
    fn nearest_index(&self, x: f64) -> usize {
        let n = self.domain.len();
        // first position whose value is past x in table order
        let pos = self
            .domain
            .partition_point(|&d| if self.ascending { d <= x } else { d >= x });
        if pos == 0 {
            return 0;
        }
        if pos >= n {
            return n - 1;
        }
        let before = (x - self.domain[pos - 1]).abs();
        let after = (self.domain[pos] - x).abs();
        if after < before {
            pos
        } else {
            pos - 1
        }
    }

    /// Codomain value for `x`, NaN when `x` has no resolvable index
    pub fn lookup(&self, x: f64) -> f64 {
        match self.index_of(x) {
            Some(i) => self.codomain[i],
            None => f64::NAN,
        }
    }
}

/// Table indexed directly by raw unsigned 16-bit counts
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    values: Vec<f32>,
    fill: f32,
}

impl CountTable {
    /// Fill marker used by VIIRS brightness-temperature tables
    pub const DEFAULT_FILL: f32 = -999.9;

    pub fn new(values: Vec<f32>, fill: f32) -> SwathResult<Self> {
        if values.is_empty() || values.len() > u16::MAX as usize + 1 {
            return Err(SwathError::CalibrationConfig(format!(
                "count table must hold 1..=65536 entries, got {}",
                values.len()
            )));
        }
        Ok(Self { values, fill })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn at(&self, index: i64) -> f32 {
        if index < 0 || index as usize >= self.values.len() {
            return f32::NAN;
        }
        let v = self.values[index as usize];
        if v == self.fill {
            f32::NAN
        } else {
            v
        }
    }

    /// Map raw counts to table values; 16-bit counts are read as unsigned
    pub fn decode(&self, raw: &ArrayData) -> SwathResult<Vec<f32>> {
        Ok(match raw {
            ArrayData::Int8(v) => v.iter().map(|&c| self.at(c as u8 as i64)).collect(),
            ArrayData::Int16(v) => v.iter().map(|&c| self.at(c as u16 as i64)).collect(),
            ArrayData::Int32(v) => v.iter().map(|&c| self.at(c as i64)).collect(),
            ArrayData::Int64(v) => v.iter().map(|&c| self.at(c)).collect(),
            ArrayData::Float32(_) | ArrayData::Float64(_) => {
                return Err(SwathError::UnsupportedType(format!(
                    "count table decode needs integer counts, got {}",
                    raw.element_type()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn bt_table() -> LookupTable {
        // brightness temperature 180..320 K in 1 K bins -> monotonic "radiance"
        let bt: Vec<f64> = (180..=320).map(|t| t as f64).collect();
        let rad: Vec<f64> = bt.iter().map(|t| (t / 100.0).powi(4)).collect();
        LookupTable::new(bt, rad, InterpolationMode::LinearUniform).unwrap()
    }

    #[test]
    fn test_uniform_lookup() {
        let table = bt_table();
        assert_eq!(table.index_of(180.0), Some(0));
        assert_eq!(table.index_of(200.4), Some(20));
        assert_eq!(table.index_of(200.6), Some(21));
        assert!(table.lookup(100.0).is_nan());
        assert!(table.lookup(400.0).is_nan());
        assert!(table.lookup(f64::NAN).is_nan());
    }

    #[test]
    fn test_values_just_outside_domain_are_nan() {
        let forward = bt_table();
        assert!(forward.lookup(179.6).is_nan());
        assert!(forward.lookup(320.4).is_nan());
        assert_eq!(forward.index_of(180.4), Some(0));
        assert_eq!(forward.index_of(319.6), Some(140));

        let backward = forward.inverse().unwrap();
        assert!(backward.lookup(forward.lookup(179.6)).is_nan());
        assert!(backward.lookup(forward.lookup(320.4)).is_nan());
        // just below the smallest radiance
        assert!(backward.lookup(forward.codomain()[0] - 1e-6).is_nan());
    }

    #[test]
    fn test_general_lookup_descending() {
        let table = LookupTable::new(
            vec![10.0, 5.0, 2.0, 1.0],
            vec![1.0, 2.0, 3.0, 4.0],
            InterpolationMode::General,
        )
        .unwrap();
        assert_eq!(table.lookup(4.0), 2.0);
        assert_eq!(table.lookup(1.2), 4.0);
        assert_eq!(table.lookup(10.0), 1.0);
        assert!(table.lookup(11.0).is_nan());
        assert!(table.lookup(0.5).is_nan());
    }

    #[test]
    fn test_round_trip_within_one_bin() {
        let forward = bt_table();
        let backward = forward.inverse().unwrap();
        for x in [180.0, 211.3, 250.5, 299.9, 320.0] {
            let back = backward.lookup(forward.lookup(x));
            assert!((back - x).abs() <= 1.0, "x={} back={}", x, back);
        }
        assert!(backward.lookup(forward.lookup(500.0)).is_nan());
    }

    #[test]
    fn test_table_validation() {
        assert!(matches!(
            LookupTable::new(vec![1.0, 2.0], vec![1.0], InterpolationMode::General),
            Err(SwathError::CalibrationConfig(_))
        ));
        let zeros = vec![0.0; 3];
        let repeated = LookupTable::new(
            vec![1.0, 1.0, 2.0],
            zeros.clone(),
            InterpolationMode::General,
        );
        assert!(repeated.is_err());
        let uneven = LookupTable::new(
            vec![1.0, 2.0, 4.0],
            zeros,
            InterpolationMode::LinearUniform,
        );
        assert!(uneven.is_err());
        let (domain, constant) = (vec![1.0, 2.0, 3.0], vec![5.0; 3]);
        let flat = LookupTable::new(domain, constant, InterpolationMode::General).unwrap();
        assert!(flat.inverse().is_err());
    }

    #[test]
    fn test_count_table() {
        let mut values: Vec<f32> = (0..65536).map(|i| 200.0 + i as f32 * 0.001).collect();
        values[3] = CountTable::DEFAULT_FILL;
        let table = CountTable::new(values, CountTable::DEFAULT_FILL).unwrap();
        let decoded = table.decode(&ArrayData::Int16(vec![0, 3, -1])).unwrap();
        assert_abs_diff_eq!(decoded[0], 200.0);
        assert!(decoded[1].is_nan());
        // -1 as unsigned is 65535
        assert_abs_diff_eq!(decoded[2], 200.0 + 65535.0 * 0.001, epsilon = 1e-2);
        assert!(table.decode(&ArrayData::Float32(vec![1.0])).is_err());
    }
}
