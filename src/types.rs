use ndarray::Array2;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Calibrated physical values (radiance, brightness temperature, reflectance)
pub type SwathReal = f32;

/// 2D calibrated swath image (track x cross-track)
pub type SwathImage = Array2<SwathReal>;

/// Named array dimension, fixed for the lifetime of an adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub length: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Numeric element type reported by a reader for one array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Character/string arrays; carried so readers can report them, never extracted
    Text,
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::Int8 => write!(f, "int8"),
            ElementType::Int16 => write!(f, "int16"),
            ElementType::Int32 => write!(f, "int32"),
            ElementType::Int64 => write!(f, "int64"),
            ElementType::Float32 => write!(f, "float32"),
            ElementType::Float64 => write!(f, "float64"),
            ElementType::Text => write!(f, "text"),
        }
    }
}

/// Flat row-major value buffer tagged with its element type
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ArrayData {
    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Int8(_) => ElementType::Int8,
            ArrayData::Int16(_) => ElementType::Int16,
            ArrayData::Int32(_) => ElementType::Int32,
            ArrayData::Int64(_) => ElementType::Int64,
            ArrayData::Float32(_) => ElementType::Float32,
            ArrayData::Float64(_) => ElementType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int8(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index` widened to f64
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            ArrayData::Int8(v) => v.get(index).and_then(|x| x.to_f64()),
            ArrayData::Int16(v) => v.get(index).and_then(|x| x.to_f64()),
            ArrayData::Int32(v) => v.get(index).and_then(|x| x.to_f64()),
            ArrayData::Int64(v) => v.get(index).and_then(|x| x.to_f64()),
            ArrayData::Float32(v) => v.get(index).and_then(|x| x.to_f64()),
            ArrayData::Float64(v) => v.get(index).copied(),
        }
    }

    /// All values widened to f64, in buffer order
    pub fn to_f64_vec(&self) -> Vec<f64> {
        fn widen<T: ToPrimitive>(values: &[T]) -> Vec<f64> {
            values
                .iter()
                .map(|v| v.to_f64().unwrap_or(f64::NAN))
                .collect()
        }
        match self {
            ArrayData::Int8(v) => widen(v),
            ArrayData::Int16(v) => widen(v),
            ArrayData::Int32(v) => widen(v),
            ArrayData::Int64(v) => widen(v),
            ArrayData::Float32(v) => widen(v),
            ArrayData::Float64(v) => v.clone(),
        }
    }

    /// All values converted to f32, in buffer order
    pub fn to_f32_vec(&self) -> Vec<f32> {
        fn narrow<T: ToPrimitive>(values: &[T]) -> Vec<f32> {
            values
                .iter()
                .map(|v| v.to_f32().unwrap_or(f32::NAN))
                .collect()
        }
        match self {
            ArrayData::Int8(v) => narrow(v),
            ArrayData::Int16(v) => narrow(v),
            ArrayData::Int32(v) => narrow(v),
            ArrayData::Int64(v) => narrow(v),
            ArrayData::Float32(v) => v.clone(),
            ArrayData::Float64(v) => narrow(v),
        }
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match self {
            ArrayData::Int16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            ArrayData::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            ArrayData::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            ArrayData::Float64(v) => Some(v),
            _ => None,
        }
    }
}

/// Typed array or global attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(String),
}

impl AttributeValue {
    /// Numeric values as f64; `None` for text attributes
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttributeValue::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Float(v) => Some(v.clone()),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One regularly spaced axis: `first + i * step` for `i in 0..length`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearAxis {
    pub first: f64,
    pub step: f64,
    pub length: usize,
}

impl LinearAxis {
    pub fn new(first: f64, step: f64, length: usize) -> Self {
        Self { first, step, length }
    }

    /// Axis running from `first` to `last` inclusive with `length` samples
    pub fn from_bounds(first: f64, last: f64, length: usize) -> Self {
        let step = if length > 1 {
            (last - first) / (length - 1) as f64
        } else {
            1.0
        };
        Self { first, step, length }
    }

    pub fn last(&self) -> f64 {
        self.first + self.step * (self.length.saturating_sub(1)) as f64
    }

    pub fn value(&self, grid: f64) -> f64 {
        self.first + grid * self.step
    }

    /// Fractional grid coordinate of `value`
    pub fn grid(&self, value: f64) -> f64 {
        (value - self.first) / self.step
    }
}

/// Description of the domain a value buffer is sampled on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleGrid {
    /// Full extent, unit step: origin 0, given lengths
    Integer { lengths: Vec<usize> },
    /// Partial or strided request, one axis per dimension
    Linear { axes: Vec<LinearAxis> },
    /// Regular longitude/latitude grid produced by reprojection
    Geographic { lon: LinearAxis, lat: LinearAxis },
}

impl SampleGrid {
    pub fn lengths(&self) -> Vec<usize> {
        match self {
            SampleGrid::Integer { lengths } => lengths.clone(),
            SampleGrid::Linear { axes } => axes.iter().map(|a| a.length).collect(),
            SampleGrid::Geographic { lon, lat } => vec![lat.length, lon.length],
        }
    }

    /// Axis for dimension `dim` regardless of variant
    pub fn axis(&self, dim: usize) -> Option<LinearAxis> {
        match self {
            SampleGrid::Integer { lengths } => {
                lengths.get(dim).map(|&n| LinearAxis::new(0.0, 1.0, n))
            }
            SampleGrid::Linear { axes } => axes.get(dim).copied(),
            SampleGrid::Geographic { lon, lat } => match dim {
                0 => Some(*lat),
                1 => Some(*lon),
                _ => None,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.lengths().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Envelope of the finite points; `None` if there are none
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let mut bbox: Option<BoundingBox> = None;
        let finite = points
            .iter()
            .filter(|(lon, lat)| lon.is_finite() && lat.is_finite());
        for &(lon, lat) in finite {
            bbox = Some(match bbox {
                None => BoundingBox {
                    min_lon: lon,
                    max_lon: lon,
                    min_lat: lat,
                    max_lat: lat,
                },
                Some(b) => BoundingBox {
                    min_lon: b.min_lon.min(lon),
                    max_lon: b.max_lon.max(lon),
                    min_lat: b.min_lat.min(lat),
                    max_lat: b.max_lat.max(lat),
                },
            });
        }
        bbox
    }
}

/// Error types for swath processing
#[derive(Debug, thiserror::Error)]
pub enum SwathError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    #[error("Calibration configuration error: {0}")]
    CalibrationConfig(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Reader error: {0}")]
    Reader(String),

    #[error("Ancillary table error: {0}")]
    Ancillary(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for swath operations
pub type SwathResult<T> = Result<T, SwathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_data_widening() {
        let data = ArrayData::Int16(vec![-999, 12, 2000]);
        assert_eq!(data.element_type(), ElementType::Int16);
        assert_eq!(data.len(), 3);
        assert_eq!(data.to_f64_vec(), vec![-999.0, 12.0, 2000.0]);
        assert_eq!(data.get_f64(1), Some(12.0));
        assert!(data.get_f64(3).is_none());
        assert!(data.as_f32().is_none());
    }

    #[test]
    fn test_linear_axis() {
        let axis = LinearAxis::from_bounds(2.0, 10.0, 5);
        assert_eq!(axis.step, 2.0);
        assert_eq!(axis.last(), 10.0);
        assert_eq!(axis.grid(6.0), 2.0);
        assert_eq!(axis.value(3.0), 8.0);
    }

    #[test]
    fn test_bounding_box_skips_nan() {
        let bbox = BoundingBox::from_points(&[(10.0, 5.0), (f64::NAN, 1.0), (-3.0, 7.5)]).unwrap();
        assert_eq!(bbox.min_lon, -3.0);
        assert_eq!(bbox.max_lon, 10.0);
        assert_eq!(bbox.min_lat, 5.0);
        assert_eq!(bbox.max_lat, 7.5);
        assert!(BoundingBox::from_points(&[(f64::NAN, f64::NAN)]).is_none());
    }
}
