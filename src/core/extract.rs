use crate::core::subset::{self, IndexRange, SubsetRequest};
use crate::io::reader::{dimensions_of, DimensionReader};
use crate::types::{
    ArrayData, Dimension, ElementType, LinearAxis, SampleGrid, SwathError, SwathResult,
};
use std::sync::Arc;

/// Result of one strided extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    pub array: String,
    pub data: ArrayData,
    pub grid: SampleGrid,
    pub dimensions: Vec<Dimension>,
    pub ranges: Vec<IndexRange>,
}

impl Extraction {
    /// Resolved counts, one per dimension
    pub fn shape(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.count).collect()
    }

    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }
}

/// Build the sample grid for a set of resolved ranges
pub fn sample_grid(dimensions: &[Dimension], ranges: &[IndexRange]) -> SampleGrid {
    let full = dimensions
        .iter()
        .zip(ranges)
        .all(|(d, r)| r.covers(d.length));
    if full {
        SampleGrid::Integer {
            lengths: dimensions.iter().map(|d| d.length).collect(),
        }
    } else {
        SampleGrid::Linear {
            axes: ranges
                .iter()
                .map(|r| LinearAxis::new(r.start as f64, r.stride as f64, r.count))
                .collect(),
        }
    }
}

/// Performs strided multi-dimensional reads through a [`DimensionReader`]
#[derive(Clone)]
pub struct ArrayExtractor {
    reader: Arc<dyn DimensionReader>,
}

impl ArrayExtractor {
    pub fn new(reader: Arc<dyn DimensionReader>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &Arc<dyn DimensionReader> {
        &self.reader
    }

    pub fn dimensions(&self, array: &str) -> SwathResult<Vec<Dimension>> {
        dimensions_of(self.reader.as_ref(), array)
    }

    /// Resolve `request` against `array` and read exactly the resolved ranges
    pub fn extract(&self, array: &str, request: &SubsetRequest) -> SwathResult<Extraction> {
        let element_type = self.reader.element_type(array)?;
        if element_type == ElementType::Text {
            return Err(SwathError::UnsupportedType(format!(
                "array {} has element type {}",
                array, element_type
            )));
        }

        let dimensions = self.dimensions(array)?;
        let ranges = subset::resolve(request, &dimensions)?;
        log::debug!("Extracting {}: {:?}", array, ranges);

        let start: Vec<usize> = ranges.iter().map(|r| r.start).collect();
        let count: Vec<usize> = ranges.iter().map(|r| r.count).collect();
        let stride: Vec<usize> = ranges.iter().map(|r| r.stride).collect();

        let data = self.reader.read_strided(array, &start, &count, &stride)?;

        let expected: usize = count.iter().product();
        if data.len() != expected {
            return Err(SwathError::DimensionMismatch(format!(
                "reader returned {} values for {}, expected {}",
                data.len(),
                array,
                expected
            )));
        }
        if data.element_type() != element_type {
            return Err(SwathError::Reader(format!(
                "reader declared {} for {} but returned {}",
                element_type,
                array,
                data.element_type()
            )));
        }

        let grid = sample_grid(&dimensions, &ranges);
        Ok(Extraction {
            array: array.to_string(),
            data,
            grid,
            dimensions,
            ranges,
        })
    }
}
