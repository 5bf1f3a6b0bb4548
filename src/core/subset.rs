use crate::types::{Dimension, SwathError, SwathResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requested (first, last, step) along one dimension, in physical index units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsetRange {
    pub first: f64,
    pub last: f64,
    pub step: f64,
}

impl SubsetRange {
    pub fn new(first: f64, last: f64, step: f64) -> Self {
        Self { first, last, step }
    }

    /// Whole extent of a dimension of `length`, unit step
    pub fn full(length: usize) -> Self {
        Self::new(0.0, length as f64 - 1.0, 1.0)
    }

    /// A single index
    pub fn single(index: usize) -> Self {
        Self::new(index as f64, index as f64, 1.0)
    }
}

/// Named-dimension subset request; absent dimensions mean full extent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetRequest {
    ranges: BTreeMap<String, SubsetRange>,
}

impl SubsetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: &str, first: f64, last: f64, step: f64) -> Self {
        self.set(dimension, SubsetRange::new(first, last, step));
        self
    }

    pub fn set(&mut self, dimension: &str, range: SubsetRange) {
        self.ranges.insert(dimension.to_string(), range);
    }

    pub fn get(&self, dimension: &str) -> Option<&SubsetRange> {
        self.ranges.get(dimension)
    }

    pub fn remove(&mut self, dimension: &str) -> Option<SubsetRange> {
        self.ranges.remove(dimension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubsetRange)> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Concrete (start, count, stride) along one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub count: usize,
    pub stride: usize,
}

impl IndexRange {
    pub fn new(start: usize, count: usize, stride: usize) -> Self {
        Self { start, count, stride }
    }

    /// Last index touched by this range
    pub fn last_index(&self) -> usize {
        self.start + (self.count - 1) * self.stride
    }

    pub fn covers(&self, length: usize) -> bool {
        self.start == 0 && self.stride == 1 && self.count == length
    }
}

/// Resolve one requested range against a dimension of `length`.
///
/// Degenerate (length 1) dimensions are never subsettable and always
/// resolve to (0, 1, 1).
pub fn resolve_range(name: &str, range: &SubsetRange, length: usize) -> SwathResult<IndexRange> {
    if length == 1 {
        return Ok(IndexRange::new(0, 1, 1));
    }

    let SubsetRange { first, last, step } = *range;
    if !(first.is_finite() && last.is_finite() && step.is_finite()) {
        return Err(SwathError::InvalidRange(format!(
            "{}: non-finite range ({}, {}, {})",
            name, first, last, step
        )));
    }
    if step <= 0.0 || step.trunc() < 1.0 {
        return Err(SwathError::InvalidRange(format!(
            "{}: step must be >= 1, got {}",
            name, step
        )));
    }
    if first < 0.0 {
        return Err(SwathError::InvalidRange(format!(
            "{}: first index {} is negative",
            name, first
        )));
    }
    if first > last {
        return Err(SwathError::InvalidRange(format!(
            "{}: first {} exceeds last {}",
            name, first, last
        )));
    }

    let start = first.trunc() as usize;
    let stride = step.trunc() as usize;
    let count = ((last - first) / stride as f64).floor() as i64 + 1;
    if count < 1 {
        return Err(SwathError::InvalidRange(format!(
            "{}: resolved count {} is not positive",
            name, count
        )));
    }

    let resolved = IndexRange::new(start, count as usize, stride);
    if resolved.last_index() >= length {
        return Err(SwathError::InvalidRange(format!(
            "{}: range ({}, {}, {}) overruns dimension length {}",
            name, first, last, step, length
        )));
    }
    Ok(resolved)
}

/// Resolve a request against an array's dimension table, one range per dimension
/// in the table's order. Entries naming other dimensions are ignored.
pub fn resolve(request: &SubsetRequest, dimensions: &[Dimension]) -> SwathResult<Vec<IndexRange>> {
    dimensions
        .iter()
        .map(|dim| {
            let range = request
                .get(&dim.name)
                .copied()
                .unwrap_or_else(|| SubsetRange::full(dim.length));
            resolve_range(&dim.name, &range, dim.length)
        })
        .collect()
}
