use crate::types::{ArrayData, AttributeValue, Dimension, ElementType, SwathError, SwathResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Minimal contract the pipeline needs from a multi-dimensional array store.
///
/// All index arguments are zero-based, one entry per dimension, in the
/// reader's declared dimension order. Implementations must tolerate
/// concurrent calls; readers that cannot should be wrapped in
/// [`SerializedReader`].
pub trait DimensionReader: Send + Sync {
    /// Ordered dimension names of `array`
    fn dimension_names(&self, array: &str) -> SwathResult<Vec<String>>;

    /// Ordered dimension lengths of `array`
    fn dimension_lengths(&self, array: &str) -> SwathResult<Vec<usize>>;

    /// Element type tag of `array`
    fn element_type(&self, array: &str) -> SwathResult<ElementType>;

    /// Strided hyperslab read, returned flat in row-major order
    fn read_strided(
        &self,
        array: &str,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
    ) -> SwathResult<ArrayData>;

    /// Attribute attached to `array`, `None` if absent
    fn array_attribute(&self, array: &str, name: &str) -> SwathResult<Option<AttributeValue>>;

    /// File-level attribute, `None` if absent
    fn global_attribute(&self, name: &str) -> SwathResult<Option<AttributeValue>>;
}

/// Dimension name/length table of `array`
pub fn dimensions_of<R: DimensionReader + ?Sized>(
    reader: &R,
    array: &str,
) -> SwathResult<Vec<Dimension>> {
    let names = reader.dimension_names(array)?;
    let lengths = reader.dimension_lengths(array)?;
    if names.len() != lengths.len() {
        return Err(SwathError::Reader(format!(
            "Array {} reports {} dimension names but {} lengths",
            array,
            names.len(),
            lengths.len()
        )));
    }
    Ok(names
        .into_iter()
        .zip(lengths)
        .map(|(name, length)| Dimension { name, length })
        .collect())
}

#[derive(Debug, Clone)]
struct MemoryArray {
    dimensions: Vec<Dimension>,
    element_type: ElementType,
    data: Option<ArrayData>,
    attributes: HashMap<String, AttributeValue>,
}

/// In-memory reader over already decoded arrays
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    arrays: HashMap<String, MemoryArray>,
    globals: HashMap<String, AttributeValue>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a numeric array; `data` must hold the product of the lengths
    pub fn add_array(
        &mut self,
        name: &str,
        dims: &[(&str, usize)],
        data: ArrayData,
    ) -> SwathResult<()> {
        let dimensions: Vec<Dimension> = dims.iter().map(|(n, l)| Dimension::new(*n, *l)).collect();
        let expected: usize = dimensions.iter().map(|d| d.length).product();
        if data.len() != expected {
            return Err(SwathError::DimensionMismatch(format!(
                "Array {} declares {} elements but {} were supplied",
                name,
                expected,
                data.len()
            )));
        }

        log::debug!(
            "Registered in-memory array {} ({:?}, {} elements)",
            name,
            data.element_type(),
            expected
        );
        self.arrays.insert(
            name.to_string(),
            MemoryArray {
                dimensions,
                element_type: data.element_type(),
                data: Some(data),
                attributes: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Builder form of [`MemoryReader::add_array`]
    pub fn with_array(
        mut self,
        name: &str,
        dims: &[(&str, usize)],
        data: ArrayData,
    ) -> SwathResult<Self> {
        self.add_array(name, dims, data)?;
        Ok(self)
    }

    /// Register a character array; it can be described but not read
    pub fn add_text_array(&mut self, name: &str, dims: &[(&str, usize)]) {
        self.arrays.insert(
            name.to_string(),
            MemoryArray {
                dimensions: dims.iter().map(|(n, l)| Dimension::new(*n, *l)).collect(),
                element_type: ElementType::Text,
                data: None,
                attributes: HashMap::new(),
            },
        );
    }

    pub fn set_attribute(
        &mut self,
        array: &str,
        name: &str,
        value: AttributeValue,
    ) -> SwathResult<()> {
        let entry = self
            .arrays
            .get_mut(array)
            .ok_or_else(|| SwathError::Reader(format!("No such array: {}", array)))?;
        entry.attributes.insert(name.to_string(), value);
        Ok(())
    }

    pub fn set_global_attribute(&mut self, name: &str, value: AttributeValue) {
        self.globals.insert(name.to_string(), value);
    }

    fn array(&self, name: &str) -> SwathResult<&MemoryArray> {
        self.arrays
            .get(name)
            .ok_or_else(|| SwathError::Reader(format!("No such array: {}", name)))
    }
}

/// Copy the hyperslab described by start/count/stride out of a row-major buffer
fn gather<T: Copy>(
    values: &[T],
    lengths: &[usize],
    start: &[usize],
    count: &[usize],
    stride: &[usize],
) -> Vec<T> {
    let rank = lengths.len();
    let total: usize = count.iter().product();
    let mut src_strides = vec![1usize; rank];
    for d in (0..rank.saturating_sub(1)).rev() {
        src_strides[d] = src_strides[d + 1] * lengths[d + 1];
    }

    let mut out = Vec::with_capacity(total);
    let mut index = vec![0usize; rank];
    for _ in 0..total {
        let offset: usize = (0..rank)
            .map(|d| (start[d] + index[d] * stride[d]) * src_strides[d])
            .sum();
        out.push(values[offset]);

        // odometer over the output index, last dimension fastest
        for d in (0..rank).rev() {
            index[d] += 1;
            if index[d] < count[d] {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

impl DimensionReader for MemoryReader {
    fn dimension_names(&self, array: &str) -> SwathResult<Vec<String>> {
        let dimensions = &self.array(array)?.dimensions;
        Ok(dimensions.iter().map(|d| d.name.clone()).collect())
    }

    fn dimension_lengths(&self, array: &str) -> SwathResult<Vec<usize>> {
        let dimensions = &self.array(array)?.dimensions;
        Ok(dimensions.iter().map(|d| d.length).collect())
    }

    fn element_type(&self, array: &str) -> SwathResult<ElementType> {
        Ok(self.array(array)?.element_type)
    }

    fn read_strided(
        &self,
        array: &str,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
    ) -> SwathResult<ArrayData> {
        let entry = self.array(array)?;
        let lengths: Vec<usize> = entry.dimensions.iter().map(|d| d.length).collect();
        let rank = lengths.len();

        if start.len() != rank || count.len() != rank || stride.len() != rank {
            return Err(SwathError::Reader(format!(
                "Read of {} expects {} index entries per argument",
                array, rank
            )));
        }
        for d in 0..rank {
            if count[d] == 0
                || stride[d] == 0
                || start[d] + (count[d] - 1) * stride[d] >= lengths[d]
            {
                return Err(SwathError::Reader(format!(
                    "Read of {} out of bounds on {}: start={} count={} stride={} length={}",
                    array, entry.dimensions[d].name, start[d], count[d], stride[d], lengths[d]
                )));
            }
        }

        let data = entry
            .data
            .as_ref()
            .ok_or_else(|| SwathError::Reader(format!("Array {} holds no numeric data", array)))?;

        Ok(match data {
            ArrayData::Int8(v) => ArrayData::Int8(gather(v, &lengths, start, count, stride)),
            ArrayData::Int16(v) => ArrayData::Int16(gather(v, &lengths, start, count, stride)),
            ArrayData::Int32(v) => ArrayData::Int32(gather(v, &lengths, start, count, stride)),
            ArrayData::Int64(v) => ArrayData::Int64(gather(v, &lengths, start, count, stride)),
            ArrayData::Float32(v) => ArrayData::Float32(gather(v, &lengths, start, count, stride)),
            ArrayData::Float64(v) => ArrayData::Float64(gather(v, &lengths, start, count, stride)),
        })
    }

    fn array_attribute(&self, array: &str, name: &str) -> SwathResult<Option<AttributeValue>> {
        Ok(self.array(array)?.attributes.get(name).cloned())
    }

    fn global_attribute(&self, name: &str) -> SwathResult<Option<AttributeValue>> {
        Ok(self.globals.get(name).cloned())
    }
}

/// Wraps a reader that is not safe for concurrent access behind a single lock
pub struct SerializedReader<R> {
    inner: Mutex<R>,
}

impl<R: Send> SerializedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: Mutex::new(reader),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

/// Reader whose calls need exclusive access to the underlying handle
pub trait ExclusiveReader: Send {
    fn dimension_names(&mut self, array: &str) -> SwathResult<Vec<String>>;
    fn dimension_lengths(&mut self, array: &str) -> SwathResult<Vec<usize>>;
    fn element_type(&mut self, array: &str) -> SwathResult<ElementType>;
    fn read_strided(
        &mut self,
        array: &str,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
    ) -> SwathResult<ArrayData>;
    fn array_attribute(&mut self, array: &str, name: &str) -> SwathResult<Option<AttributeValue>>;
    fn global_attribute(&mut self, name: &str) -> SwathResult<Option<AttributeValue>>;
}

impl<R: ExclusiveReader> DimensionReader for SerializedReader<R> {
    fn dimension_names(&self, array: &str) -> SwathResult<Vec<String>> {
        self.inner.lock().dimension_names(array)
    }

    fn dimension_lengths(&self, array: &str) -> SwathResult<Vec<usize>> {
        self.inner.lock().dimension_lengths(array)
    }

    fn element_type(&self, array: &str) -> SwathResult<ElementType> {
        self.inner.lock().element_type(array)
    }

    fn read_strided(
        &self,
        array: &str,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
    ) -> SwathResult<ArrayData> {
        self.inner.lock().read_strided(array, start, count, stride)
    }

    fn array_attribute(&self, array: &str, name: &str) -> SwathResult<Option<AttributeValue>> {
        self.inner.lock().array_attribute(array, name)
    }

    fn global_attribute(&self, name: &str) -> SwathResult<Option<AttributeValue>> {
        self.inner.lock().global_attribute(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reader() -> MemoryReader {
        let values: Vec<i32> = (0..24).collect();
        MemoryReader::new()
            .with_array(
                "cube",
                &[("z", 2), ("y", 3), ("x", 4)],
                ArrayData::Int32(values),
            )
            .unwrap()
    }

    #[test]
    fn test_strided_read() {
        let reader = sample_reader();
        let data = reader
            .read_strided("cube", &[1, 0, 1], &[1, 2, 2], &[1, 2, 2])
            .unwrap();
        // z=1: base 12; y in {0,2}: +0,+8; x in {1,3}
        assert_eq!(data, ArrayData::Int32(vec![13, 15, 21, 23]));
    }

    #[test]
    fn test_out_of_bounds_read() {
        let reader = sample_reader();
        let past_end = reader.read_strided("cube", &[0, 0, 3], &[1, 1, 2], &[1, 1, 1]);
        assert!(past_end.is_err());
        let wrong_rank = reader.read_strided("cube", &[0, 0], &[1, 1], &[1, 1]);
        assert!(wrong_rank.is_err());
        assert!(reader.read_strided("missing", &[0], &[1], &[1]).is_err());
    }

    #[test]
    fn test_dimensions_and_attributes() {
        let mut reader = sample_reader();
        reader
            .set_attribute("cube", "scale_factor", AttributeValue::Float(vec![0.5]))
            .unwrap();
        reader.set_global_attribute("platform", AttributeValue::Text("NPP".to_string()));

        let dims = dimensions_of(&reader, "cube").unwrap();
        assert_eq!(dims[1], Dimension::new("y", 3));
        assert_eq!(
            reader.array_attribute("cube", "scale_factor").unwrap(),
            Some(AttributeValue::Float(vec![0.5]))
        );
        let offset = reader.array_attribute("cube", "add_offset").unwrap();
        assert!(offset.is_none());
        let platform = reader.global_attribute("platform").unwrap().unwrap();
        assert_eq!(platform.as_text(), Some("NPP"));
    }

    #[test]
    fn test_add_array_rejects_wrong_size() {
        let mut reader = MemoryReader::new();
        let result = reader.add_array("bad", &[("x", 3)], ArrayData::Float32(vec![1.0, 2.0]));
        assert!(matches!(result, Err(SwathError::DimensionMismatch(_))));
    }

    struct CountingReader {
        inner: MemoryReader,
        reads: usize,
    }

    impl ExclusiveReader for CountingReader {
        fn dimension_names(&mut self, array: &str) -> SwathResult<Vec<String>> {
            self.inner.dimension_names(array)
        }
        fn dimension_lengths(&mut self, array: &str) -> SwathResult<Vec<usize>> {
            self.inner.dimension_lengths(array)
        }
        fn element_type(&mut self, array: &str) -> SwathResult<ElementType> {
            self.inner.element_type(array)
        }
        fn read_strided(
            &mut self,
            array: &str,
            start: &[usize],
            count: &[usize],
            stride: &[usize],
        ) -> SwathResult<ArrayData> {
            self.reads += 1;
            self.inner.read_strided(array, start, count, stride)
        }
        fn array_attribute(
            &mut self,
            array: &str,
            name: &str,
        ) -> SwathResult<Option<AttributeValue>> {
            self.inner.array_attribute(array, name)
        }
        fn global_attribute(&mut self, name: &str) -> SwathResult<Option<AttributeValue>> {
            self.inner.global_attribute(name)
        }
    }

    #[test]
    fn test_serialized_reader() {
        let reader = SerializedReader::new(CountingReader {
            inner: sample_reader(),
            reads: 0,
        });
        let data = reader
            .read_strided("cube", &[0, 0, 0], &[1, 1, 4], &[1, 1, 1])
            .unwrap();
        assert_eq!(data.len(), 4);
        reader
            .read_strided("cube", &[1, 2, 3], &[1, 1, 1], &[1, 1, 1])
            .unwrap();
        assert_eq!(reader.into_inner().reads, 2);
    }
}
