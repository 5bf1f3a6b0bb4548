//! Pseudo-scan reorder.
//!
//! Some sounders store each field of regard (FOR) as a contiguous run of 9
//! instantaneous fields of view (IFOVs) in a sensor-defined order. The
//! reorderer permutes such a buffer into plain row/column image order using
//! a 3x3 tile offset table.

use crate::core::subset::SubsetRange;
use crate::types::{SwathError, SwathResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Tile edge length in samples
pub const TILE_EDGE: usize = 3;
/// Samples per tile
pub const TILE_SIZE: usize = TILE_EDGE * TILE_EDGE;

/// Offset table mapping tile-local sensor index `k` to (row, col) within the tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[(usize, usize); 9]", into = "[(usize, usize); 9]")]
pub struct TileOffsets {
    offsets: [(usize, usize); TILE_SIZE],
}

impl TileOffsets {
    /// Sensor order already matches row-major order
    pub const ROW_MAJOR: TileOffsets = TileOffsets {
        offsets: [
            (0, 0),
            (0, 1),
            (0, 2),
            (1, 0),
            (1, 1),
            (1, 2),
            (2, 0),
            (2, 1),
            (2, 2),
        ],
    };

    /// CrIS full spectral resolution SDR IFOV layout
    pub const CRIS_FSR: TileOffsets = TileOffsets {
        offsets: [
            (2, 0),
            (2, 1),
            (2, 2),
            (1, 0),
            (1, 1),
            (1, 2),
            (0, 0),
            (0, 1),
            (0, 2),
        ],
    };

    /// Validated table; every cell of the 3x3 tile must be named exactly once
    pub fn new(offsets: [(usize, usize); TILE_SIZE]) -> SwathResult<Self> {
        let mut seen = [false; TILE_SIZE];
        for (k, &(row, col)) in offsets.iter().enumerate() {
            if row >= TILE_EDGE || col >= TILE_EDGE {
                return Err(SwathError::DimensionMismatch(format!(
                    "tile offset {} = ({}, {}) lies outside the 3x3 tile",
                    k, row, col
                )));
            }
            let cell = row * TILE_EDGE + col;
            if seen[cell] {
                return Err(SwathError::DimensionMismatch(format!(
                    "tile cell ({}, {}) is named more than once",
                    row, col
                )));
            }
            seen[cell] = true;
        }
        Ok(Self { offsets })
    }

    pub fn offset(&self, k: usize) -> (usize, usize) {
        self.offsets[k]
    }

    /// Table sending tile cell `row * 3 + col` back to sensor index `k`
    pub fn inverse(&self) -> [usize; TILE_SIZE] {
        let mut inv = [0usize; TILE_SIZE];
        for (k, &(row, col)) in self.offsets.iter().enumerate() {
            inv[row * TILE_EDGE + col] = k;
        }
        inv
    }
}

impl TryFrom<[(usize, usize); TILE_SIZE]> for TileOffsets {
    type Error = SwathError;

    fn try_from(offsets: [(usize, usize); TILE_SIZE]) -> SwathResult<Self> {
        TileOffsets::new(offsets)
    }
}

impl From<TileOffsets> for [(usize, usize); TILE_SIZE] {
    fn from(table: TileOffsets) -> Self {
        table.offsets
    }
}

/// Permutation engine between native (FOR, IFOV) order and spatial image order
#[derive(Debug, Clone, Copy)]
pub struct ScanReorderer {
    offsets: TileOffsets,
}

impl ScanReorderer {
    pub fn new(offsets: TileOffsets) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> &TileOffsets {
        &self.offsets
    }

    fn check_geometry(len: usize, num_elems: usize, num_lines: usize) -> SwathResult<()> {
        if num_elems % TILE_EDGE != 0 || num_lines % TILE_EDGE != 0 {
            return Err(SwathError::DimensionMismatch(format!(
                "image {}x{} (elems x lines) is not a whole number of 3x3 tiles",
                num_elems, num_lines
            )));
        }
        if len != num_elems * num_lines {
            return Err(SwathError::DimensionMismatch(format!(
                "buffer holds {} values, expected {} x {} = {}",
                len,
                num_elems,
                num_lines,
                num_elems * num_lines
            )));
        }
        Ok(())
    }

    /// Native index and row-block-local spatial index of sample `k` in tile `i` of block `j`
    #[inline]
    fn indices(&self, j: usize, i: usize, k: usize, num_elems: usize) -> (usize, usize) {
        let (row, col) = self.offsets.offsets[k];
        let native = j * (num_elems / TILE_EDGE * TILE_SIZE) + i * TILE_SIZE + k;
        let local = row * num_elems + i * TILE_EDGE + col;
        (native, local)
    }

    /// Permute a native-order buffer into spatial row-major order.
    ///
    /// Every output position is written exactly once.
    pub fn reorder<T: Copy + Send + Sync>(
        &self,
        values: &[T],
        num_elems: usize,
        num_lines: usize,
    ) -> SwathResult<Vec<T>> {
        Self::check_geometry(values.len(), num_elems, num_lines)?;
        log::debug!("Pseudo-scan reorder of {}x{} image", num_lines, num_elems);

        let mut output = values.to_vec();
        if values.is_empty() {
            return Ok(output);
        }
        let block = TILE_EDGE * num_elems;
        let tiles_per_row = num_elems / TILE_EDGE;

        let fill_block = |j: usize, rows: &mut [T]| {
            for i in 0..tiles_per_row {
                for k in 0..TILE_SIZE {
                    let (native, local) = self.indices(j, i, k, num_elems);
                    rows[local] = values[native];
                }
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            output
                .par_chunks_mut(block)
                .enumerate()
                .for_each(|(j, rows)| fill_block(j, rows));
        }
        #[cfg(not(feature = "parallel"))]
        {
            output
                .chunks_mut(block)
                .enumerate()
                .for_each(|(j, rows)| fill_block(j, rows));
        }

        Ok(output)
    }

    /// Inverse of [`ScanReorderer::reorder`]: spatial order back to native order
    pub fn restore<T: Copy>(
        &self,
        values: &[T],
        num_elems: usize,
        num_lines: usize,
    ) -> SwathResult<Vec<T>> {
        Self::check_geometry(values.len(), num_elems, num_lines)?;

        let mut output = values.to_vec();
        let tiles_per_row = num_elems / TILE_EDGE;
        for j in 0..num_lines / TILE_EDGE {
            let block_start = j * TILE_EDGE * num_elems;
            for i in 0..tiles_per_row {
                for k in 0..TILE_SIZE {
                    let (native, local) = self.indices(j, i, k, num_elems);
                    output[native] = values[block_start + local];
                }
            }
        }
        Ok(output)
    }

    /// Reorder into a (lines, elems) image
    pub fn reorder_image<T: Copy + Send + Sync>(
        &self,
        values: &[T],
        num_elems: usize,
        num_lines: usize,
    ) -> SwathResult<Array2<T>> {
        let spatial = self.reorder(values, num_elems, num_lines)?;
        Array2::from_shape_vec((num_lines, num_elems), spatial)
            .map_err(|e| SwathError::DimensionMismatch(format!("reordered image shape: {}", e)))
    }
}

/// A spatial subset snapped to whole fields of regard, with its native counterpart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileAlignment {
    /// Range in spatial (IFOV) image coordinates, covering whole tiles
    pub spatial: SubsetRange,
    /// Range in native field-of-regard coordinates
    pub native: SubsetRange,
}

/// Snap a spatial range to whole tiles. Callers may get slightly less than
/// they asked for; the IFOV dimension must then be read in full.
pub fn align_to_tiles(range: &SubsetRange) -> SwathResult<TileAlignment> {
    let edge = TILE_EDGE as f64;
    let native_first = (range.first / edge).floor();
    let native_last = ((range.last + 1.0) / edge).floor() - 1.0;
    if native_last < native_first {
        return Err(SwathError::InvalidRange(format!(
            "range ({}, {}) does not cover a whole field of regard",
            range.first, range.last
        )));
    }

    Ok(TileAlignment {
        spatial: SubsetRange::new(edge * native_first, edge * (native_last + 1.0) - 1.0, 1.0),
        native: SubsetRange::new(native_first, native_last, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_table_single_tile() {
        let reorderer = ScanReorderer::new(TileOffsets::ROW_MAJOR);
        let input: Vec<i32> = (0..9).collect();
        let output = reorderer.reorder(&input, 3, 3).unwrap();
        assert_eq!(output, input);

        // a 9-wide, 3-line image needs three tiles
        let err = reorderer.reorder(&input, 9, 3).unwrap_err();
        assert!(matches!(err, SwathError::DimensionMismatch(_)));
        let wide: Vec<i32> = (0..27).collect();
        let output = reorderer.reorder(&wide, 9, 3).unwrap();
        assert_eq!(&output[..3], &[0, 1, 2]);
        assert_eq!(&output[3..6], &[9, 10, 11]);
    }

    #[test]
    fn test_reversed_table_single_tile() {
        let table = TileOffsets::new([
            (2, 2),
            (1, 2),
            (0, 2),
            (2, 1),
            (1, 1),
            (0, 1),
            (2, 0),
            (1, 0),
            (0, 0),
        ])
        .unwrap();
        let reorderer = ScanReorderer::new(table);
        let input: Vec<i32> = (0..9).collect();
        let output = reorderer.reorder(&input, 3, 3).unwrap();
        assert_eq!(output[0], 8);
        for (k, &(row, col)) in table.offsets.iter().enumerate() {
            assert_eq!(output[row * 3 + col], k as i32);
        }
    }

    #[test]
    fn test_cris_layout_two_by_two_tiles() {
        let reorderer = ScanReorderer::new(TileOffsets::CRIS_FSR);
        let input: Vec<u16> = (0..36).collect();
        let image = reorderer.reorder_image(&input, 6, 6).unwrap();
        // FOR (0,0): IFOV 6 sits top-left, IFOV 0 bottom-left
        assert_eq!(image[[0, 0]], 6);
        assert_eq!(image[[2, 0]], 0);
        // FOR (0,1) starts at native index 9
        assert_eq!(image[[0, 3]], 15);
        // FOR (1,0) starts at native index 18
        assert_eq!(image[[5, 2]], 20);
    }

    #[test]
    fn test_reorder_is_permutation_and_round_trips() {
        for &(elems, lines) in &[(3usize, 3usize), (9, 3), (6, 12), (30, 12)] {
            for table in [TileOffsets::ROW_MAJOR, TileOffsets::CRIS_FSR] {
                let reorderer = ScanReorderer::new(table);
                let input: Vec<usize> = (0..elems * lines).collect();
                let output = reorderer.reorder(&input, elems, lines).unwrap();

                let mut sorted = output.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, input);

                let back = reorderer.restore(&output, elems, lines).unwrap();
                assert_eq!(back, input);
            }
        }
    }

    #[test]
    fn test_geometry_errors() {
        let reorderer = ScanReorderer::new(TileOffsets::CRIS_FSR);
        let input = vec![0.0f32; 20];
        assert!(reorderer.reorder(&input, 4, 5).is_err());
        assert!(reorderer.reorder(&input, 3, 6).is_err());
        assert!(reorderer.restore(&input, 6, 3).is_err());
    }

    #[test]
    fn test_invalid_tables() {
        assert!(TileOffsets::new([(0, 0); 9]).is_err());
        let mut out_of_tile = TileOffsets::ROW_MAJOR.offsets;
        out_of_tile[0] = (3, 0);
        assert!(TileOffsets::new(out_of_tile).is_err());
        let inverse = TileOffsets::CRIS_FSR.inverse();
        assert_eq!(inverse[0], 6);
        assert_eq!(inverse[8], 2);
    }

    #[test]
    fn test_align_to_tiles() {
        let aligned = align_to_tiles(&SubsetRange::new(4.0, 13.0, 1.0)).unwrap();
        assert_eq!(aligned.spatial, SubsetRange::new(3.0, 11.0, 1.0));
        assert_eq!(aligned.native, SubsetRange::new(1.0, 3.0, 1.0));

        let whole = align_to_tiles(&SubsetRange::new(0.0, 89.0, 1.0)).unwrap();
        assert_eq!(whole.native, SubsetRange::new(0.0, 29.0, 1.0));

        let partial = align_to_tiles(&SubsetRange::new(1.0, 2.0, 1.0)).unwrap();
        assert_eq!(partial.spatial, SubsetRange::new(0.0, 2.0, 1.0));
        assert!(align_to_tiles(&SubsetRange::new(1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn test_tile_offsets_serde() {
        let json = serde_json::to_string(&TileOffsets::CRIS_FSR).unwrap();
        let back: TileOffsets = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TileOffsets::CRIS_FSR);
        let repeated = "[[0,0],[0,0],[0,0],[0,0],[0,0],[0,0],[0,0],[0,0],[0,0]]";
        assert!(serde_json::from_str::<TileOffsets>(repeated).is_err());
    }
}
