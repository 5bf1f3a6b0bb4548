//! Line-oriented ancillary text tables.
//!
//! Lines beginning with `!` are comments, data lines are whitespace
//! tokenized. A malformed data line aborts the whole read.

use crate::types::{SwathError, SwathResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Token position of the channel center frequency in a calibration table
pub const FREQUENCY_TOKEN: usize = 1;
/// Token position of the channel quality flag in a calibration table
pub const QUALITY_TOKEN: usize = 12;
/// Token position of the level altitude in a vertical-bin table
pub const ALTITUDE_TOKEN: usize = 0;
/// Vertical-bin tables list kilometres; altitudes are returned in metres
const METRES_PER_KM: f32 = 1000.0;

/// One data line of a channel calibration table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTableRow {
    pub frequency: f32,
    pub quality: i32,
}

/// Parsed channel calibration table, one row per channel in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTable {
    pub rows: Vec<ChannelTableRow>,
}

impl ChannelTable {
    pub fn frequencies(&self) -> Vec<f32> {
        self.rows.iter().map(|r| r.frequency).collect()
    }

    pub fn quality_flags(&self) -> Vec<i32> {
        self.rows.iter().map(|r| r.quality).collect()
    }
}

/// Data lines with their 1-based line numbers, comments and blanks skipped
fn data_lines<B: BufRead>(input: B) -> impl Iterator<Item = SwathResult<(usize, String)>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed.starts_with('!') {
                    None
                } else {
                    Some(Ok((i + 1, trimmed.to_string())))
                }
            }
            Err(e) => Some(Err(SwathError::Io(e))),
        })
}

fn token<'a>(tokens: &[&'a str], position: usize, line_no: usize) -> SwathResult<&'a str> {
    tokens.get(position).copied().ok_or_else(|| {
        SwathError::Ancillary(format!(
            "line {}: expected at least {} tokens, found {}",
            line_no,
            position + 1,
            tokens.len()
        ))
    })
}

/// Parse a channel calibration table from any buffered source
pub fn parse_channel_table<B: BufRead>(input: B) -> SwathResult<ChannelTable> {
    let mut rows = Vec::new();
    for line in data_lines(input) {
        let (line_no, text) = line?;
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let frequency = token(&tokens, FREQUENCY_TOKEN, line_no)?
            .parse::<f32>()
            .map_err(|e| SwathError::Ancillary(format!("line {}: bad frequency: {}", line_no, e)))?;
        let quality = token(&tokens, QUALITY_TOKEN, line_no)?
            .parse::<i32>()
            .map_err(|e| {
                SwathError::Ancillary(format!("line {}: bad quality flag: {}", line_no, e))
            })?;

        rows.push(ChannelTableRow { frequency, quality });
    }
    Ok(ChannelTable { rows })
}

/// Parse a vertical-bin table (one altitude in km per level) from any buffered
/// source. Returns altitudes in metres.
pub fn parse_vertical_bins<B: BufRead>(input: B) -> SwathResult<Vec<f32>> {
    let mut altitudes = Vec::new();
    for line in data_lines(input) {
        let (line_no, text) = line?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let altitude = token(&tokens, ALTITUDE_TOKEN, line_no)?
            .parse::<f32>()
            .map_err(|e| SwathError::Ancillary(format!("line {}: bad altitude: {}", line_no, e)))?;
        altitudes.push(altitude * METRES_PER_KM);
    }
    Ok(altitudes)
}

/// Read a channel calibration table from disk
pub fn read_channel_table<P: AsRef<Path>>(path: P) -> SwathResult<ChannelTable> {
    log::debug!("Reading channel table {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    let table = parse_channel_table(BufReader::new(file))?;
    log::info!(
        "Read {} channels from {}",
        table.rows.len(),
        path.as_ref().display()
    );
    Ok(table)
}

/// Read a vertical-bin table from disk
pub fn read_vertical_bins<P: AsRef<Path>>(path: P) -> SwathResult<Vec<f32>> {
    log::debug!("Reading vertical bins {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    parse_vertical_bins(BufReader::new(file))
}

/// Read a vertical-bin table; an unreadable or malformed table yields no levels
pub fn read_vertical_bins_or_default<P: AsRef<Path>>(path: P) -> Vec<f32> {
    let path = path.as_ref();
    match read_vertical_bins(path) {
        Ok(altitudes) => altitudes,
        Err(e) => {
            log::warn!(
                "Vertical-bin table {} unavailable, continuing without it: {}",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{Cursor, Write};

    const TABLE: &str = "\
! channel properties
! chan freq a b c d e f g h i j flag
 1  649.612 0 0 0 0 0 0 0 0 0 0 0
 2  650.070 0 0 0 0 0 0 0 0 0 0 1

 3  650.528 0 0 0 0 0 0 0 0 0 0 0
";

    #[test]
    fn test_parse_channel_table() {
        let table = parse_channel_table(Cursor::new(TABLE)).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert!((table.rows[1].frequency - 650.070).abs() < 1e-4);
        assert_eq!(table.quality_flags(), vec![0, 1, 0]);
    }

    #[test]
    fn test_short_line_aborts() {
        let text = "1 649.6 0 0\n";
        let err = parse_channel_table(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, SwathError::Ancillary(_)));
    }

    #[test]
    fn test_bad_token_aborts() {
        let text = "1 abc 0 0 0 0 0 0 0 0 0 0 0\n";
        assert!(parse_channel_table(Cursor::new(text)).is_err());
    }

    #[test]
    fn test_parse_vertical_bins_in_metres() {
        let text = "! altitude km\n40.0 a\n39.94\n-0.5 x y\n";
        let bins = parse_vertical_bins(Cursor::new(text)).unwrap();
        assert_eq!(bins.len(), 3);
        assert_abs_diff_eq!(bins[0], 40000.0);
        assert_abs_diff_eq!(bins[1], 39940.0, epsilon = 1e-2);
        assert_abs_diff_eq!(bins[2], -500.0);
    }

    #[test]
    fn test_vertical_bins_degrade_to_empty() {
        let _ = env_logger::builder().is_test(true).try_init();
        let bins = read_vertical_bins_or_default("/nonexistent/vertical_bins.txt");
        assert!(bins.is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "! altitude km\n12.5\nnot-a-number").unwrap();
        assert!(read_vertical_bins_or_default(file.path()).is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "12.5\n0.25").unwrap();
        let bins = read_vertical_bins_or_default(file.path());
        assert_eq!(bins, vec![12500.0, 250.0]);
    }
}
