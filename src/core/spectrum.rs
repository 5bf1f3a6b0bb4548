//! Channel frequencies, quality masking and Planck conversions

use crate::io::ancillary::{read_channel_table, ChannelTable};
use crate::types::{SwathError, SwathResult};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// First radiation constant, mW/(m^2 sr cm^-4)
pub const PLANCK_C1: f64 = 1.191066e-5;
/// Second radiation constant, K cm
pub const PLANCK_C2: f64 = 1.438833;

/// Spectral radiance (mW/(m^2 sr cm^-1)) of a black body at `temperature` K
pub fn planck_radiance(temperature: f64, wavenumber: f64) -> f64 {
    if !(temperature > 0.0) || !wavenumber.is_finite() {
        return f64::NAN;
    }
    PLANCK_C1 * wavenumber.powi(3) / ((PLANCK_C2 * wavenumber / temperature).exp() - 1.0)
}

/// Brightness temperature (K) of `radiance` at `wavenumber` (cm^-1)
pub fn brightness_temperature(radiance: f64, wavenumber: f64) -> f64 {
    if !(radiance > 0.0) || !wavenumber.is_finite() {
        return f64::NAN;
    }
    PLANCK_C2 * wavenumber / (PLANCK_C1 * wavenumber.powi(3) / radiance + 1.0).ln()
}

/// Linear channel-frequency law for one band, selected by array-name suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandProfile {
    pub suffix: String,
    pub channels: usize,
    pub start: f64,
    pub increment: f64,
}

impl BandProfile {
    pub fn new(suffix: &str, channels: usize, start: f64, increment: f64) -> Self {
        Self {
            suffix: suffix.to_string(),
            channels,
            start,
            increment,
        }
    }

    /// CrIS full-spectral-resolution long, mid and short wave bands
    pub fn cris_fsr() -> Vec<BandProfile> {
        vec![
            BandProfile::new("LW", 713, 650.0, 0.625),
            BandProfile::new("MW", 865, 1210.0, 0.625),
            BandProfile::new("SW", 633, 2155.0, 0.625),
        ]
    }

    /// Profile whose suffix ends `array_name`
    pub fn select<'a>(profiles: &'a [BandProfile], array_name: &str) -> Option<&'a BandProfile> {
        profiles.iter().find(|p| array_name.ends_with(&p.suffix))
    }

    pub fn frequency(&self, channel: usize) -> f64 {
        self.start + channel as f64 * self.increment
    }

    pub fn frequencies(&self) -> Vec<f32> {
        (0..self.channels)
            .map(|k| self.frequency(k) as f32)
            .collect()
    }
}

/// Per-channel centre frequency and quality flag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDescriptor {
    frequencies: Vec<f32>,
    quality: Vec<i32>,
    /// channel indices ordered by ascending frequency
    order: Vec<usize>,
}

impl ChannelDescriptor {
    pub fn new(frequencies: Vec<f32>, quality: Vec<i32>) -> SwathResult<Self> {
        if frequencies.len() != quality.len() {
            return Err(SwathError::DimensionMismatch(format!(
                "{} frequencies but {} quality flags",
                frequencies.len(),
                quality.len()
            )));
        }
        let mut order: Vec<usize> = (0..frequencies.len()).collect();
        order.sort_by(|&a, &b| frequencies[a].total_cmp(&frequencies[b]));
        Ok(Self {
            frequencies,
            quality,
            order,
        })
    }

    /// Frequencies from the band law, all flags good
    pub fn from_band(profile: &BandProfile) -> Self {
        let frequencies = profile.frequencies();
        let mut order: Vec<usize> = (0..frequencies.len()).collect();
        if profile.increment < 0.0 {
            order.reverse();
        }
        Self {
            quality: vec![0; frequencies.len()],
            frequencies,
            order,
        }
    }

    pub fn from_table(table: &ChannelTable) -> SwathResult<Self> {
        Self::new(table.frequencies(), table.quality_flags())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        Self::from_table(&read_channel_table(path)?)
    }

    /// Load from an ancillary table; an unreadable table yields an empty descriptor
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::warn!(
                    "Channel table {} unavailable, continuing without it: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn quality_flags(&self) -> &[i32] {
        &self.quality
    }

    pub fn wavenumber(&self, channel: usize) -> Option<f32> {
        self.frequencies.get(channel).copied()
    }

    /// Channel whose frequency is nearest `wavenumber`
    pub fn channel_index(&self, wavenumber: f32) -> Option<usize> {
        if self.order.is_empty() || !wavenumber.is_finite() {
            return None;
        }
        let pos = self
            .order
            .partition_point(|&k| self.frequencies[k] < wavenumber);
        let candidates = [pos.checked_sub(1), (pos < self.order.len()).then_some(pos)];
        candidates
            .into_iter()
            .flatten()
            .map(|p| self.order[p])
            .min_by(|&a, &b| {
                let da = (self.frequencies[a] - wavenumber).abs();
                let db = (self.frequencies[b] - wavenumber).abs();
                da.total_cmp(&db)
            })
    }

    /// Set values of flagged channels to NaN. `spectra` holds whole spectra back to back.
    pub fn apply_quality_mask<T: Float>(&self, spectra: &mut [T]) -> SwathResult<()> {
        let n = self.quality.len();
        if n == 0 || spectra.len() % n != 0 {
            return Err(SwathError::DimensionMismatch(format!(
                "spectrum buffer of {} values is not a whole number of {}-channel spectra",
                spectra.len(),
                n
            )));
        }
        for spectrum in spectra.chunks_mut(n) {
            for (value, &flag) in spectrum.iter_mut().zip(&self.quality) {
                if flag != 0 {
                    *value = T::nan();
                }
            }
        }
        Ok(())
    }
}
