//! Range calibration: a decode head followed by an ordered chain of in-place stages

use crate::core::extract::{ArrayExtractor, Extraction};
use crate::core::lookup::{CountTable, InterpolationMode, LookupTable};
use crate::core::spectrum;
use crate::core::subset::SubsetRequest;
use crate::io::reader::{dimensions_of, DimensionReader};
use crate::types::{ArrayData, AttributeValue, SwathError, SwathReal, SwathResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Calibration coefficient, either broadcast or selected by channel index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coefficient {
    Scalar(f64),
    PerChannel(Vec<f64>),
}

impl Coefficient {
    /// Value for `channel`; out-of-range channels yield NaN
    pub fn value(&self, channel: usize) -> f64 {
        match self {
            Coefficient::Scalar(v) => *v,
            Coefficient::PerChannel(values) => values.get(channel).copied().unwrap_or(f64::NAN),
        }
    }

    /// One value becomes a scalar, several become a per-channel vector
    pub fn from_values(name: &str, values: Vec<f64>) -> SwathResult<Self> {
        match values.len() {
            0 => Err(SwathError::CalibrationConfig(format!(
                "attribute {} is empty",
                name
            ))),
            1 => Ok(Coefficient::Scalar(values[0])),
            _ => Ok(Coefficient::PerChannel(values)),
        }
    }

    fn check(&self, name: &str, channels: Option<usize>) -> SwathResult<()> {
        match (self, channels) {
            (Coefficient::Scalar(_), _) => Ok(()),
            (Coefficient::PerChannel(values), Some(n)) if values.len() == n => Ok(()),
            (Coefficient::PerChannel(values), Some(n)) => Err(SwathError::CalibrationConfig(format!(
                "{} has {} per-channel values for {} channels",
                name,
                values.len(),
                n
            ))),
            (Coefficient::PerChannel(_), None) => Err(SwathError::CalibrationConfig(format!(
                "{} is per-channel but no channel dimension is configured",
                name
            ))),
        }
    }
}

/// Maps a flat element index of an extraction to its absolute channel index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    inner: usize,
    channels: usize,
    start: usize,
    stride: usize,
}

impl ChannelLayout {
    /// Every element reads channel 0
    pub fn broadcast() -> Self {
        Self {
            inner: 1,
            channels: 1,
            start: 0,
            stride: 0,
        }
    }

    /// Layout of `dimension` within `extraction`; `None` means broadcast
    pub fn from_extraction(extraction: &Extraction, dimension: Option<&str>) -> SwathResult<Self> {
        let name = match dimension {
            Some(name) => name,
            None => return Ok(Self::broadcast()),
        };
        let axis = extraction.dimension_index(name).ok_or_else(|| {
            SwathError::DimensionMismatch(format!(
                "channel dimension {} not found on {}",
                name, extraction.array
            ))
        })?;
        let range = extraction.ranges[axis];
        Ok(Self {
            inner: extraction.ranges[axis + 1..]
                .iter()
                .map(|r| r.count)
                .product(),
            channels: range.count,
            start: range.start,
            stride: range.stride,
        })
    }

    #[inline]
    pub fn channel(&self, flat_index: usize) -> usize {
        self.start + self.position(flat_index) * self.stride
    }

    /// Number of channels selected
    pub fn count(&self) -> usize {
        self.channels
    }

    /// Position of the element within the selected channels
    #[inline]
    pub fn position(&self, flat_index: usize) -> usize {
        (flat_index / self.inner) % self.channels
    }

    /// Flat index of the element once the channel axis is removed
    #[inline]
    pub fn sample(&self, flat_index: usize) -> usize {
        (flat_index / (self.inner * self.channels)) * self.inner + flat_index % self.inner
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::broadcast()
    }
}

/// Validity mask plus `scale * (v - offset)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDecode {
    pub scale: Coefficient,
    pub offset: Coefficient,
    #[serde(default)]
    pub missing: Option<Coefficient>,
    #[serde(default)]
    pub valid_low: Option<Coefficient>,
    #[serde(default)]
    pub valid_high: Option<Coefficient>,
}

impl LinearDecode {
    pub fn new(scale: Coefficient, offset: Coefficient) -> Self {
        Self {
            scale,
            offset,
            missing: None,
            valid_low: None,
            valid_high: None,
        }
    }

    pub fn with_missing(mut self, missing: Coefficient) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn with_valid_range(mut self, low: Coefficient, high: Coefficient) -> Self {
        self.valid_low = Some(low);
        self.valid_high = Some(high);
        self
    }

    /// Build from the attributes attached to `array`. Scale and offset are required.
    pub fn from_attributes(
        reader: &dyn DimensionReader,
        array: &str,
        names: &AttributeNames,
    ) -> SwathResult<Self> {
        let numeric = |key: &str| -> SwathResult<Option<Vec<f64>>> {
            match reader.array_attribute(array, key)? {
                None => Ok(None),
                Some(AttributeValue::Text(_)) => Err(SwathError::CalibrationConfig(format!(
                    "attribute {} on {} is not numeric",
                    key, array
                ))),
                Some(value) => Ok(value.as_f64_vec()),
            }
        };
        let required = |key: &str| -> SwathResult<Coefficient> {
            let values = numeric(key)?.ok_or_else(|| {
                SwathError::CalibrationConfig(format!("array {} has no {} attribute", array, key))
            })?;
            Coefficient::from_values(key, values)
        };

        let mut decode = LinearDecode::new(required(&names.scale)?, required(&names.offset)?);
        if let Some(values) = numeric(&names.fill)? {
            decode.missing = Some(Coefficient::from_values(&names.fill, values)?);
        }
        if let Some(values) = numeric(&names.valid_range)? {
            if values.len() != 2 {
                return Err(SwathError::CalibrationConfig(format!(
                    "{} on {} must hold 2 values, got {}",
                    names.valid_range,
                    array,
                    values.len()
                )));
            }
            let (low, high) = (Coefficient::Scalar(values[0]), Coefficient::Scalar(values[1]));
            decode = decode.with_valid_range(low, high);
        }
        log::debug!("Linear decode for {}: {:?}", array, decode);
        Ok(decode)
    }

    fn check(&self, channels: Option<usize>) -> SwathResult<()> {
        self.scale.check("scale", channels)?;
        self.offset.check("offset", channels)?;
        let optional = [
            ("missing", &self.missing),
            ("valid_low", &self.valid_low),
            ("valid_high", &self.valid_high),
        ];
        for (name, c) in optional {
            if let Some(c) = c {
                c.check(name, channels)?;
            }
        }
        Ok(())
    }

    /// Decode one raw value. `narrow` compares sentinels at f32 precision.
    #[inline]
    fn decode_value(&self, v: f64, channel: usize, narrow: bool) -> SwathReal {
        if v.is_nan() {
            return SwathReal::NAN;
        }
        if let Some(missing) = &self.missing {
            let m = missing.value(channel);
            let m = if narrow { m as f32 as f64 } else { m };
            if v == m {
                return SwathReal::NAN;
            }
        }
        if let Some(low) = &self.valid_low {
            if v < low.value(channel) {
                return SwathReal::NAN;
            }
        }
        if let Some(high) = &self.valid_high {
            if v > high.value(channel) {
                return SwathReal::NAN;
            }
        }
        (self.scale.value(channel) * (v - self.offset.value(channel))) as SwathReal
    }

    pub fn decode(&self, raw: &ArrayData, layout: &ChannelLayout) -> Vec<SwathReal> {
        let narrow = matches!(raw, ArrayData::Float32(_));
        let values = raw.to_f64_vec();

        #[cfg(feature = "parallel")]
        {
            values
                .par_iter()
                .enumerate()
                .map(|(i, &v)| self.decode_value(v, layout.channel(i), narrow))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| self.decode_value(v, layout.channel(i), narrow))
                .collect()
        }
    }
}

/// First step of every calibrator: raw values to physical values
#[derive(Debug, Clone, PartialEq)]
pub enum Decoder {
    Linear(LinearDecode),
    Counts(CountTable),
}

impl Decoder {
    pub fn decode(&self, raw: &ArrayData, layout: &ChannelLayout) -> SwathResult<Vec<SwathReal>> {
        match self {
            Decoder::Linear(linear) => Ok(linear.decode(raw, layout)),
            Decoder::Counts(table) => table.decode(raw),
        }
    }
}

/// Per-request inputs shared by all stages
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    pub layout: ChannelLayout,
    auxiliary: HashMap<String, Vec<SwathReal>>,
}

impl StageContext {
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            layout,
            auxiliary: HashMap::new(),
        }
    }

    pub fn with_auxiliary(mut self, name: &str, values: Vec<SwathReal>) -> Self {
        self.auxiliary.insert(name.to_string(), values);
        self
    }

    /// Auxiliary field `name`, which must match the primary buffer length
    pub fn auxiliary(&self, name: &str, expected_len: usize) -> SwathResult<&[SwathReal]> {
        let values = self.auxiliary.get(name).ok_or_else(|| {
            SwathError::CalibrationConfig(format!("auxiliary field {} was not supplied", name))
        })?;
        if values.len() != expected_len {
            return Err(SwathError::DimensionMismatch(format!(
                "auxiliary field {} has {} values, primary has {}",
                name,
                values.len(),
                expected_len
            )));
        }
        Ok(values)
    }
}

/// An in-place transform over a calibrated buffer
pub trait CalibrationStage: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Arrays that must be extracted alongside the primary array
    fn auxiliary_arrays(&self) -> Vec<String> {
        Vec::new()
    }

    fn apply(&self, values: &mut [SwathReal], context: &StageContext) -> SwathResult<()>;
}

fn for_each_indexed<F>(values: &mut [SwathReal], f: F)
where
    F: Fn(usize, &mut SwathReal) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    values.par_iter_mut().enumerate().for_each(|(i, v)| f(i, v));

    #[cfg(not(feature = "parallel"))]
    values.iter_mut().enumerate().for_each(|(i, v)| f(i, v));
}

/// Table conversion, e.g. radiance to brightness temperature
#[derive(Debug, Clone)]
pub struct LookupStage {
    table: LookupTable,
}

impl LookupStage {
    pub fn new(table: LookupTable) -> Self {
        Self { table }
    }

    /// Stage converting back through the same table
    pub fn reversed(&self) -> SwathResult<Self> {
        Ok(Self::new(self.table.inverse()?))
    }

    pub fn table(&self) -> &LookupTable {
        &self.table
    }
}

impl CalibrationStage for LookupStage {
    fn name(&self) -> &str {
        "lookup"
    }

    fn apply(&self, values: &mut [SwathReal], _context: &StageContext) -> SwathResult<()> {
        for_each_indexed(values, |_, v| {
            *v = self.table.lookup(*v as f64) as SwathReal
        });
        Ok(())
    }
}

/// Default solar zenith cutoff in degrees
pub const SOLAR_ZENITH_LIMIT_DEG: f64 = 88.0;

/// Divides reflectance by cos(solar zenith) below the cutoff angle
#[derive(Debug, Clone, PartialEq)]
pub struct SolarZenithCorrection {
    zenith_array: String,
    limit_deg: f64,
}

impl SolarZenithCorrection {
    pub fn new(zenith_array: &str) -> Self {
        Self {
            zenith_array: zenith_array.to_string(),
            limit_deg: SOLAR_ZENITH_LIMIT_DEG,
        }
    }

    pub fn with_limit(mut self, limit_deg: f64) -> Self {
        self.limit_deg = limit_deg;
        self
    }

    #[inline]
    pub fn correct(&self, value: SwathReal, zenith_deg: SwathReal) -> SwathReal {
        let zenith = zenith_deg as f64;
        if zenith < self.limit_deg {
            (value as f64 / zenith.to_radians().cos()) as SwathReal
        } else {
            value
        }
    }
}

impl CalibrationStage for SolarZenithCorrection {
    fn name(&self) -> &str {
        "solar_zenith"
    }

    fn auxiliary_arrays(&self) -> Vec<String> {
        vec![self.zenith_array.clone()]
    }

    fn apply(&self, values: &mut [SwathReal], context: &StageContext) -> SwathResult<()> {
        let zenith = context.auxiliary(&self.zenith_array, values.len())?;
        for_each_indexed(values, |i, v| *v = self.correct(*v, zenith[i]));
        Ok(())
    }
}

/// Planck inversion of spectral radiance using each element's channel wavenumber
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessTemperatureStage {
    wavenumbers: Vec<f64>,
}

impl BrightnessTemperatureStage {
    pub fn new(wavenumbers: Vec<f64>) -> Self {
        Self { wavenumbers }
    }
}

impl CalibrationStage for BrightnessTemperatureStage {
    fn name(&self) -> &str {
        "brightness_temperature"
    }

    fn apply(&self, values: &mut [SwathReal], context: &StageContext) -> SwathResult<()> {
        let layout = context.layout;
        for_each_indexed(values, |i, v| {
            *v = match self.wavenumbers.get(layout.channel(i)) {
                Some(&nu) => spectrum::brightness_temperature(*v as f64, nu) as SwathReal,
                None => SwathReal::NAN,
            }
        });
        Ok(())
    }
}

/// Attribute keys holding the linear decode parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    pub scale: String,
    pub offset: String,
    pub fill: String,
    pub valid_range: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            scale: "scale_factor".to_string(),
            offset: "add_offset".to_string(),
            fill: "_FillValue".to_string(),
            valid_range: "valid_range".to_string(),
        }
    }
}

/// Where the decode head takes its parameters from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeConfig {
    /// Read scale/offset/fill/valid range from the array attributes
    Attributes,
    /// Explicit coefficients
    Linear(LinearDecode),
    /// Raw counts index a table
    CountTable {
        values: Vec<f32>,
        #[serde(default = "default_count_fill")]
        fill: f32,
    },
}

fn default_count_fill() -> f32 {
    CountTable::DEFAULT_FILL
}

fn default_zenith_limit() -> f64 {
    SOLAR_ZENITH_LIMIT_DEG
}

/// One configured stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    Lookup {
        domain: Vec<f64>,
        codomain: Vec<f64>,
        mode: InterpolationMode,
        #[serde(default)]
        reversed: bool,
    },
    SolarZenith {
        zenith_array: String,
        #[serde(default = "default_zenith_limit")]
        limit_deg: f64,
    },
    BrightnessTemperature {
        wavenumbers: Vec<f64>,
    },
}

impl StageConfig {
    pub fn build(&self) -> SwathResult<Box<dyn CalibrationStage>> {
        Ok(match self {
            StageConfig::Lookup {
                domain,
                codomain,
                mode,
                reversed,
            } => {
                let table = LookupTable::new(domain.clone(), codomain.clone(), *mode)?;
                let stage = LookupStage::new(table);
                if *reversed {
                    Box::new(stage.reversed()?)
                } else {
                    Box::new(stage)
                }
            }
            StageConfig::SolarZenith { zenith_array, limit_deg } => {
                Box::new(SolarZenithCorrection::new(zenith_array).with_limit(*limit_deg))
            }
            StageConfig::BrightnessTemperature { wavenumbers } => {
                Box::new(BrightnessTemperatureStage::new(wavenumbers.clone()))
            }
        })
    }
}

/// Calibrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    pub attributes: AttributeNames,
    /// Dimension whose index selects per-channel coefficients
    pub channel_dimension: Option<String>,
    pub decode: DecodeConfig,
    pub stages: Vec<StageConfig>,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            attributes: AttributeNames::default(),
            channel_dimension: None,
            decode: DecodeConfig::Attributes,
            stages: Vec::new(),
        }
    }
}

impl CalibratorConfig {
    pub fn from_json(json: &str) -> SwathResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Decode head plus ordered stages, built once per adapter
#[derive(Debug)]
pub struct RangeCalibrator {
    decoder: Decoder,
    stages: Vec<Box<dyn CalibrationStage>>,
    channel_dimension: Option<String>,
}

impl RangeCalibrator {
    pub fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            stages: Vec::new(),
            channel_dimension: None,
        }
    }

    pub fn with_stage(mut self, stage: Box<dyn CalibrationStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_channel_dimension(mut self, dimension: &str) -> Self {
        self.channel_dimension = Some(dimension.to_string());
        self
    }

    /// Build for `array`, validating attributes and coefficient lengths up front
    pub fn from_config(
        config: &CalibratorConfig,
        reader: &dyn DimensionReader,
        array: &str,
    ) -> SwathResult<Self> {
        let channels = match &config.channel_dimension {
            None => None,
            Some(name) => {
                let dims = dimensions_of(reader, array)?;
                let dim = dims.iter().find(|d| &d.name == name).ok_or_else(|| {
                    SwathError::CalibrationConfig(format!(
                        "array {} has no channel dimension {}",
                        array, name
                    ))
                })?;
                Some(dim.length)
            }
        };

        let decoder = match &config.decode {
            DecodeConfig::Attributes => {
                Decoder::Linear(LinearDecode::from_attributes(reader, array, &config.attributes)?)
            }
            DecodeConfig::Linear(linear) => Decoder::Linear(linear.clone()),
            DecodeConfig::CountTable { values, fill } => {
                Decoder::Counts(CountTable::new(values.clone(), *fill)?)
            }
        };
        if let Decoder::Linear(linear) = &decoder {
            linear.check(channels)?;
        }

        let mut calibrator = RangeCalibrator::new(decoder);
        calibrator.channel_dimension = config.channel_dimension.clone();
        for stage in &config.stages {
            calibrator.stages.push(stage.build()?);
        }

        log::info!(
            "Calibrator for {}: {} stage(s) [{}]",
            array,
            calibrator.stages.len(),
            calibrator.stage_names().join(", ")
        );
        Ok(calibrator)
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn channel_dimension(&self) -> Option<&str> {
        self.channel_dimension.as_deref()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Auxiliary arrays required by all stages, deduplicated
    pub fn auxiliary_arrays(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.stages.iter().flat_map(|s| s.auxiliary_arrays()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Decode then run every stage in order. Output length equals input length.
    pub fn calibrate(
        &self,
        raw: &ArrayData,
        context: &StageContext,
    ) -> SwathResult<Vec<SwathReal>> {
        let mut values = self.decoder.decode(raw, &context.layout)?;
        for stage in &self.stages {
            stage.apply(&mut values, context)?;
        }
        Ok(values)
    }

    /// Calibrate an extraction, fetching auxiliary fields with the same request
    pub fn calibrate_extraction(
        &self,
        extractor: &ArrayExtractor,
        extraction: &Extraction,
        request: &SubsetRequest,
    ) -> SwathResult<Vec<SwathReal>> {
        let layout = ChannelLayout::from_extraction(extraction, self.channel_dimension())?;
        let mut context = StageContext::new(layout);
        for name in self.auxiliary_arrays() {
            let aux = extractor.extract(&name, request)?;
            if aux.data.len() != extraction.data.len() {
                return Err(SwathError::DimensionMismatch(format!(
                    "auxiliary array {} has {} values, {} has {}",
                    name,
                    aux.data.len(),
                    extraction.array,
                    extraction.data.len()
                )));
            }
            context = context.with_auxiliary(&name, aux.data.to_f32_vec());
        }

        let values = self.calibrate(&extraction.data, &context)?;
        let valid = values.iter().filter(|v| v.is_finite()).count();
        log::debug!(
            "Calibrated {}: {}/{} valid values",
            extraction.array,
            valid,
            values.len()
        );
        Ok(values)
    }
}
