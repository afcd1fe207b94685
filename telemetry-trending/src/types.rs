//! Core types for the telemetry trending engine
//!
//! This module defines the sample and stream types every algorithm consumes,
//! plus the error type they report. Streams are validated once on construction
//! and never mutated afterwards - the engine only borrows them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, TrendingError>;

/// Errors that can occur while evaluating telemetry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrendingError {
    #[error("Unparseable value {value:?} in {mnemonic} at time {time}")]
    UnparseableValue {
        mnemonic: String,
        time: f64,
        value: String,
    },

    #[error("Stream {mnemonic} is not time-ordered at sample {index}")]
    UnsortedStream { mnemonic: String, index: usize },

    #[error("Stream {0} has no samples")]
    EmptyStream(String),
}

/// A telemetry value: either a vocabulary token or an engineering number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Numeric engineering value
    Number(f64),
    /// Token value (e.g. "ON", "SUCCESS", a lamp or position name)
    Text(String),
}

impl SampleValue {
    /// Keep a raw export field verbatim (surrounding whitespace removed)
    ///
    /// Numeric fields stay text so that string comparison and labels see
    /// exactly what the export contained (`10.0`, `007`). The numeric view is
    /// derived on demand by [`SampleValue::as_f64`].
    pub fn from_raw(raw: &str) -> Self {
        SampleValue::Text(raw.trim().to_string())
    }

    /// Numeric view of the value, `None` if a token does not parse as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            SampleValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Token view of the value (only for text values)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SampleValue::Text(s) => Some(s),
            SampleValue::Number(_) => None,
        }
    }

    /// Check whether this is exactly the given token
    pub fn is_token(&self, token: &str) -> bool {
        self.as_str() == Some(token)
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Number(v) => write!(f, "{}", v),
            SampleValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Number(v)
    }
}

impl From<&str> for SampleValue {
    fn from(s: &str) -> Self {
        SampleValue::Text(s.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(s: String) -> Self {
        SampleValue::Text(s)
    }
}

/// One timestamped telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Mission clock time (MJD for mission exports)
    pub time: f64,
    /// Sampled value
    pub value: SampleValue,
}

impl Sample {
    pub fn new(time: f64, value: impl Into<SampleValue>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

/// A validated, time-ordered sequence of samples for one mnemonic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStream {
    mnemonic: String,
    samples: Vec<Sample>,
}

impl SampleStream {
    /// Build a stream, rejecting NaN or decreasing timestamps
    ///
    /// The engine never sorts: an out-of-order stream is reported as
    /// `UnsortedStream` with the index of the first offending sample.
    pub fn new(mnemonic: impl Into<String>, samples: Vec<Sample>) -> Result<Self> {
        let mnemonic = mnemonic.into();

        for (index, sample) in samples.iter().enumerate() {
            let ordered = match index {
                0 => !sample.time.is_nan(),
                _ => sample.time >= samples[index - 1].time,
            };
            if !ordered {
                return Err(TrendingError::UnsortedStream { mnemonic, index });
            }
        }

        Ok(Self { mnemonic, samples })
    }

    /// Build a stream from `(time, value)` pairs
    pub fn from_pairs<V: Into<SampleValue>>(
        mnemonic: impl Into<String>,
        pairs: impl IntoIterator<Item = (f64, V)>,
    ) -> Result<Self> {
        let samples = pairs
            .into_iter()
            .map(|(time, value)| Sample::new(time, value))
            .collect();
        Self::new(mnemonic, samples)
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// First and last timestamps, if the stream has samples
    pub fn time_span(&self) -> Option<(f64, f64)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    /// The last sample with `time <= t`
    ///
    /// Uses binary search over the validated ordering. With duplicate
    /// timestamps the latest of them wins.
    pub fn as_of(&self, t: f64) -> Option<&Sample> {
        let idx = self.samples.partition_point(|s| s.time <= t);
        idx.checked_sub(1).map(|i| &self.samples[i])
    }

    /// Fail with `EmptyStream` if the stream has no samples
    pub fn require_non_empty(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(TrendingError::EmptyStream(self.mnemonic.clone()));
        }
        Ok(())
    }

    /// Numeric value of a sample from this stream, or `UnparseableValue`
    pub fn numeric_value(&self, sample: &Sample) -> Result<f64> {
        sample
            .value
            .as_f64()
            .ok_or_else(|| TrendingError::UnparseableValue {
                mnemonic: self.mnemonic.clone(),
                time: sample.time,
                value: sample.value.to_string(),
            })
    }
}

impl<'a> IntoIterator for &'a SampleStream {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
