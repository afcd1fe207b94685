//! Report generation
//!
//! Collects the results of one day of telemetry into a `DayReport` and writes
//! it as JSON next to the other reports of the run.

use crate::loader::mjd_to_datetime;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use telemetry_trending::{LampGroups, PositionGroups, SampleStats, SampleStream};

/// Trend record for one mnemonic over one input file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MnemonicSummary {
    /// First sample time of the source stream (MJD)
    pub start_time: f64,
    /// Last sample time of the source stream (MJD)
    pub end_time: f64,
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,
    pub n_data_points: usize,
    pub average: f64,
    pub deviation: f64,
}

impl MnemonicSummary {
    /// Summarize extracted values against the span of their source stream
    ///
    /// Returns `None` when fewer than `min_data_points` values are available.
    pub fn from_values(
        source: &SampleStream,
        values: &[f64],
        min_data_points: usize,
    ) -> Option<Self> {
        if values.len() < min_data_points.max(1) {
            return None;
        }

        let (start_time, end_time) = source.time_span()?;
        let stats = SampleStats::from_values(values);

        Some(Self {
            start_time,
            end_time,
            start_utc: mjd_to_datetime(start_time),
            end_utc: mjd_to_datetime(end_time),
            n_data_points: stats.count,
            average: stats.mean?,
            deviation: stats.stddev?,
        })
    }
}

/// Values extracted for one mnemonic under a condition group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionedSeries {
    pub group: String,
    pub values: Vec<f64>,
    pub summary: Option<MnemonicSummary>,
}

/// Everything computed from one telemetry export
#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub source: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub conditioned: BTreeMap<String, ConditionedSeries>,
    pub passthrough: BTreeMap<String, MnemonicSummary>,
    pub lamps: Option<LampGroups>,
    pub wheels: BTreeMap<String, PositionGroups>,
}

impl DayReport {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            generated_at: Utc::now(),
            conditioned: BTreeMap::new(),
            passthrough: BTreeMap::new(),
            lamps: None,
            wheels: BTreeMap::new(),
        }
    }

    /// Number of lamp interval records across all lamps
    pub fn lamp_interval_count(&self) -> usize {
        self.lamps
            .as_ref()
            .map(|groups| groups.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Report file name derived from the source file stem
    pub fn file_name(&self) -> String {
        let stem = self
            .source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("telemetry");
        format!("{}.trending.json", stem)
    }
}

/// Write the report as pretty JSON into `output_dir`, returning the file path
pub fn write_report(report: &DayReport, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let path = output_dir.join(report.file_name());
    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;

    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write report {:?}", path))?;

    log::info!("Report written: {:?}", path);
    Ok(path)
}
