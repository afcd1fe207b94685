//! Telemetry export loading
//!
//! Reads mission telemetry exports into validated sample streams keyed by
//! mnemonic. Two formats are understood:
//! - CSV with `Telemetry Mnemonic`, `Secondary Time` and `EU Value` columns
//! - JSON mapping mnemonic -> `[{"time": .., "value": ..}]`
//!
//! CSV times are UTC calendar strings and are converted to Modified Julian Date.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use telemetry_trending::{Sample, SampleStream, SampleValue};

/// Unix epoch expressed as MJD
const MJD_UNIX_EPOCH: f64 = 40_587.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Accepted layouts of the `Secondary Time` column
const TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// All streams loaded from one export, keyed by mnemonic
#[derive(Debug, Clone, Default)]
pub struct MnemonicData {
    streams: BTreeMap<String, SampleStream>,
}

impl MnemonicData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stream: SampleStream) {
        self.streams.insert(stream.mnemonic().to_string(), stream);
    }

    pub fn get(&self, mnemonic: &str) -> Option<&SampleStream> {
        self.streams.get(mnemonic)
    }

    /// Look up a stream that the current routine cannot run without
    pub fn require(&self, mnemonic: &str) -> Result<&SampleStream> {
        self.get(mnemonic)
            .ok_or_else(|| anyhow!("Mnemonic {} not present in input", mnemonic))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }
}

/// Load a telemetry export, choosing the parser from the file extension
pub fn load_file(path: &Path) -> Result<MnemonicData> {
    log::info!("Loading telemetry export: {:?}", path);

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader = BufReader::new(file);

    let data = match extension.as_deref() {
        Some("csv") => {
            log::debug!("Detected CSV export format");
            read_csv(reader)
        }
        Some("json") => {
            log::debug!("Detected JSON export format");
            read_json(reader)
        }
        _ => bail!("Unsupported export format: {:?}", extension),
    }
    .with_context(|| format!("Failed to load {:?}", path))?;

    if data.is_empty() {
        log::warn!("No telemetry found in {:?}", path);
    } else {
        log::info!("Loaded {} mnemonics from {:?}", data.len(), path);
        log::debug!("Mnemonics: {}", data.mnemonics().collect::<Vec<_>>().join(", "));
    }
    Ok(data)
}

#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(rename = "Telemetry Mnemonic")]
    mnemonic: String,
    #[serde(rename = "Secondary Time")]
    time: String,
    #[serde(rename = "EU Value")]
    value: String,
}

/// Parse a CSV export; rows are grouped per mnemonic in file order
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<MnemonicData> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut grouped: BTreeMap<String, Vec<Sample>> = BTreeMap::new();

    for (line, row) in csv_reader.deserialize::<ExportRow>().enumerate() {
        let row = row.with_context(|| format!("Malformed export row {}", line + 1))?;
        let time = parse_time(&row.time)
            .with_context(|| format!("Bad time in export row {}: {:?}", line + 1, row.time))?;

        grouped
            .entry(row.mnemonic)
            .or_default()
            .push(Sample::new(time, SampleValue::from_raw(&row.value)));
    }

    build_streams(grouped)
}

/// Parse a JSON export
pub fn read_json<R: std::io::Read>(reader: R) -> Result<MnemonicData> {
    let grouped: BTreeMap<String, Vec<Sample>> =
        serde_json::from_reader(reader).context("Malformed JSON export")?;
    build_streams(grouped)
}

/// Validate each mnemonic's samples; a stream that fails validation is logged and left out
fn build_streams(grouped: BTreeMap<String, Vec<Sample>>) -> Result<MnemonicData> {
    let mut data = MnemonicData::new();
    for (mnemonic, samples) in grouped {
        log::trace!("{}: {} samples", mnemonic, samples.len());
        match SampleStream::new(mnemonic, samples) {
            Ok(stream) => data.insert(stream),
            Err(e) => log::warn!("Skipping stream: {}", e),
        }
    }
    Ok(data)
}

/// Convert an export time string (UTC) to MJD
pub fn parse_time(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    let parsed = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| anyhow!("Unrecognized time format: {:?}", raw))?;

    Ok(datetime_to_mjd(&parsed.and_utc()))
}

pub fn datetime_to_mjd(datetime: &DateTime<Utc>) -> f64 {
    datetime.timestamp_micros() as f64 / 1e6 / SECONDS_PER_DAY + MJD_UNIX_EPOCH
}

/// Convert MJD back to a UTC timestamp (millisecond resolution)
pub fn mjd_to_datetime(mjd: f64) -> Option<DateTime<Utc>> {
    let millis = ((mjd - MJD_UNIX_EPOCH) * SECONDS_PER_DAY * 1e3).round();
    if !millis.is_finite() {
        return None;
    }
    let millis = millis as i64;
    let secs = millis.div_euclid(1000);
    let nsecs = (millis.rem_euclid(1000) * 1_000_000) as u32;
    DateTime::from_timestamp(secs, nsecs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use telemetry_trending::{lamp, Condition, SubCondition};

    const EXPORT: &str = "\
Telemetry Mnemonic,Secondary Time,EU Value
INRSH_LAMP_SEL,2019/01/01 00:00:00.000,NO_LAMP
INRSH_OA_TEMP,2019/01/01 00:00:00.000,30.5
INRSH_OA_TEMP,2019/01/01 06:00:00.000,30.75
INRSH_LAMP_SEL,2019/01/01 12:00:00.000,LINE1
";

    #[test]
    fn test_parse_time_to_mjd() {
        // 2019-01-01T00:00:00Z is MJD 58484
        assert_eq!(parse_time("2019/01/01 00:00:00.000").unwrap(), 58484.0);
        assert_eq!(parse_time("2019-01-01T12:00:00").unwrap(), 58484.5);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_mjd_roundtrip() {
        let datetime = mjd_to_datetime(58484.25).unwrap();
        assert_eq!(datetime.to_rfc3339(), "2019-01-01T06:00:00+00:00");
        assert_eq!(datetime_to_mjd(&datetime), 58484.25);
        assert!(mjd_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_read_csv_groups_by_mnemonic() {
        let data = read_csv(EXPORT.as_bytes()).unwrap();

        assert_eq!(data.len(), 2);
        let temp = data.get("INRSH_OA_TEMP").unwrap();
        assert_eq!(temp.len(), 2);
        assert_eq!(temp.samples()[1].time, 58484.25);
        assert_eq!(temp.samples()[1].value.as_f64(), Some(30.75));

        let sel = data.get("INRSH_LAMP_SEL").unwrap();
        assert!(sel.samples()[1].value.is_token("LINE1"));
        assert_eq!(data.mnemonics().collect::<Vec<_>>(), vec!["INRSH_LAMP_SEL", "INRSH_OA_TEMP"]);
    }

    #[test]
    fn test_read_csv_skips_unsorted_stream() {
        let export = "\
Telemetry Mnemonic,Secondary Time,EU Value
GOOD,2019/01/01 00:00:00.000,1
BAD,2019/01/01 06:00:00.000,1
BAD,2019/01/01 00:00:00.000,2
GOOD,2019/01/01 06:00:00.000,2
";
        let data = read_csv(export.as_bytes()).unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data.get("GOOD").unwrap().len(), 2);
        assert!(data.get("BAD").is_none());
    }

    #[test]
    fn test_read_csv_keeps_value_text() {
        let export = "\
Telemetry Mnemonic,Secondary Time,EU Value
ICTM_RT_FILTER,2019/01/01 00:00:00.000,10.0
INRSH_LAMP_SEL,2019/01/01 00:00:00.000,007
INRSI_CAA_ON_FLAG,2019/01/01 06:00:00.000,ON
INRSI_CAA_ON_FLAG,2019/01/01 18:00:00.000,OFF
INRSI_C_CAA_CURRENT,2019/01/01 12:00:00.000,1.5
INRSI_C_CAA_VOLTAGE,2019/01/01 12:00:00.000,4.0
";
        let data = read_csv(export.as_bytes()).unwrap();

        let filter = data.get("ICTM_RT_FILTER").unwrap();
        assert_eq!(filter.samples()[0].value.to_string(), "10.0");

        let as_text = Condition::new(vec![SubCondition::equal(filter, "10.0")]);
        assert!(as_text.state(58484.5));
        let as_number =
            Condition::new(vec![SubCondition::equal(filter, 10.0).with_string_compare(false)]);
        assert!(as_number.state(58484.5));

        let groups = lamp::aggregate(
            data.get("INRSI_CAA_ON_FLAG").unwrap(),
            data.get("INRSH_LAMP_SEL").unwrap(),
            data.get("INRSI_C_CAA_CURRENT").unwrap(),
            data.get("INRSI_C_CAA_VOLTAGE").unwrap(),
        )
        .unwrap();
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["007"]);
        assert_eq!(groups["007"][0].current.mean, Some(1.5));
    }

    #[test]
    fn test_read_json() {
        let json = r#"{
            "INRSI_CAA_ON_FLAG": [{"time": 1.0, "value": "ON"}, {"time": 2.0, "value": "OFF"}],
            "INRSI_C_CAA_CURRENT": [{"time": 1.5, "value": 0.25}]
        }"#;
        let data = read_json(json.as_bytes()).unwrap();

        assert_eq!(data.len(), 2);
        assert!(data.get("INRSI_CAA_ON_FLAG").unwrap().samples()[0].value.is_token("ON"));
        assert_eq!(
            data.get("INRSI_C_CAA_CURRENT").unwrap().samples()[0].value,
            SampleValue::Number(0.25)
        );
        assert!(data.require("MISSING").is_err());
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("day.csv");
        File::create(&csv_path).unwrap().write_all(EXPORT.as_bytes()).unwrap();
        assert_eq!(load_file(&csv_path).unwrap().len(), 2);

        let other = dir.path().join("day.txt");
        File::create(&other).unwrap().write_all(b"nothing").unwrap();
        assert!(load_file(&other).is_err());

        assert!(load_file(&dir.path().join("absent.csv")).is_err());
    }
}
