//! Telemetry Trending Engine
//!
//! A stateless library for extracting quality-control signals from instrument
//! telemetry. Mnemonic streams are sampled independently and irregularly; this
//! crate combines them under temporal conditions.
//!
//! # Architecture
//!
//! The engine works on streams already loaded into memory:
//! - [`Condition`] evaluates AND-combined predicates over reference streams
//! - [`extract_data`] filters a target stream by a condition
//! - [`lamp::aggregate`] summarizes current/voltage per calibration lamp interval
//! - [`position::correlate`] attributes sensor readings to mechanism positions
//! - [`position::match_nominals`] does the same by nominal sensor value
//!
//! The library does NOT:
//! - Read or parse telemetry exports
//! - Decide which mnemonics to trend under which condition
//! - Persist or plot results
//!
//! All of that lives in the application layer (telemetry-trending-cli).
//!
//! # Example Usage
//!
//! ```
//! use telemetry_trending::{extract_data, Condition, SampleStream, SubCondition};
//!
//! let lamp_sel = SampleStream::from_pairs(
//!     "INRSH_LAMP_SEL",
//!     vec![(0.0, "NO_LAMP"), (10.0, "LINE1")],
//! ).unwrap();
//! let temperature = SampleStream::from_pairs(
//!     "INRSH_OA_TEMP",
//!     vec![(1.0, 30.1), (5.0, 30.2), (11.0, 30.9)],
//! ).unwrap();
//!
//! let condition = Condition::new(vec![SubCondition::equal(&lamp_sel, "NO_LAMP")]);
//! let values = extract_data(&condition, &temperature).unwrap();
//!
//! assert_eq!(values, Some(vec![30.1, 30.2]));
//! ```

// Public modules
pub mod condition;
pub mod extract;
pub mod lamp;
pub mod position;
pub mod stats;
pub mod types;

// Re-export main types for convenience
pub use condition::{Condition, Relation, SubCondition};
pub use extract::{extract_data, extract_many, ExtractionResult};
pub use lamp::{ConsecutiveOnPolicy, LampGroups, LampIntervalRecord, LampSettings};
pub use position::{Nominals, PositionGroups, PositionRecord};
pub use stats::SampleStats;
pub use types::{Result, Sample, SampleStream, SampleValue, TrendingError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
