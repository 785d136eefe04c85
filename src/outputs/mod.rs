//! Files written by a run.
//!
//! # Submodules
//!
//! - [`dataset`]: The combined CSV dataset, loaded at start and replaced atomically at the end
//! - [`report`]: The run summary, logged and optionally written as JSON
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── combined_data.csv      # country,source,title,date_iso,summary,url,category
//! └── combined_data.csv.tmp  # only while a write is in flight
//! reports/
//! └── run.json               # --report
//! ```

pub mod dataset;
pub mod report;
