//! `scout` - Wireless survey capture, ingestion and tactical tagging
//!
//! The capture side merges several radio scan passes into one set of
//! access points, stamps it with a durable locality id and appends it to a
//! delimited record vault. The ingestion side decodes vaults into a SQLite
//! store and classifies each stored observation with a configurable rule
//! set.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod agent;
pub mod cli;
pub mod codec;
pub mod config;
pub mod counter;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod observation;
pub mod scan;
pub mod storage;
pub mod tags;

pub use codec::RecordFile;
pub use config::Config;
pub use counter::{CounterStore, FileMedium};
pub use error::{Error, Result};
pub use ingest::IngestReport;
pub use logging::init_logging;
pub use observation::Observation;
pub use scan::{ScanMerger, ScanSource};
pub use storage::{IngestionScope, LocalityView, Storage, StorageStats, StoredObservation};
pub use tags::{classify, Reference, RuleSet, VendorTable};
