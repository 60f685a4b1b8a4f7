//! Multi-pass scan merging.
//!
//! A single radio scan routinely misses access points, so a capture runs
//! several passes and folds them into one set keyed by hardware address.
//! The radio itself sits behind the [`ScanSource`] trait.

mod replay;

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::observation::{Observation, RawAccessPoint};

pub use replay::{ReplayAccessPoint, ReplayPass, ReplayScanSource};

/// Default number of scan passes per capture.
pub const DEFAULT_PASSES: usize = 3;

/// Default pause between passes, letting the radio settle.
pub const DEFAULT_INTER_PASS_DELAY: Duration = Duration::from_millis(300);

/// Errors a scan source may report for a single pass.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The radio could not be brought up or failed mid-scan.
    #[error("radio error: {0}")]
    Radio(String),
}

/// Something that can perform one scan pass.
pub trait ScanSource {
    /// Run one scan and return every access point it saw.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass failed. The merger treats this as a
    /// pass with zero results.
    fn scan(&mut self) -> Result<Vec<RawAccessPoint>, ScanError>;
}

impl<F> ScanSource for F
where
    F: FnMut() -> Result<Vec<RawAccessPoint>, ScanError>,
{
    fn scan(&mut self) -> Result<Vec<RawAccessPoint>, ScanError> {
        self()
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// One observation per distinct hardware address, sorted by address.
    pub observations: Vec<Observation>,
    /// Passes that returned results (possibly empty).
    pub passes_ok: usize,
    /// Passes that failed and contributed nothing.
    pub passes_failed: usize,
}

/// Runs a fixed number of scan passes and deduplicates the results.
#[derive(Debug, Clone)]
pub struct ScanMerger {
    passes: usize,
    delay: Duration,
}

impl Default for ScanMerger {
    fn default() -> Self {
        Self::new(DEFAULT_PASSES, DEFAULT_INTER_PASS_DELAY)
    }
}

impl ScanMerger {
    /// Create a merger running `passes` scans with `delay` between them.
    #[must_use]
    pub fn new(passes: usize, delay: Duration) -> Self {
        Self { passes, delay }
    }

    /// Number of passes per merge.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Pause applied between consecutive passes.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run every pass against `source` and fold the results.
    ///
    /// Later passes overwrite earlier ones for the same hardware address.
    /// A failed pass is logged and skipped; the merge itself never fails.
    /// Blocks for the inter-pass delays.
    pub fn merge<S: ScanSource + ?Sized>(&self, source: &mut S) -> MergeReport {
        let mut merged: BTreeMap<String, Observation> = BTreeMap::new();
        let mut report = MergeReport::default();

        for pass in 1..=self.passes {
            if pass > 1 && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }

            debug!("Scan pass {}/{} in progress", pass, self.passes);
            match source.scan() {
                Ok(batch) => {
                    debug!(pass, count = batch.len(), "Scan pass returned");
                    for raw in &batch {
                        let obs = Observation::from_raw(raw);
                        merged.insert(obs.bssid.clone(), obs);
                    }
                    report.passes_ok += 1;
                }
                Err(e) => {
                    warn!(pass, error = %e, "Scan pass failed, skipping");
                    report.passes_failed += 1;
                }
            }
        }

        report.observations = merged.into_values().collect();
        info!(
            "Merged {} passes into {} unique access points ({} failed)",
            self.passes,
            report.observations.len(),
            report.passes_failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn ap(last_octet: u8, ssid: &str, rssi: i32) -> RawAccessPoint {
        RawAccessPoint {
            ssid: ssid.as_bytes().to_vec(),
            bssid: [0x00, 0x11, 0x22, 0x33, 0x44, last_octet],
            channel: 1,
            rssi,
            security: 0,
            hidden: false,
        }
    }

    fn scripted(
        passes: Vec<Result<Vec<RawAccessPoint>, ScanError>>,
    ) -> impl FnMut() -> Result<Vec<RawAccessPoint>, ScanError> {
        let mut queue: VecDeque<_> = passes.into();
        move || queue.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn merger() -> ScanMerger {
        ScanMerger::new(3, Duration::ZERO)
    }

    #[test]
    fn test_default_merger() {
        let merger = ScanMerger::default();
        assert_eq!(merger.passes(), 3);
        assert_eq!(merger.delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_merge_last_pass_wins() {
        let mut source = scripted(vec![
            Ok(vec![ap(1, "first", -80), ap(2, "other", -60)]),
            Ok(vec![ap(1, "second", -70)]),
            Ok(vec![ap(3, "late", -50)]),
        ]);

        let report = merger().merge(&mut source);
        assert_eq!(report.observations.len(), 3);
        assert_eq!(report.passes_ok, 3);

        let one = report
            .observations
            .iter()
            .find(|o| o.bssid == "00:11:22:33:44:01")
            .unwrap();
        assert_eq!(one.ssid, "second");
        assert_eq!(one.rssi, -70);
    }

    #[test]
    fn test_merge_one_per_bssid_within_pass() {
        let mut source = scripted(vec![Ok(vec![ap(1, "a", -90), ap(1, "b", -10)])]);
        let report = merger().merge(&mut source);
        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.observations[0].ssid, "b");
    }

    #[test]
    fn test_merge_failed_pass_is_skipped() {
        let mut source = scripted(vec![
            Ok(vec![ap(1, "kept", -40)]),
            Err(ScanError::Radio("busy".to_string())),
            Ok(vec![ap(2, "after", -41)]),
        ]);

        let report = merger().merge(&mut source);
        assert_eq!(report.passes_ok, 2);
        assert_eq!(report.passes_failed, 1);
        assert_eq!(report.observations.len(), 2);
        assert_eq!(report.observations[0].ssid, "kept");
    }

    #[test]
    fn test_merge_all_passes_fail() {
        let mut source = scripted(vec![
            Err(ScanError::Radio("1".to_string())),
            Err(ScanError::Radio("2".to_string())),
            Err(ScanError::Radio("3".to_string())),
        ]);
        let report = merger().merge(&mut source);
        assert!(report.observations.is_empty());
        assert_eq!(report.passes_failed, 3);
    }

    #[test]
    fn test_merge_calls_source_exactly_pass_count_times() {
        let mut calls = 0;
        let mut source = || -> Result<Vec<RawAccessPoint>, ScanError> {
            calls += 1;
            Ok(Vec::new())
        };
        merger().merge(&mut source);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_merge_waits_between_passes_only() {
        let merger = ScanMerger::new(3, Duration::from_millis(20));
        let mut source = scripted(Vec::new());
        let started = std::time::Instant::now();
        merger.merge(&mut source);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_scan_error_display() {
        assert_eq!(
            ScanError::Radio("timeout".to_string()).to_string(),
            "radio error: timeout"
        );
    }
}
