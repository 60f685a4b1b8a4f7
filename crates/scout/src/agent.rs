//! Capture-side workflows: one capture cycle and vault maintenance.

use tracing::info;

use crate::codec::RecordFile;
use crate::counter::{CounterMedium, CounterStore};
use crate::error::Result;
use crate::scan::{ScanMerger, ScanSource};

/// Result of one capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Locality id the records were written under.
    pub locality_id: i64,
    /// Records appended to the vault.
    pub written: usize,
    /// Passes that returned results.
    pub passes_ok: usize,
    /// Passes that failed.
    pub passes_failed: usize,
}

/// Scan, allocate a locality id, and append the merged set to `vault`.
///
/// The id is allocated only once the scan has finished, so an aborted
/// scan never consumes one.
///
/// # Errors
///
/// Returns an error if the counter cannot be committed or the vault cannot
/// be written.
pub fn capture<S, M>(
    merger: &ScanMerger,
    source: &mut S,
    counter: &mut CounterStore<M>,
    vault: &RecordFile,
) -> Result<CaptureOutcome>
where
    S: ScanSource + ?Sized,
    M: CounterMedium,
{
    let report = merger.merge(source);
    let locality_id = counter.allocate_next()?;
    let written = vault.append(locality_id, &report.observations)?;

    info!(locality = locality_id, written, "Capture cycle committed to vault");
    Ok(CaptureOutcome {
        locality_id,
        written,
        passes_ok: report.passes_ok,
        passes_failed: report.passes_failed,
    })
}

/// Delete the vault and reset the counter so the next id is 1.
///
/// Returns whether a vault file was removed. Ingested rows elsewhere are
/// not touched.
///
/// # Errors
///
/// Returns an error if the vault exists but cannot be removed, or the
/// counter reset cannot be committed.
pub fn cleanup<M: CounterMedium>(
    counter: &mut CounterStore<M>,
    vault: &RecordFile,
) -> Result<bool> {
    let removed = vault.remove()?;
    counter.reset()?;
    info!("Maintenance finished, next locality id will be 1");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{FileMedium, MemoryMedium};
    use crate::observation::RawAccessPoint;
    use crate::scan::ScanError;
    use std::time::Duration;

    type ScanResult = std::result::Result<Vec<RawAccessPoint>, ScanError>;

    fn ap(last: u8, ssid: &str) -> RawAccessPoint {
        RawAccessPoint {
            ssid: ssid.as_bytes().to_vec(),
            bssid: [0, 0x11, 0x22, 0x33, 0x44, last],
            channel: 6,
            rssi: -50,
            security: 3,
            hidden: false,
        }
    }

    #[test]
    fn test_capture_appends_under_new_locality() {
        crate::logging::init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let vault = RecordFile::new(dir.path().join("vault.csv"));
        let mut counter = CounterStore::new(MemoryMedium::new());
        let merger = ScanMerger::new(2, Duration::ZERO);

        let mut scan = || -> ScanResult { Ok(vec![ap(1, "a"), ap(2, "b")]) };
        let first = capture(&merger, &mut scan, &mut counter, &vault).unwrap();
        assert_eq!(first.locality_id, 1);
        assert_eq!(first.written, 2);
        assert_eq!(first.passes_ok, 2);

        let second = capture(&merger, &mut scan, &mut counter, &vault).unwrap();
        assert_eq!(second.locality_id, 2);

        let report = vault.load().unwrap();
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[3].locality_id, 2);
    }

    #[test]
    fn test_capture_with_all_passes_failing_still_records_session() {
        let dir = tempfile::tempdir().unwrap();
        let vault = RecordFile::new(dir.path().join("vault.csv"));
        let mut counter = CounterStore::new(MemoryMedium::new());
        let merger = ScanMerger::new(3, Duration::ZERO);

        let mut scan = || -> ScanResult { Err(ScanError::Radio("down".to_string())) };
        let outcome = capture(&merger, &mut scan, &mut counter, &vault).unwrap();
        assert_eq!(outcome.locality_id, 1);
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.passes_failed, 3);
    }

    #[test]
    fn test_cleanup_resets_counter_and_removes_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault = RecordFile::new(dir.path().join("vault.csv"));
        let mut counter = CounterStore::new(FileMedium::new(dir.path().join("counter.json")));
        let merger = ScanMerger::new(1, Duration::ZERO);
        let mut scan = || -> ScanResult { Ok(vec![ap(1, "a")]) };

        capture(&merger, &mut scan, &mut counter, &vault).unwrap();
        capture(&merger, &mut scan, &mut counter, &vault).unwrap();

        assert!(cleanup(&mut counter, &vault).unwrap());
        assert!(!vault.path().exists());
        assert_eq!(counter.current(), 0);

        let next = capture(&merger, &mut scan, &mut counter, &vault).unwrap();
        assert_eq!(next.locality_id, 1);
    }

    #[test]
    fn test_cleanup_without_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault = RecordFile::new(dir.path().join("absent.csv"));
        let mut counter = CounterStore::new(MemoryMedium::new());
        counter.allocate_next().unwrap();

        assert!(!cleanup(&mut counter, &vault).unwrap());
        assert_eq!(counter.current(), 0);
    }
}
