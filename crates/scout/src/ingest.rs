//! Ingestion of decoded records into the observation store.
//!
//! Every batch gets one ingestion timestamp. Rows that do not fit the
//! stored shape are dropped and counted; the remainder is inserted in a
//! single transaction.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::codec::{DecodedRow, RecordFile};
use crate::error::{Error, Result};
use crate::observation::is_canonical_bssid;
use crate::storage::{NewObservation, Storage};

/// Hex characters of the content digest used in archive names.
const ARCHIVE_DIGEST_LEN: usize = 16;

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Rows offered for ingestion.
    pub decoded: usize,
    /// Rows the decoder had already dropped.
    pub malformed: usize,
    /// Rows dropped by coercion.
    pub rejected: usize,
    /// Rows inserted.
    pub accepted: usize,
}

/// Coerce a decoded row into the stored shape.
///
/// Returns `None` when a field is out of range: a non-positive locality or
/// channel, a hidden flag other than 0 or 1, a negative security code, an
/// RSSI outside `i32`, or an address that is not six hex octets.
#[must_use]
pub fn coerce(row: &DecodedRow) -> Option<NewObservation> {
    if row.locality_id <= 0 {
        return None;
    }
    let channel = u32::try_from(row.channel).ok().filter(|c| *c > 0)?;
    let hidden = match row.hidden {
        0 => false,
        1 => true,
        _ => return None,
    };
    let security = u32::try_from(row.security).ok()?;
    let rssi = i32::try_from(row.rssi).ok()?;

    let mac = row.bssid.trim().to_ascii_lowercase();
    if !is_canonical_bssid(&mac) {
        return None;
    }

    Some(NewObservation {
        locality_id: row.locality_id,
        ssid: row.ssid.clone(),
        mac,
        rssi,
        channel,
        hidden,
        security,
    })
}

/// Insert decoded rows as one batch.
///
/// Rejected rows are skipped. If the insert fails nothing is stored and the
/// error is returned instead of a partial count.
///
/// # Errors
///
/// Returns an error if the storage transaction fails.
pub fn ingest(storage: &mut Storage, rows: &[DecodedRow]) -> Result<IngestReport> {
    let timestamp = Utc::now();
    let mut report = IngestReport {
        decoded: rows.len(),
        ..IngestReport::default()
    };

    let mut batch = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(obs) = coerce(row) {
            batch.push(obs);
        } else {
            warn!(
                line = row.line,
                locality = row.locality_id,
                bssid = %row.bssid,
                "Rejecting row that does not fit the stored shape"
            );
            report.rejected += 1;
        }
    }

    report.accepted = storage.insert_batch(timestamp, &batch)?;
    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        "Ingested batch at {}",
        timestamp.to_rfc3339()
    );
    Ok(report)
}

/// Decode a record file and ingest it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the insert fails.
pub fn ingest_file(storage: &mut Storage, file: &RecordFile) -> Result<IngestReport> {
    let decoded = file.load()?;
    debug!(
        "Ingesting {} decoded rows from {}",
        decoded.rows.len(),
        file.path().display()
    );
    let mut report = ingest(storage, &decoded.rows)?;
    report.malformed = decoded.dropped;
    Ok(report)
}

/// Move an ingested source into `archive_dir`, prefixing its name with a
/// digest of its contents. Returns the archived path.
///
/// # Errors
///
/// Returns an error if the source cannot be read or moved.
pub fn archive_source(source: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let digest = content_digest(source)?;
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::internal(format!("{} has no file name", source.display())))?;

    fs::create_dir_all(archive_dir).map_err(|e| Error::DirectoryCreate {
        path: archive_dir.to_path_buf(),
        source: e,
    })?;

    let target = archive_dir.join(format!(
        "{}-{}",
        &digest[..ARCHIVE_DIGEST_LEN],
        file_name.to_string_lossy()
    ));
    if target.exists() {
        warn!("Archive {} already exists, replacing", target.display());
    }

    if fs::rename(source, &target).is_err() {
        // Rename fails across file systems.
        fs::copy(source, &target)?;
        fs::remove_file(source)?;
    }

    info!("Archived {} to {}", source.display(), target.display());
    Ok(target)
}

/// Archive `source` after an ingest that stored at least one row.
///
/// A batch with nothing accepted leaves the source in place for
/// inspection and returns `None`.
///
/// # Errors
///
/// Returns an error if archiving was due and failed.
pub fn archive_ingested(
    report: &IngestReport,
    source: &Path,
    archive_dir: &Path,
) -> Result<Option<PathBuf>> {
    if report.accepted == 0 {
        warn!(
            malformed = report.malformed,
            rejected = report.rejected,
            "No rows accepted from {}, leaving it in place",
            source.display()
        );
        return Ok(None);
    }
    archive_source(source, archive_dir).map(Some)
}

fn content_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|source| Error::RecordRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
