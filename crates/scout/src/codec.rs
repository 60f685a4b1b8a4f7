//! Delimited record format for captured observations.
//!
//! Each record is one line of seven `;`-separated fields:
//!
//! ```text
//! #ID_LOCALITY;SSID;MAC / BSSID;RSSI;CHANNEL;HIDDEN;SECURITY
//! 4;"Free_WiFi_Zone";aa:bb:cc:11:22:33;-52;6;0;0
//! ```
//!
//! The header is written once, when the file is created, and is marked by a
//! leading `#`. Data lines always begin with the locality id, so the marker
//! is never ambiguous. The SSID is always double-quoted; double quotes
//! inside an SSID are removed, not escaped, so such SSIDs do not survive a
//! round trip byte for byte.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::observation::Observation;

/// Field delimiter.
pub const DELIMITER: u8 = b';';

/// First byte of the header line.
pub const HEADER_MARKER: u8 = b'#';

/// Column names, in record order.
pub const FIELD_NAMES: [&str; 7] = [
    "ID_LOCALITY",
    "SSID",
    "MAC / BSSID",
    "RSSI",
    "CHANNEL",
    "HIDDEN",
    "SECURITY",
];

/// The header line, including its marker and trailing newline.
#[must_use]
pub fn header_line() -> String {
    format!("{}{}\n", char::from(HEADER_MARKER), FIELD_NAMES.join(";"))
}

/// Encode observations of one session as record lines, without a header.
#[must_use]
pub fn encode(session_id: i64, observations: &[Observation]) -> String {
    let mut out = String::new();
    for obs in observations {
        let ssid = obs.ssid.replace('"', "");
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{session_id};\"{ssid}\";{};{};{};{};{}",
            obs.bssid,
            obs.rssi,
            obs.channel,
            obs.hidden_flag(),
            obs.security
        );
    }
    out
}

/// A record line parsed back into typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRow {
    /// Line of the source the row was read from, starting at 1.
    pub line: u64,
    /// Locality id of the capture run.
    pub locality_id: i64,
    /// Network name.
    pub ssid: String,
    /// Hardware address, as written.
    pub bssid: String,
    /// Signal strength.
    pub rssi: i64,
    /// Radio channel.
    pub channel: i64,
    /// Hidden flag as written (normally 0 or 1).
    pub hidden: i64,
    /// Security mode code.
    pub security: i64,
}

impl DecodedRow {
    fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() != FIELD_NAMES.len() {
            return None;
        }
        let int = |idx: usize| record.get(idx)?.trim().parse::<i64>().ok();
        Some(Self {
            line: record.position().map_or(0, csv::Position::line),
            locality_id: int(0)?,
            ssid: record.get(1)?.to_string(),
            bssid: record.get(2)?.to_string(),
            rssi: int(3)?,
            channel: int(4)?,
            hidden: int(5)?,
            security: int(6)?,
        })
    }
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.as_bytes().first() == Some(&HEADER_MARKER))
}

/// Rows recovered from a record source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Rows that parsed cleanly, in file order.
    pub rows: Vec<DecodedRow>,
    /// Rows skipped because a field was missing or not numeric.
    pub dropped: usize,
}

/// Decode record text.
///
/// Malformed rows are skipped and counted; decoding never fails as a whole.
#[must_use]
pub fn decode(text: &str) -> DecodeReport {
    decode_reader(text.as_bytes())
}

/// Decode records from any reader.
///
/// Lines that are not valid UTF-8 are dropped like any other malformed
/// row. An I/O error stops decoding and returns what was read so far.
pub fn decode_reader<R: Read>(reader: R) -> DecodeReport {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut report = DecodeReport::default();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                warn!(error = %e, "Record source read failed, stopping decode");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Dropping unreadable record");
                report.dropped += 1;
                continue;
            }
        };

        // Not a csv comment: skipped comments shift record positions.
        if is_header(&record) {
            continue;
        }

        if let Some(row) = DecodedRow::from_record(&record) {
            report.rows.push(row);
        } else {
            let line = record.position().map_or(0, csv::Position::line);
            warn!(line, fields = record.len(), "Dropping malformed record");
            report.dropped += 1;
        }
    }

    debug!(
        "Decoded {} rows, dropped {}",
        report.rows.len(),
        report.dropped
    );
    report
}

/// A record file on disk, appended to by captures.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    /// Refer to the record file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one session's observations, writing the header first if the
    /// file is new or empty. Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn append(&self, session_id: i64, observations: &[Observation]) -> Result<usize> {
        let write_err = |source: std::io::Error| Error::RecordWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);

        let mut buf = String::new();
        if needs_header {
            buf.push_str(&header_line());
        }
        buf.push_str(&encode(session_id, observations));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(buf.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        info!(
            "Appended {} records for locality {} to {}",
            observations.len(),
            session_id,
            self.path.display()
        );
        Ok(observations.len())
    }

    /// Read and decode the whole file. A missing file decodes to nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be opened.
    pub fn load(&self) -> Result<DecodeReport> {
        match fs::File::open(&self.path) {
            Ok(file) => Ok(decode_reader(std::io::BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Record file not found: {}", self.path.display());
                Ok(DecodeReport::default())
            }
            Err(source) => Err(Error::RecordRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Delete the file. Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Record file {} purged", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Purge skipped, {} not found", self.path.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
