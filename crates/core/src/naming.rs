//! Artifact naming codec
//!
//! Stored artifacts are named `<prefix>/<YYYY-MM-DD HH:mm:ss>[-full]`.
//! The timestamp format sorts lexically in chronological order, which the
//! catalog and every replacement naming scheme must preserve.

use crate::error::NamingError;
use crate::record::BackupKind;
use chrono::NaiveDateTime;

/// Timestamp format embedded in artifact names and accepted on the CLI
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix marking a full backup
pub const FULL_SUFFIX: &str = "-full";

/// Encode a timestamp and kind into a store identifier under `prefix`
pub fn encode(prefix: &str, timestamp: NaiveDateTime, kind: BackupKind) -> String {
    let name = match kind {
        BackupKind::Full => format!("{}{}", format_timestamp(timestamp), FULL_SUFFIX),
        BackupKind::Incremental => format_timestamp(timestamp),
    };

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Decode a store identifier into its timestamp and kind
///
/// Only the last non-empty `/` segment is inspected, so listings that carry a
/// trailing delimiter decode the same as bare identifiers.
pub fn decode(path: &str) -> Result<(NaiveDateTime, BackupKind), NamingError> {
    let name = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .ok_or_else(|| NamingError::Empty(path.to_string()))?;

    let (stamp, kind) = match name.strip_suffix(FULL_SUFFIX) {
        Some(stamp) => (stamp, BackupKind::Full),
        None => (name, BackupKind::Incremental),
    };

    Ok((parse_timestamp(stamp)?, kind))
}

/// Parse a `YYYY-MM-DD HH:mm:ss` value strictly
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, NamingError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
        NamingError::InvalidTimestamp {
            value: value.to_string(),
        }
    })
}

/// Render a timestamp in the naming format
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
