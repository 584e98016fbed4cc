use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use rc_types::model::{EventRecord, RunRecord};
use rc_types::{Error, Result};

/// Serializes `{"run": ..., "events": ...}` as a single JSON document,
/// gzip-compresses it, and moves it into place atomically via a temp file
/// in the same directory followed by a rename, so a concurrent reader never
/// observes a partially written export.
pub(crate) fn write_gzip_export(
    export_dir: &Path,
    record: &RunRecord,
    events: &[EventRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(export_dir)?;

    let document = serde_json::json!({
        "run": record,
        "events": events,
    });
    let bytes = serde_json::to_vec_pretty(&document)?;

    let tmp = tempfile::NamedTempFile::new_in(export_dir)?;
    {
        let mut encoder = GzEncoder::new(tmp.reopen()?, Compression::default());
        encoder.write_all(&bytes).map_err(Error::Io)?;
        encoder.finish().map_err(Error::Io)?;
    }

    let final_path = export_dir.join(format!("{}.json.gz", record.run_id));
    tmp.persist(&final_path).map_err(|e| Error::Io(e.error))?;
    Ok(final_path)
}
