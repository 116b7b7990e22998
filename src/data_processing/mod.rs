//! File output for the simulation tooling. The rating core never touches the filesystem.

use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, &'static str> {
    let json_str = std::fs::read_to_string(path.as_ref()).map_err(|_| "File not found")?;
    serde_json::from_str(&json_str).map_err(|_| "Failed to parse JSON")
}

pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), &'static str> {
    let cached_json = serde_json::to_string_pretty(&value).map_err(|_| "Serialization error")?;
    std::fs::write(path.as_ref(), cached_json).map_err(|_| "File writing error")
}

fn write_to_csv<T: Serialize>(values: &[T], path: impl AsRef<Path>) -> Result<(), &'static str> {
    let file = std::fs::File::create(path.as_ref()).map_err(|_| "Output file not found")?;
    let mut writer = csv::Writer::from_writer(file);
    values
        .iter()
        .try_for_each(|val| writer.serialize(val))
        .map_err(|_| "Failed to serialize row")?;
    writer.flush().map_err(|_| "Failed to flush rows")
}

/// Writes `values` as JSON or CSV, chosen by the file extension. Failures are
/// logged rather than returned.
pub fn write_slice_to_file<T: Serialize>(values: &[T], path: impl AsRef<Path>) {
    let path = path.as_ref();
    let write_res = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => write_json(values, path),
        Some("csv") => write_to_csv(values, path),
        _ => Err("Invalid or missing filename extension"),
    };
    match write_res {
        Ok(()) => tracing::info!("Successfully wrote to {:?}", path),
        Err(msg) => tracing::error!("WARNING: failed write to {:?} because {}", path, msg),
    };
}
