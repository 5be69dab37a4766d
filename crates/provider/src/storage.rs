//! Local storage for downloaded assets.

use std::path::{Path, PathBuf};

use crate::provider::ProviderError;

/// Build the file name for the `index`-th asset of a task.
///
/// `txt2img_20260301_120000_<task>_0.png`
pub fn asset_file_name(prefix: &str, task_uuid: &str, index: usize) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let short_task: String = task_uuid.chars().filter(|c| *c != '-').take(8).collect();
    format!("{prefix}_{stamp}_{short_task}_{index}.png")
}

/// Write `bytes` to `dir/file_name`, creating `dir` if needed.
pub async fn write_asset(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ProviderError> {
    let storage_err = |path: &Path, source: std::io::Error| ProviderError::Storage {
        path: path.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| storage_err(dir, e))?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| storage_err(&path, e))?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Asset saved");
    Ok(path)
}
