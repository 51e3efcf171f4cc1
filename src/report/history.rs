use std::path::Path;

use crate::error::Result;
use crate::train::epoch_stats::EpochStats;

/// Writes the per-epoch history as a pretty-printed JSON array.
pub fn save_history(path: impl AsRef<Path>, history: &[EpochStats]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(history)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<EpochStats>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
