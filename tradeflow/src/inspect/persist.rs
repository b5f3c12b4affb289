//! Saving and loading run states.

use super::{deserialize, serialize};
use crate::errors::TradeflowError;
use crate::state::RunState;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// File name used under a results directory.
pub const STATE_FILE_NAME: &str = "run_state.json";

/// Returns `<dir>/<TICKER>/<YYYY-MM-DD>/run_state.json`.
#[must_use]
pub fn results_path(dir: &Path, ticker: &str, trade_date: NaiveDate) -> PathBuf {
    dir.join(ticker)
        .join(trade_date.to_string())
        .join(STATE_FILE_NAME)
}

/// Writes the state as JSON, creating parent directories.
pub fn save_state(state: &RunState, path: impl AsRef<Path>) -> Result<(), TradeflowError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serialize(state)?)?;
    tracing::debug!(path = %path.display(), "Run state saved");
    Ok(())
}

/// Reads a state written by [`save_state`].
pub fn load_state(path: impl AsRef<Path>) -> Result<RunState, TradeflowError> {
    let bytes = std::fs::read(path.as_ref())?;
    deserialize(&bytes)
}
