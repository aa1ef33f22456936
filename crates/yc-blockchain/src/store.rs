//! JSON persistence of the block list.
//!
//! The file holds the blocks exactly as serialised by serde, in chain order.
//! Loaded chains are untrusted: hand them to [`crate::Ledger::from_blocks`].

use std::{fs, io, path::Path};

use tracing::debug;

use crate::{Block, BlockchainError};

/// Write `blocks` to `path`, replacing any previous file atomically.
pub fn save_chain(path: &Path, blocks: &[Block]) -> Result<(), BlockchainError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(blocks)?)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), blocks = blocks.len(), "Saved chain");
    Ok(())
}

/// Read the blocks stored at `path`.
///
/// Returns `None` when the file does not exist, is empty, or holds an empty
/// list, so the caller can start a fresh chain.
pub fn load_chain(path: &Path) -> Result<Option<Vec<Block>>, BlockchainError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }

    let blocks: Vec<Block> = serde_json::from_str(&contents)?;
    Ok(if blocks.is_empty() { None } else { Some(blocks) })
}
