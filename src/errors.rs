// /src/errors.rs
//! Error type shared by the live tree, the locator and the applier.
//!
//! Structural mismatches between snapshots are never errors (they become
//! `Redraw` patches). Everything here means the live tree and the patch list
//! disagree, which the engine refuses to paper over.
use crate::live::LiveId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Patch {action} at index {index} was never attached to a live node")]
    UnlocatedPatch { action: String, index: usize },

    #[error("Patch {action} at index {index} reached the applier outside of its keyed parent")]
    MisplacedPatch { action: String, index: usize },

    #[error("Live node {0} does not exist")]
    MissingLiveNode(LiveId),

    #[error("Live node {child} is not a child of {parent}")]
    NotAChild { parent: LiveId, child: LiveId },

    #[error("Live tree does not match the old snapshot at index {index}: {details}")]
    LiveTreeMismatch { index: usize, details: String },

    #[error("Keyed move entry {0} has no detached live node")]
    MissingMoveEntry(usize),

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
