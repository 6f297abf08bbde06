//! Unified error types for the animation runtime.
//!
//! Steady-state per-frame code never returns errors and never panics: bad
//! data degrades to a rest pose or an identity skinning palette instead.
//! The types here cover the load and registration surfaces where a caller
//! can still react to a failure.

use thiserror::Error;

/// Errors produced while acquiring skeleton/clip data for the cache.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {id}")]
    NotFound { id: String },

    #[error("Failed to load asset: {id}, reason: {reason}")]
    LoadFailed { id: String, reason: String },

    #[error("Asset contains no skeleton and no clips: {id}")]
    Empty { id: String },
}

/// Animation runtime errors.
#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Clip not found: {name}")]
    ClipNotFound { name: String },

    #[error("Unknown state '{state}' in layer '{layer}'")]
    UnknownState { layer: String, state: String },

    #[error("Malformed animator record: {0}")]
    MalformedRecord(String),
}
