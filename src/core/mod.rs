//! Core functionality shared by the rest of the runtime.

pub mod error;

pub use error::{AnimationError, AssetError};
