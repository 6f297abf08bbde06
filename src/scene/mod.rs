//! Scene-facing surface: the persisted animator record.

pub mod serialization;

pub use serialization::AnimatorRecord;
