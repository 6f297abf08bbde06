//! Asset access: the handle-based cache and bone-name canonicalisation.

pub mod cache;
pub mod names;

pub use cache::{AnimationAssetCache, AnimationAssetSource, AssetHandle, MemoryAssetSource};
pub use names::{canonical_bone_name, BoneNameRegistry, NameProfile};
