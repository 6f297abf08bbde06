//! Asset cache: string ids in, stable integer handles out.
//!
//! Hot-path code never touches strings or performs I/O; it resolves a
//! handle once and reads skeletons/clips through it. Loading itself is an
//! external concern behind [`AnimationAssetSource`], so tests and editors
//! can plug in in-memory sources.

use std::collections::HashMap;

use bevy_ecs::prelude::*;

use crate::animation::clip::AnimationClip;
use crate::animation::sampler::resolve_channel_bone_index;
use crate::animation::skeleton::Skeleton;
use crate::core::error::AssetError;

use super::names::BoneNameRegistry;

/// Stable per-process handle for a skeleton + clip-library pair.
///
/// Handles are never persisted; serialized components carry asset id
/// strings and re-resolve lazily after load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetHandle(u32);

impl AssetHandle {
    /// Sentinel returned when an acquire fails.
    pub const INVALID: AssetHandle = AssetHandle(u32::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// External loader seam: turns an asset id into skeleton + clip data.
/// The runtime makes no assumptions about the source document format.
pub trait AnimationAssetSource: Send + Sync {
    fn load(&self, asset_id: &str) -> Result<(Skeleton, Vec<AnimationClip>), AssetError>;
}

/// In-memory source used by tests and procedural content.
#[derive(Default)]
pub struct MemoryAssetSource {
    assets: HashMap<String, (Skeleton, Vec<AnimationClip>)>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        asset_id: impl Into<String>,
        skeleton: Skeleton,
        clips: Vec<AnimationClip>,
    ) {
        self.assets.insert(asset_id.into(), (skeleton, clips));
    }
}

impl AnimationAssetSource for MemoryAssetSource {
    fn load(&self, asset_id: &str) -> Result<(Skeleton, Vec<AnimationClip>), AssetError> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                id: asset_id.to_string(),
            })
    }
}

struct AssetEntry {
    skeleton: Skeleton,
    clips: Vec<AnimationClip>,
    clip_indices: HashMap<String, usize>,
}

/// Process-lifetime cache of loaded animation assets.
///
/// Read-heavy after warm-up; not designed for concurrent mutation (the
/// load path in `acquire` is the only contention point, see the crate
/// docs). Eviction is not currently supported.
#[derive(Resource)]
pub struct AnimationAssetCache {
    source: Box<dyn AnimationAssetSource>,
    entries: Vec<AssetEntry>,
    by_id: HashMap<String, AssetHandle>,
    names: BoneNameRegistry,
}

impl AnimationAssetCache {
    pub fn new(source: Box<dyn AnimationAssetSource>) -> Self {
        Self {
            source,
            entries: Vec::new(),
            by_id: HashMap::new(),
            names: BoneNameRegistry::new(),
        }
    }

    /// The bone-name registry used when binding acquired assets.
    pub fn names(&self) -> &BoneNameRegistry {
        &self.names
    }

    /// Mutable registry access for tooling that registers profiles or
    /// aliases. Takes effect for assets acquired afterwards.
    pub fn names_mut(&mut self) -> &mut BoneNameRegistry {
        &mut self.names
    }

    /// Load (once) and return a stable handle for `asset_id`. Repeated
    /// calls with the same id return the same handle without reloading.
    ///
    /// A load failure, or an asset with an empty skeleton and an empty clip
    /// list, yields [`AssetHandle::INVALID`] with a logged warning. The
    /// failure is not cached: a later retry may succeed, e.g. after a
    /// hot-reload.
    pub fn acquire(&mut self, asset_id: &str) -> AssetHandle {
        if let Some(&handle) = self.by_id.get(asset_id) {
            return handle;
        }

        let (mut skeleton, mut clips) = match self.source.load(asset_id) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("Failed to load animation asset '{}': {}", asset_id, err);
                return AssetHandle::INVALID;
            }
        };
        if skeleton.is_empty() && clips.is_empty() {
            log::warn!("Animation asset '{}' is empty, returning invalid handle", asset_id);
            return AssetHandle::INVALID;
        }

        skeleton.canonicalize_names(&self.names, asset_id);
        for clip in &mut clips {
            self.rebind_clip_channels(clip, &skeleton, asset_id);
        }

        let clip_indices = clips
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        let handle = AssetHandle(self.entries.len() as u32);
        self.entries.push(AssetEntry {
            skeleton,
            clips,
            clip_indices,
        });
        self.by_id.insert(asset_id.to_string(), handle);
        handle
    }

    /// Bind every channel to its skeleton bone once, rewriting stale
    /// indices. Failures are warned about here, once per channel, so the
    /// per-frame sampler never has to.
    fn rebind_clip_channels(&self, clip: &mut AnimationClip, skeleton: &Skeleton, asset_id: &str) {
        let clip_name = clip.name.clone();
        for channel in &mut clip.channels {
            // Prefer the asset-assigned profile over the resolver's default
            // canonical fallback.
            let resolved = resolve_channel_bone_index(channel, skeleton, &clip_name).or_else(|| {
                let canonical = self.names.normalize(&channel.source_bone_name, asset_id);
                skeleton.bone_index(&canonical)
            });
            match resolved {
                Some(index) => channel.bone_index = Some(index),
                None => {
                    channel.bone_index = None;
                    log::warn!(
                        "Asset '{}': clip '{}' has a channel for unknown bone '{}'",
                        asset_id,
                        clip_name,
                        channel.source_bone_name
                    );
                }
            }
        }
    }

    /// Name -> index lookup scoped to one handle's clip list.
    pub fn resolve_clip_index(&self, handle: AssetHandle, clip_name: &str) -> Option<usize> {
        self.entry(handle)?.clip_indices.get(clip_name).copied()
    }

    pub fn skeleton(&self, handle: AssetHandle) -> Option<&Skeleton> {
        self.entry(handle).map(|e| &e.skeleton)
    }

    pub fn clip(&self, handle: AssetHandle, index: usize) -> Option<&AnimationClip> {
        self.entry(handle)?.clips.get(index)
    }

    pub fn clip_count(&self, handle: AssetHandle) -> usize {
        self.entry(handle).map_or(0, |e| e.clips.len())
    }

    fn entry(&self, handle: AssetHandle) -> Option<&AssetEntry> {
        if !handle.is_valid() {
            return None;
        }
        self.entries.get(handle.0 as usize)
    }
}
