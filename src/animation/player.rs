//! Single-clip player component (pure data).
//!
//! The player is the simplest pose producer, used where a full state
//! machine is unnecessary. Following the anemic-model split, this file
//! holds only the data; the business logic lives in
//! [`super::service::AnimationPlayerService`] and the per-frame system.

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::assets::{AnimationAssetCache, AssetHandle};
use crate::ecs::Time;

use super::pose::AnimationPose;
use super::service::AnimationPlayerService;

/// Plays one clip and emits a pose + skinning palette every frame.
#[derive(Component, Clone, Debug)]
pub struct AnimationPlayer {
    /// Asset id providing the skeleton.
    pub skeleton_asset: String,
    /// Asset id providing the clip library (often the same asset).
    pub animation_asset: String,
    /// Name of the clip to play.
    pub clip_name: String,
    /// Current playback time in seconds.
    pub current_time: f32,
    /// Playback speed (1.0 = authored speed).
    pub speed: f32,
    pub looping: bool,
    pub playing: bool,
    /// Lazily resolved handles; never persisted. `Some(INVALID)` records a
    /// failed acquire so we do not re-warn every frame — call
    /// [`AnimationPlayer::invalidate_handles`] to retry (e.g. after a
    /// hot-reload or scene load).
    pub(crate) skeleton_handle: Option<AssetHandle>,
    pub(crate) animation_handle: Option<AssetHandle>,
    pub(crate) clip_index: Option<usize>,
    /// Last sampled pose.
    pub last_pose: AnimationPose,
    /// Last composed skinning palette, one matrix per bone.
    pub skinning_matrices: Vec<Mat4>,
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self {
            skeleton_asset: String::new(),
            animation_asset: String::new(),
            clip_name: String::new(),
            current_time: 0.0,
            speed: 1.0,
            looping: false,
            playing: false,
            skeleton_handle: None,
            animation_handle: None,
            clip_index: None,
            last_pose: AnimationPose::default(),
            skinning_matrices: Vec::new(),
        }
    }
}

impl AnimationPlayer {
    pub fn new(
        skeleton_asset: impl Into<String>,
        animation_asset: impl Into<String>,
        clip_name: impl Into<String>,
    ) -> Self {
        Self {
            skeleton_asset: skeleton_asset.into(),
            animation_asset: animation_asset.into(),
            clip_name: clip_name.into(),
            ..Default::default()
        }
    }

    /// Drop cached handles so the next update re-resolves them. Handles are
    /// per-process and must never survive scene save/load.
    pub fn invalidate_handles(&mut self) {
        self.skeleton_handle = None;
        self.animation_handle = None;
        self.clip_index = None;
    }

    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }
}

/// Advances every [`AnimationPlayer`] once per tick.
pub fn animation_player_system(
    time: Res<Time>,
    mut cache: ResMut<AnimationAssetCache>,
    mut query: Query<&mut AnimationPlayer>,
) {
    for mut player in query.iter_mut() {
        AnimationPlayerService::update(&mut player, &mut cache, time.delta_seconds);
    }
}
