//! Player business logic.
//!
//! Anemic-model split: [`super::player::AnimationPlayer`] is pure data,
//! this service owns the behaviour, and `animation_player_system` is the
//! scheduling glue.
//!
//! The update path here also defines the fallback contract every other
//! pose producer matches: when skeleton or clip data is unavailable, the
//! player emits an identity palette of plausible length (previous length
//! if known, otherwise 1) instead of an empty array, so downstream GPU
//! buffers never see a zero-sized allocation.

use crate::assets::{AnimationAssetCache, AssetHandle};

use super::clip::wrap_clip_time;
use super::compositor::{compose_skinning_matrices, identity_palette};
use super::player::AnimationPlayer;
use super::sampler::sample_clip_pose;

/// Encapsulates single-clip playback behaviour.
pub struct AnimationPlayerService;

impl AnimationPlayerService {
    /// Switch to a clip by name and start playing from the beginning.
    pub fn play(player: &mut AnimationPlayer, clip_name: impl Into<String>) {
        player.clip_name = clip_name.into();
        player.clip_index = None;
        player.current_time = 0.0;
        player.playing = true;
    }

    pub fn pause(player: &mut AnimationPlayer) {
        player.playing = false;
    }

    pub fn resume(player: &mut AnimationPlayer) {
        player.playing = true;
    }

    /// Stop playback and rewind.
    pub fn stop(player: &mut AnimationPlayer) {
        player.playing = false;
        player.current_time = 0.0;
    }

    pub fn set_speed(player: &mut AnimationPlayer, speed: f32) {
        player.speed = speed;
    }

    /// Jump to a time, clamped to the clip's duration when known.
    pub fn seek(player: &mut AnimationPlayer, cache: &AnimationAssetCache, time: f32) {
        player.current_time = time.max(0.0);
        if let Some(clip) = Self::current_clip(player, cache) {
            player.current_time = player.current_time.min(clip.duration_seconds);
        }
    }

    /// Playback progress in `[0, 1]`.
    pub fn progress(player: &AnimationPlayer, cache: &AnimationAssetCache) -> f32 {
        match Self::current_clip(player, cache) {
            Some(clip) if clip.duration_seconds > 0.0 => {
                (player.current_time / clip.duration_seconds).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Advance playback and refresh the pose and skinning palette.
    ///
    /// Paused players still re-sample at the frozen time so editor
    /// scrubbing shows correct geometry.
    pub fn update(player: &mut AnimationPlayer, cache: &mut AnimationAssetCache, delta_time: f32) {
        Self::ensure_bound(player, cache);

        let clip_duration = Self::current_clip(player, cache).map(|c| c.duration_seconds);
        if player.playing {
            player.current_time += delta_time * player.speed;
            if let Some(duration) = clip_duration {
                let (time, finished) =
                    wrap_clip_time(player.current_time, duration, player.looping);
                player.current_time = time;
                if finished {
                    player.playing = false;
                }
            }
        }

        let skeleton_handle = player.skeleton_handle.unwrap_or(AssetHandle::INVALID);
        let animation_handle = player.animation_handle.unwrap_or(AssetHandle::INVALID);
        let skeleton = cache.skeleton(skeleton_handle);
        let clip = player
            .clip_index
            .and_then(|index| cache.clip(animation_handle, index));

        match (skeleton, clip) {
            (Some(skeleton), Some(clip)) => {
                let pose = sample_clip_pose(skeleton, clip, player.current_time);
                player.skinning_matrices = compose_skinning_matrices(skeleton, &pose);
                player.last_pose = pose;
            }
            _ => {
                player.skinning_matrices = identity_palette(player.skinning_matrices.len());
            }
        }
    }

    /// Resolve handles and the clip index lazily. A failed acquire is
    /// remembered as `INVALID` so warnings fire once, not every frame;
    /// `invalidate_handles` schedules a retry.
    fn ensure_bound(player: &mut AnimationPlayer, cache: &mut AnimationAssetCache) {
        if player.skeleton_handle.is_none() && !player.skeleton_asset.is_empty() {
            player.skeleton_handle = Some(cache.acquire(&player.skeleton_asset));
        }
        if player.animation_handle.is_none() && !player.animation_asset.is_empty() {
            player.animation_handle = if player.animation_asset == player.skeleton_asset {
                player.skeleton_handle
            } else {
                Some(cache.acquire(&player.animation_asset))
            };
        }
        if player.clip_index.is_none() && !player.clip_name.is_empty() {
            if let Some(handle) = player.animation_handle {
                player.clip_index = cache.resolve_clip_index(handle, &player.clip_name);
            }
        }
    }

    fn current_clip<'a>(
        player: &AnimationPlayer,
        cache: &'a AnimationAssetCache,
    ) -> Option<&'a crate::animation::clip::AnimationClip> {
        let handle = player.animation_handle?;
        cache.clip(handle, player.clip_index?)
    }
}
