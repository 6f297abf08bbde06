//! Blend-tree nodes: a small expression tree evaluating to a pose.
//!
//! The node set is deliberately closed (leaf = clip, branch = blend) so
//! evaluation stays exhaustive; extending it (e.g. an additive node) is a
//! conscious change here rather than open-ended inheritance elsewhere.

use crate::assets::{AnimationAssetCache, AssetHandle};

use super::clip::wrap_clip_time;
use super::compositor::blend_pose;
use super::parameters::ParameterTable;
use super::pose::AnimationPose;
use super::sampler::{build_rest_pose, sample_clip_pose};

/// Read-only evaluation context handed to every node.
pub struct EvalContext<'a> {
    pub cache: &'a AnimationAssetCache,
    /// Handle providing the skeleton to sample against.
    pub skeleton_handle: AssetHandle,
    /// Handle providing the clip library (often the same asset).
    pub animation_handle: AssetHandle,
    pub params: &'a ParameterTable,
}

/// Leaf node: advances its own clock and samples one clip.
#[derive(Clone, Debug)]
pub struct ClipNode {
    pub clip_index: usize,
    pub looping: bool,
    /// Base playback speed, overridden by `speed_parameter` when set.
    pub speed: f32,
    pub speed_parameter: Option<String>,
    time: f32,
}

/// Branch node: override-blends its second child onto its first.
#[derive(Clone, Debug)]
pub struct BlendPairNode {
    pub first: Box<BlendNode>,
    pub second: Box<BlendNode>,
    /// Blend weight, overridden by `weight_parameter` (clamped to [0, 1]).
    pub weight: f32,
    pub weight_parameter: Option<String>,
}

/// 1-D blend space: picks the bracketing pair of clip samples for a
/// parameter value and override-blends by the normalised position.
#[derive(Clone, Debug)]
pub struct BlendSpace1DNode {
    /// `(sample position, clip index)` pairs, sorted by position.
    samples: Vec<(f32, usize)>,
    pub parameter: String,
    pub looping: bool,
    time: f32,
}

/// A blend-tree node. Every variant supports resetting its internal time
/// and evaluating to a pose given a time delta.
#[derive(Clone, Debug)]
pub enum BlendNode {
    Clip(ClipNode),
    Blend(BlendPairNode),
    BlendSpace1D(BlendSpace1DNode),
}

impl BlendNode {
    /// A looping or one-shot clip leaf at normal speed.
    pub fn clip(clip_index: usize, looping: bool) -> Self {
        BlendNode::Clip(ClipNode {
            clip_index,
            looping,
            speed: 1.0,
            speed_parameter: None,
            time: 0.0,
        })
    }

    /// A clip leaf whose playback speed follows a named parameter.
    pub fn clip_with_speed_parameter(
        clip_index: usize,
        looping: bool,
        parameter: impl Into<String>,
    ) -> Self {
        BlendNode::Clip(ClipNode {
            clip_index,
            looping,
            speed: 1.0,
            speed_parameter: Some(parameter.into()),
            time: 0.0,
        })
    }

    /// Fixed-weight two-way blend.
    pub fn blend(first: BlendNode, second: BlendNode, weight: f32) -> Self {
        BlendNode::Blend(BlendPairNode {
            first: Box::new(first),
            second: Box::new(second),
            weight: weight.clamp(0.0, 1.0),
            weight_parameter: None,
        })
    }

    /// Two-way blend whose weight follows a named parameter.
    pub fn blend_by(first: BlendNode, second: BlendNode, parameter: impl Into<String>) -> Self {
        BlendNode::Blend(BlendPairNode {
            first: Box::new(first),
            second: Box::new(second),
            weight: 0.0,
            weight_parameter: Some(parameter.into()),
        })
    }

    /// 1-D blend space over `(position, clip index)` samples; the samples
    /// are sorted by position here, at construction.
    pub fn blend_space_1d(
        parameter: impl Into<String>,
        mut samples: Vec<(f32, usize)>,
    ) -> Self {
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        BlendNode::BlendSpace1D(BlendSpace1DNode {
            samples,
            parameter: parameter.into(),
            looping: true,
            time: 0.0,
        })
    }

    /// Reset internal time, recursively.
    pub fn reset(&mut self) {
        match self {
            BlendNode::Clip(node) => node.time = 0.0,
            BlendNode::Blend(node) => {
                node.first.reset();
                node.second.reset();
            }
            BlendNode::BlendSpace1D(node) => node.time = 0.0,
        }
    }

    /// Advance internal clocks by `delta_time` and produce a pose.
    ///
    /// Missing clip data degrades to the rest pose; a missing skeleton to
    /// an empty pose the caller's fallback contract turns into an identity
    /// palette.
    pub fn evaluate(&mut self, ctx: &EvalContext<'_>, delta_time: f32) -> AnimationPose {
        match self {
            BlendNode::Clip(node) => node.evaluate(ctx, delta_time),
            BlendNode::Blend(node) => {
                let mut pose = node.first.evaluate(ctx, delta_time);
                let second = node.second.evaluate(ctx, delta_time);
                let weight = node
                    .weight_parameter
                    .as_deref()
                    .map_or(node.weight, |p| ctx.params.get_float(p))
                    .clamp(0.0, 1.0);
                blend_pose(&mut pose, &second, weight, None);
                pose
            }
            BlendNode::BlendSpace1D(node) => node.evaluate(ctx, delta_time),
        }
    }
}

impl ClipNode {
    fn evaluate(&mut self, ctx: &EvalContext<'_>, delta_time: f32) -> AnimationPose {
        let speed = self
            .speed_parameter
            .as_deref()
            .map_or(self.speed, |p| ctx.params.get_float(p));
        self.time += delta_time * speed;

        let Some(skeleton) = ctx.cache.skeleton(ctx.skeleton_handle) else {
            return AnimationPose::default();
        };
        let Some(clip) = ctx.cache.clip(ctx.animation_handle, self.clip_index) else {
            return build_rest_pose(skeleton);
        };

        let (time, _) = wrap_clip_time(self.time, clip.duration_seconds, self.looping);
        // Store the wrapped/clamped clock so it never grows without bound
        // and loses f32 precision over long sessions.
        self.time = time;
        sample_clip_pose(skeleton, clip, time)
    }
}

impl BlendSpace1DNode {
    fn evaluate(&mut self, ctx: &EvalContext<'_>, delta_time: f32) -> AnimationPose {
        self.time += delta_time;

        let Some(skeleton) = ctx.cache.skeleton(ctx.skeleton_handle) else {
            return AnimationPose::default();
        };
        if self.samples.is_empty() {
            return build_rest_pose(skeleton);
        }

        let value = ctx.params.get_float(&self.parameter);
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];

        // Clamp to the outermost samples at the extremes.
        if self.samples.len() == 1 || value <= first.0 {
            return self.sample(ctx, skeleton, first.1);
        }
        if value >= last.0 {
            return self.sample(ctx, skeleton, last.1);
        }

        let upper = self.samples.partition_point(|s| s.0 <= value);
        let lower = upper - 1;
        let (p0, clip_a) = self.samples[lower];
        let (p1, clip_b) = self.samples[upper];
        let span = p1 - p0;
        let t = if span > f32::EPSILON {
            (value - p0) / span
        } else {
            0.0
        };

        let mut pose = self.sample(ctx, skeleton, clip_a);
        let second = self.sample(ctx, skeleton, clip_b);
        blend_pose(&mut pose, &second, t, None);
        pose
    }

    fn sample(
        &self,
        ctx: &EvalContext<'_>,
        skeleton: &crate::animation::skeleton::Skeleton,
        clip_index: usize,
    ) -> AnimationPose {
        let Some(clip) = ctx.cache.clip(ctx.animation_handle, clip_index) else {
            return build_rest_pose(skeleton);
        };
        let (time, _) = wrap_clip_time(self.time, clip.duration_seconds, self.looping);
        sample_clip_pose(skeleton, clip, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationClip, TransformChannel};
    use crate::animation::skeleton::{Bone, Skeleton};
    use crate::assets::MemoryAssetSource;
    use glam::Vec3;

    fn translating_clip(name: &str, to: Vec3, duration: f32) -> AnimationClip {
        let mut channel = TransformChannel::new("root");
        channel.add_translation_key(0.0, Vec3::ZERO);
        channel.add_translation_key(duration, to);
        let mut clip = AnimationClip::new(name, duration);
        clip.add_channel(channel);
        clip
    }

    fn test_cache() -> (AnimationAssetCache, AssetHandle) {
        let mut source = MemoryAssetSource::new();
        source.insert(
            "rig",
            Skeleton::new(vec![Bone::new("root", None)]),
            vec![
                translating_clip("idle", Vec3::ZERO, 1.0),
                translating_clip("walk", Vec3::new(1.0, 0.0, 0.0), 1.0),
                translating_clip("run", Vec3::new(3.0, 0.0, 0.0), 1.0),
            ],
        );
        let mut cache = AnimationAssetCache::new(Box::new(source));
        let handle = cache.acquire("rig");
        (cache, handle)
    }

    fn ctx<'a>(
        cache: &'a AnimationAssetCache,
        handle: AssetHandle,
        params: &'a ParameterTable,
    ) -> EvalContext<'a> {
        EvalContext {
            cache,
            skeleton_handle: handle,
            animation_handle: handle,
            params,
        }
    }

    #[test]
    fn test_clip_node_advances_and_wraps() {
        let (cache, handle) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(1, true);

        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.5);
        assert!((pose.translations[0].x - 0.5).abs() < 1e-5);

        // 0.5 + 1.0 wraps to 0.5 again.
        let pose = node.evaluate(&ctx(&cache, handle, &params), 1.0);
        assert!((pose.translations[0].x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_clip_node_clamps_when_not_looping() {
        let (cache, handle) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(1, false);

        let pose = node.evaluate(&ctx(&cache, handle, &params), 5.0);
        assert!((pose.translations[0].x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_speed_parameter_overrides() {
        let (cache, handle) = test_cache();
        let mut params = ParameterTable::new();
        params.set_float("walk_speed", 2.0);
        let mut node = BlendNode::clip_with_speed_parameter(1, false, "walk_speed");

        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.25);
        assert!((pose.translations[0].x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_blend_pair_by_parameter() {
        let (cache, handle) = test_cache();
        let mut params = ParameterTable::new();
        params.set_float("mix", 0.5);
        let mut node = BlendNode::blend_by(BlendNode::clip(0, true), BlendNode::clip(1, true), "mix");

        let pose = node.evaluate(&ctx(&cache, handle, &params), 1.0);
        // idle stays at 0 (keys 0..0), walk wraps to t=0 -> 0; use half way
        // through instead.
        let mut node2 =
            BlendNode::blend_by(BlendNode::clip(0, true), BlendNode::clip(1, true), "mix");
        let pose2 = node2.evaluate(&ctx(&cache, handle, &params), 0.5);
        assert!((pose2.translations[0].x - 0.25).abs() < 1e-5);
        assert!(pose.translations[0].x.abs() < 1e-5);
    }

    #[test]
    fn test_blend_space_brackets_and_clamps() {
        let (cache, handle) = test_cache();
        let mut params = ParameterTable::new();
        // Unsorted on purpose; constructor sorts.
        let mut node = BlendNode::blend_space_1d(
            "speed",
            vec![(2.0, 2), (0.0, 0), (1.0, 1)],
        );

        // Below the first sample: pure idle.
        params.set_float("speed", -1.0);
        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.5);
        assert!(pose.translations[0].x.abs() < 1e-5);

        // Midway between walk and run at clip time 0.5: 0.5*(0.5+1.5).
        params.set_float("speed", 1.5);
        let mut node = BlendNode::blend_space_1d("speed", vec![(0.0, 0), (1.0, 1), (2.0, 2)]);
        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.5);
        assert!((pose.translations[0].x - 1.0).abs() < 1e-4);

        // Beyond the last sample: pure run.
        params.set_float("speed", 9.0);
        let mut node = BlendNode::blend_space_1d("speed", vec![(0.0, 0), (1.0, 1), (2.0, 2)]);
        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.5);
        assert!((pose.translations[0].x - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_clip_degrades_to_rest_pose() {
        let (cache, handle) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(99, true);

        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.1);
        assert_eq!(pose.bone_count(), 1);
        assert_eq!(pose.translations[0], Vec3::ZERO);
    }

    #[test]
    fn test_missing_skeleton_yields_empty_pose() {
        let (cache, _) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(0, true);
        let bad = EvalContext {
            cache: &cache,
            skeleton_handle: AssetHandle::INVALID,
            animation_handle: AssetHandle::INVALID,
            params: &params,
        };
        assert!(node.evaluate(&bad, 0.1).is_empty());
    }

    #[test]
    fn test_looping_clock_stays_wrapped() {
        let (cache, handle) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(1, true);

        // At 1e8 the f32 spacing is 8.0; if the clock were left
        // unwrapped, the next 0.25s advance would vanish entirely.
        node.evaluate(&ctx(&cache, handle, &params), 1e8);
        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.25);
        assert!((pose.translations[0].x - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_reset_rewinds_clocks() {
        let (cache, handle) = test_cache();
        let params = ParameterTable::new();
        let mut node = BlendNode::clip(1, false);
        node.evaluate(&ctx(&cache, handle, &params), 0.75);
        node.reset();
        let pose = node.evaluate(&ctx(&cache, handle, &params), 0.25);
        assert!((pose.translations[0].x - 0.25).abs() < 1e-5);
    }
}
