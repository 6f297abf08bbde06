//! Channel-to-bone resolution and clip sampling.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::assets::names::canonical_bone_name;

use super::clip::{AnimationClip, Keyframe, TransformChannel};
use super::pose::{normalize_or_identity, AnimationPose};
use super::skeleton::Skeleton;

const AXIS_EPSILON: f32 = 1e-6;

/// Resolve which skeleton bone a channel targets.
///
/// The stored index is trusted when it is in range and the recorded source
/// name is empty or matches that bone; otherwise the source-name map and
/// then the canonical-name map recover the binding. Stored indices go stale
/// when a skeleton is re-imported with bones reordered; recovering by name
/// keeps old clips usable.
///
/// Resolution failures are reported at debug level only; the asset cache
/// rebinds every channel once at acquire time and owns the user-facing
/// warning, so the per-frame path cannot flood the log.
pub fn resolve_channel_bone_index(
    channel: &TransformChannel,
    skeleton: &Skeleton,
    clip_name: &str,
) -> Option<usize> {
    if let Some(index) = channel.bone_index {
        if let Some(bone) = skeleton.bone(index) {
            if channel.source_bone_name.is_empty()
                || bone.source_name == channel.source_bone_name
                || bone.name == channel.source_bone_name
            {
                return Some(index);
            }
        }
    }

    if !channel.source_bone_name.is_empty() {
        if let Some(index) = skeleton.bone_index_by_source(&channel.source_bone_name) {
            return Some(index);
        }
        let canonical = canonical_bone_name(&channel.source_bone_name);
        if let Some(index) = skeleton.bone_index(&canonical) {
            return Some(index);
        }
    }

    log::debug!(
        "Unresolved animation channel: clip '{}', bone '{}'",
        clip_name,
        channel.source_bone_name
    );
    None
}

/// Decompose a bind matrix into translation/rotation/scale without letting
/// degenerate axes produce NaN: per-axis scale is divided out and any
/// zero-length axis falls back to the matching identity basis vector.
pub fn decompose_bind_transform(matrix: &Mat4) -> (Vec3, Quat, Vec3) {
    let translation = matrix.w_axis.truncate();

    let x = matrix.x_axis.truncate();
    let y = matrix.y_axis.truncate();
    let z = matrix.z_axis.truncate();

    let (x_axis, sx) = safe_axis(x, Vec3::X);
    let (y_axis, sy) = safe_axis(y, Vec3::Y);
    let (z_axis, sz) = safe_axis(z, Vec3::Z);

    let rotation = normalize_or_identity(Quat::from_mat3(&Mat3::from_cols(x_axis, y_axis, z_axis)));
    (translation, rotation, Vec3::new(sx, sy, sz))
}

fn safe_axis(axis: Vec3, fallback: Vec3) -> (Vec3, f32) {
    let length = axis.length();
    if length.is_finite() && length > AXIS_EPSILON {
        (axis / length, length)
    } else {
        (fallback, 1.0)
    }
}

/// Build the rest pose from each bone's bind transform.
pub fn build_rest_pose(skeleton: &Skeleton) -> AnimationPose {
    let mut pose = AnimationPose::with_bone_count(skeleton.bone_count());
    for (i, bone) in skeleton.bones().iter().enumerate() {
        let (translation, rotation, scale) = decompose_bind_transform(&bone.local_bind_transform);
        pose.set_bone(i, translation, rotation, scale);
    }
    pose
}

/// Sample a clip at an arbitrary time into a pose.
///
/// Starts from the rest pose; each resolvable channel overwrites its bone's
/// transform via keyframe interpolation. Time outside the authored key range
/// clamps to the first/last key (looping is the caller's time-wrapping
/// concern, see [`super::clip::wrap_clip_time`]). Unresolvable channels are
/// skipped so the bone stays in bind pose.
pub fn sample_clip_pose(skeleton: &Skeleton, clip: &AnimationClip, time: f32) -> AnimationPose {
    let mut pose = build_rest_pose(skeleton);
    sample_clip_pose_into(skeleton, clip, time, &mut pose);
    pose
}

/// Like [`sample_clip_pose`] but overwriting an existing rest-pose copy,
/// sparing the bind decomposition on hot paths that cache the rest pose.
pub fn sample_clip_pose_into(
    skeleton: &Skeleton,
    clip: &AnimationClip,
    time: f32,
    pose: &mut AnimationPose,
) {
    for channel in &clip.channels {
        let Some(bone) = resolve_channel_bone_index(channel, skeleton, &clip.name) else {
            continue;
        };
        if bone >= pose.bone_count() {
            continue;
        }
        if let Some(value) = sample_vec3_keys(&channel.translation_keys, time) {
            pose.translations[bone] = value;
        }
        if let Some(value) = sample_quat_keys(&channel.rotation_keys, time) {
            pose.rotations[bone] = value;
        }
        if let Some(value) = sample_vec3_keys(&channel.scale_keys, time) {
            pose.scales[bone] = value;
        }
    }
}

/// Locate the bracketing key pair for `time` and return the interpolation
/// factor between them. Callers have already handled the empty / clamped
/// cases, so `first.time < time < last.time` holds here.
fn bracket<T>(keys: &[Keyframe<T>], time: f32) -> (usize, usize, f32) {
    let next = keys.partition_point(|k| k.time <= time);
    let prev = next - 1;
    let span = keys[next].time - keys[prev].time;
    let t = if span > f32::EPSILON {
        (time - keys[prev].time) / span
    } else {
        0.0
    };
    (prev, next, t)
}

fn sample_vec3_keys(keys: &[Keyframe<Vec3>], time: f32) -> Option<Vec3> {
    let first = keys.first()?;
    if keys.len() == 1 || time <= first.time {
        return Some(first.value);
    }
    let last = keys.last()?;
    if time >= last.time {
        return Some(last.value);
    }
    let (prev, next, t) = bracket(keys, time);
    Some(keys[prev].value.lerp(keys[next].value, t))
}

fn sample_quat_keys(keys: &[Keyframe<Quat>], time: f32) -> Option<Quat> {
    let first = keys.first()?;
    if keys.len() == 1 || time <= first.time {
        return Some(normalize_or_identity(first.value));
    }
    let last = keys.last()?;
    if time >= last.time {
        return Some(normalize_or_identity(last.value));
    }
    let (prev, next, t) = bracket(keys, time);
    let a = normalize_or_identity(keys[prev].value);
    let b = normalize_or_identity(keys[next].value);
    Some(a.slerp(b, t))
}
