//! Pose blending and skinning-matrix composition.

use glam::Mat4;

use super::pose::{normalize_or_identity, AnimationMask, AnimationPose};
use super::skeleton::Skeleton;

fn final_weight(weight: f32, mask: Option<&AnimationMask>, bone: usize) -> f32 {
    (weight * mask.map_or(1.0, |m| m.weight(bone))).clamp(0.0, 1.0)
}

/// Override-blend `target` onto `base`, per bone, by
/// `clamp(weight * mask_weight, 0, 1)`. Translation and scale mix linearly;
/// rotations take the normalised shortest-path slerp.
pub fn blend_pose(
    base: &mut AnimationPose,
    target: &AnimationPose,
    weight: f32,
    mask: Option<&AnimationMask>,
) {
    let count = base.bone_count().min(target.bone_count());
    for bone in 0..count {
        let w = final_weight(weight, mask, bone);
        if w <= 0.0 {
            continue;
        }
        base.translations[bone] = base.translations[bone].lerp(target.translations[bone], w);
        base.scales[bone] = base.scales[bone].lerp(target.scales[bone], w);
        let a = normalize_or_identity(base.rotations[bone]);
        let b = normalize_or_identity(target.rotations[bone]);
        base.rotations[bone] = a.slerp(b, w);
    }
}

/// Apply `additive` on top of `base` as a weighted delta. The additive
/// rotation is a local delta composed onto the base rotation, not an
/// independent target:
/// `base_r = slerp(base_r, base_r * normalize(add_r), w)`.
pub fn additive_pose(
    base: &mut AnimationPose,
    additive: &AnimationPose,
    weight: f32,
    mask: Option<&AnimationMask>,
) {
    let count = base.bone_count().min(additive.bone_count());
    for bone in 0..count {
        let w = final_weight(weight, mask, bone);
        if w <= 0.0 {
            continue;
        }
        base.translations[bone] += additive.translations[bone] * w;
        base.scales[bone] += additive.scales[bone] * w;
        let base_r = normalize_or_identity(base.rotations[bone]);
        let delta = normalize_or_identity(additive.rotations[bone]);
        base.rotations[bone] = base_r.slerp(base_r * delta, w);
    }
}

/// Compose a pose's local transforms into one skinning matrix per bone.
///
/// Local matrices are `translate * rotate * scale`. The hierarchy is walked
/// from every parentless bone (bone 0 if none are parentless) with an
/// explicit worklist, accumulating `global = parent_global * local`; bones
/// never reached keep their local matrix as their global matrix. The final
/// palette entry is `global * inverse_bind_matrix`.
pub fn compose_skinning_matrices(skeleton: &Skeleton, pose: &AnimationPose) -> Vec<Mat4> {
    let bone_count = skeleton.bone_count();
    if bone_count == 0 {
        return Vec::new();
    }

    let locals: Vec<Mat4> = (0..bone_count)
        .map(|i| {
            if i < pose.bone_count() {
                Mat4::from_scale_rotation_translation(
                    pose.scales[i],
                    normalize_or_identity(pose.rotations[i]),
                    pose.translations[i],
                )
            } else {
                // Pose sampled against a smaller rig; stay in bind pose.
                skeleton.bones()[i].local_bind_transform
            }
        })
        .collect();

    // Disconnected bones fall back to local-as-global.
    let mut globals = locals.clone();
    let mut reached = vec![false; bone_count];

    let mut worklist = skeleton.roots();
    if worklist.is_empty() {
        worklist.push(0);
    }
    for &root in &worklist {
        reached[root] = true;
    }
    while let Some(index) = worklist.pop() {
        let parent_global = globals[index];
        for &child in &skeleton.bones()[index].children_indices {
            if child < bone_count && !reached[child] {
                globals[child] = parent_global * locals[child];
                reached[child] = true;
                worklist.push(child);
            }
        }
    }

    (0..bone_count)
        .map(|i| globals[i] * skeleton.bones()[i].inverse_bind_matrix)
        .collect()
}

/// The fallback palette contract: when skeleton or clip data is
/// unavailable, consumers receive identity matrices of a plausible length
/// (the previous palette length if known, otherwise 1) so downstream GPU
/// buffers never see a zero-sized allocation.
pub fn identity_palette(previous_len: usize) -> Vec<Mat4> {
    vec![Mat4::IDENTITY; previous_len.max(1)]
}

/// Flatten a palette to bytes for buffer upload.
pub fn palette_bytes(palette: &[Mat4]) -> &[u8] {
    bytemuck::cast_slice(palette)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::sampler::build_rest_pose;
    use crate::animation::skeleton::Bone;
    use glam::{Quat, Vec3};
    use proptest::prelude::*;

    fn pose_pair() -> (AnimationPose, AnimationPose) {
        let a = AnimationPose::with_bone_count(2);
        let mut b = AnimationPose::with_bone_count(2);
        b.set_bone(
            0,
            Vec3::new(2.0, 0.0, 0.0),
            Quat::from_rotation_y(1.0),
            Vec3::splat(3.0),
        );
        b.set_bone(1, Vec3::new(0.0, 4.0, 0.0), Quat::IDENTITY, Vec3::ONE);
        (a, b)
    }

    #[test]
    fn test_blend_weight_zero_keeps_base() {
        let (mut a, b) = pose_pair();
        let before = a.clone();
        blend_pose(&mut a, &b, 0.0, None);
        assert_eq!(a.translations, before.translations);
        assert_eq!(a.rotations, before.rotations);
        assert_eq!(a.scales, before.scales);
    }

    #[test]
    fn test_blend_weight_one_matches_target() {
        let (mut a, b) = pose_pair();
        blend_pose(&mut a, &b, 1.0, None);
        assert!((a.translations[0] - b.translations[0]).length() < 1e-5);
        assert!((a.scales[0] - b.scales[0]).length() < 1e-5);
        // Rotation equal up to quaternion double-cover.
        assert!(a.rotations[0].dot(b.rotations[0]).abs() > 0.9999);
    }

    #[test]
    fn test_mask_zero_leaves_bone_untouched() {
        let (mut a, b) = pose_pair();
        let mut mask = AnimationMask::new(2);
        mask.set_weight(1, 0.0);
        blend_pose(&mut a, &b, 1.0, Some(&mask));
        assert!((a.translations[0] - b.translations[0]).length() < 1e-5);
        assert_eq!(a.translations[1], Vec3::ZERO);

        let (mut c, d) = pose_pair();
        additive_pose(&mut c, &d, 1.0, Some(&mask));
        assert_eq!(c.translations[1], Vec3::ZERO);
    }

    #[test]
    fn test_additive_rotation_is_local_delta() {
        let mut base = AnimationPose::with_bone_count(1);
        base.rotations[0] = Quat::from_rotation_y(0.7);
        let mut add = AnimationPose::with_bone_count(1);
        add.rotations[0] = Quat::from_rotation_y(0.3);

        additive_pose(&mut base, &add, 1.0, None);
        assert!(base.rotations[0].dot(Quat::from_rotation_y(1.0)).abs() > 0.9999);
    }

    #[test]
    fn test_skinning_matrices_hierarchy() {
        let skeleton = Skeleton::new(vec![
            Bone::new("root", None),
            Bone::new("child", Some(0)),
        ]);
        let mut pose = AnimationPose::with_bone_count(2);
        pose.translations[0] = Vec3::new(1.0, 0.0, 0.0);
        pose.translations[1] = Vec3::new(0.0, 2.0, 0.0);

        let palette = compose_skinning_matrices(&skeleton, &pose);
        assert_eq!(palette.len(), 2);
        // Identity inverse bind: palette is the global transform.
        assert_eq!(palette[0].w_axis.truncate(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(palette[1].w_axis.truncate(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_rest_pose_composes_to_identity_palette() {
        // inverse_bind = inverse(global bind), so composing the rest pose
        // must land every bone back on identity.
        let root_bind = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let child_bind = Mat4::from_rotation_translation(
            Quat::from_rotation_z(0.4),
            Vec3::new(0.5, 0.0, 0.0),
        );
        let skeleton = Skeleton::new(vec![
            Bone::new("root", None)
                .with_bind_transform(root_bind)
                .with_inverse_bind_matrix(root_bind.inverse()),
            Bone::new("child", Some(0))
                .with_bind_transform(child_bind)
                .with_inverse_bind_matrix((root_bind * child_bind).inverse()),
        ]);

        let palette = compose_skinning_matrices(&skeleton, &build_rest_pose(&skeleton));
        for matrix in palette {
            let diff = matrix - Mat4::IDENTITY;
            let max = diff
                .to_cols_array()
                .iter()
                .fold(0.0f32, |acc, v| acc.max(v.abs()));
            assert!(max < 1e-4, "palette entry deviates from identity: {max}");
        }
    }

    #[test]
    fn test_disconnected_bone_keeps_local() {
        // "stray" claims parent 99, which Skeleton::new demotes to a root,
        // so it is reached from itself and keeps its local matrix.
        let skeleton = Skeleton::new(vec![
            Bone::new("root", None),
            Bone::new("stray", Some(99)),
        ]);
        let mut pose = AnimationPose::with_bone_count(2);
        pose.translations[1] = Vec3::new(0.0, 0.0, 3.0);

        let palette = compose_skinning_matrices(&skeleton, &pose);
        assert_eq!(palette[1].w_axis.truncate(), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_identity_palette_never_empty() {
        assert_eq!(identity_palette(0).len(), 1);
        assert_eq!(identity_palette(7).len(), 7);
        assert_eq!(identity_palette(3)[2], Mat4::IDENTITY);
    }

    #[test]
    fn test_palette_bytes_layout() {
        let palette = vec![Mat4::IDENTITY; 2];
        let bytes = palette_bytes(&palette);
        assert_eq!(bytes.len(), 2 * 16 * 4);
    }

    proptest! {
        #[test]
        fn prop_masked_blend_stays_within_endpoints(weight in 0.0f32..1.0, mask_w in 0.0f32..1.0) {
            let mut base = AnimationPose::with_bone_count(1);
            let mut target = AnimationPose::with_bone_count(1);
            target.translations[0] = Vec3::new(10.0, 0.0, 0.0);
            let mut mask = AnimationMask::new(1);
            mask.set_weight(0, mask_w);

            blend_pose(&mut base, &target, weight, Some(&mask));
            let x = base.translations[0].x;
            prop_assert!((0.0..=10.0).contains(&x));
            prop_assert!((x - 10.0 * weight * mask_w).abs() < 1e-3);
        }
    }
}
