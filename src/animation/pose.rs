//! Poses and per-bone masks, the common currency between every component of
//! the runtime.

use glam::{Quat, Vec3};

use super::skeleton::Skeleton;

/// A snapshot of every bone's local translation/rotation/scale at one
/// instant, stored as three parallel arrays in skeleton bone order.
///
/// The three arrays always have equal length; that length matches the
/// skeleton the pose was sampled against whenever poses are compared or
/// blended.
#[derive(Clone, Debug, Default)]
pub struct AnimationPose {
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl AnimationPose {
    /// An identity pose (zero translation, identity rotation, unit scale)
    /// for `bone_count` bones.
    pub fn with_bone_count(bone_count: usize) -> Self {
        Self {
            translations: vec![Vec3::ZERO; bone_count],
            rotations: vec![Quat::IDENTITY; bone_count],
            scales: vec![Vec3::ONE; bone_count],
        }
    }

    pub fn bone_count(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    /// Overwrite one bone's transform. Out-of-range indices are ignored.
    pub fn set_bone(&mut self, index: usize, translation: Vec3, rotation: Quat, scale: Vec3) {
        if index < self.bone_count() {
            self.translations[index] = translation;
            self.rotations[index] = rotation;
            self.scales[index] = scale;
        }
    }
}

/// One weight per bone, restricting a layer's influence to a bone subset
/// (e.g. upper body only). Bones outside the stored range weigh 1.0.
#[derive(Clone, Debug, Default)]
pub struct AnimationMask {
    weights: Vec<f32>,
}

impl AnimationMask {
    /// A mask covering `bone_count` bones, all at full weight.
    pub fn new(bone_count: usize) -> Self {
        Self {
            weights: vec![1.0; bone_count],
        }
    }

    pub fn from_weights(weights: Vec<f32>) -> Self {
        Self { weights }
    }

    pub fn weight(&self, bone_index: usize) -> f32 {
        self.weights.get(bone_index).copied().unwrap_or(1.0)
    }

    /// Set one bone's weight, growing the mask (at full weight) as needed.
    pub fn set_weight(&mut self, bone_index: usize, weight: f32) {
        if bone_index >= self.weights.len() {
            self.weights.resize(bone_index + 1, 1.0);
        }
        self.weights[bone_index] = weight.clamp(0.0, 1.0);
    }

    /// Set the weight of a bone and its whole subtree, using an explicit
    /// worklist so stack depth stays bounded regardless of skeleton depth.
    pub fn set_subtree(&mut self, skeleton: &Skeleton, root_index: usize, weight: f32) {
        let mut worklist = vec![root_index];
        while let Some(index) = worklist.pop() {
            let Some(bone) = skeleton.bone(index) else {
                continue;
            };
            self.set_weight(index, weight);
            worklist.extend(bone.children_indices.iter().copied());
        }
    }
}

/// Normalise a quaternion, substituting identity for degenerate
/// (zero-length or non-finite) input so NaN never propagates into a pose.
pub(crate) fn normalize_or_identity(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if len_sq.is_finite() && len_sq > 1e-12 {
        q / len_sq.sqrt()
    } else {
        Quat::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::skeleton::Bone;

    #[test]
    fn test_normalize_or_identity_degenerate() {
        assert_eq!(
            normalize_or_identity(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)),
            Quat::IDENTITY
        );
        let q = normalize_or_identity(Quat::from_xyzw(0.0, 0.0, 0.0, 2.0));
        assert!((q.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identity_pose() {
        let pose = AnimationPose::with_bone_count(3);
        assert_eq!(pose.bone_count(), 3);
        assert_eq!(pose.translations[1], Vec3::ZERO);
        assert_eq!(pose.rotations[1], Quat::IDENTITY);
        assert_eq!(pose.scales[1], Vec3::ONE);
    }

    #[test]
    fn test_mask_defaults_to_full_weight() {
        let mask = AnimationMask::new(2);
        assert_eq!(mask.weight(0), 1.0);
        // Out of range reads as 1.0 rather than masking the bone out.
        assert_eq!(mask.weight(10), 1.0);
    }

    #[test]
    fn test_mask_set_subtree() {
        let skeleton = Skeleton::new(vec![
            Bone::new("root", None),
            Bone::new("spine", Some(0)),
            Bone::new("head", Some(1)),
            Bone::new("leg", Some(0)),
        ]);
        let mut mask = AnimationMask::new(4);
        mask.set_subtree(&skeleton, 1, 0.0);

        assert_eq!(mask.weight(0), 1.0);
        assert_eq!(mask.weight(1), 0.0);
        assert_eq!(mask.weight(2), 0.0);
        assert_eq!(mask.weight(3), 1.0);
    }
}
