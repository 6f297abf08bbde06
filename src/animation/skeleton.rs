//! Skeleton data structures.
//!
//! A [`Skeleton`] is created once by an external loader and is read-only
//! inside the runtime. Parent indices of non-root bones always refer to a
//! valid bone in the same array and the hierarchy contains no cycles; the
//! loader is responsible for upholding this.

use std::collections::HashMap;

use glam::Mat4;

use crate::assets::names::BoneNameRegistry;

// ============================================================================
// Bone
// ============================================================================

/// One joint in the skeleton hierarchy.
#[derive(Clone, Debug)]
pub struct Bone {
    /// Canonical name, rewritten from `source_name` when the owning asset is
    /// acquired through the cache.
    pub name: String,
    /// Name exactly as authored in the source document.
    pub source_name: String,
    /// Parent bone index (`None` for a root bone).
    pub parent_index: Option<usize>,
    /// Child bone indices.
    pub children_indices: Vec<usize>,
    /// Bind transform relative to the parent bone.
    pub local_bind_transform: Mat4,
    /// Maps vertices from model space into this bone's space.
    pub inverse_bind_matrix: Mat4,
}

impl Bone {
    pub fn new(source_name: impl Into<String>, parent_index: Option<usize>) -> Self {
        let source_name = source_name.into();
        Self {
            name: source_name.clone(),
            source_name,
            parent_index,
            children_indices: Vec::new(),
            local_bind_transform: Mat4::IDENTITY,
            inverse_bind_matrix: Mat4::IDENTITY,
        }
    }

    pub fn with_bind_transform(mut self, local_bind_transform: Mat4) -> Self {
        self.local_bind_transform = local_bind_transform;
        self
    }

    pub fn with_inverse_bind_matrix(mut self, inverse_bind_matrix: Mat4) -> Self {
        self.inverse_bind_matrix = inverse_bind_matrix;
        self
    }
}

// ============================================================================
// Skeleton
// ============================================================================

/// An ordered bone array with name lookup maps.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    /// First parentless bone, if any.
    root_bone_index: Option<usize>,
    /// Canonical name -> index.
    name_to_index: HashMap<String, usize>,
    /// Authored source name -> index.
    source_name_to_index: HashMap<String, usize>,
}

impl Skeleton {
    /// Build a skeleton from loader-provided bones. Child index lists are
    /// derived from the parent indices; out-of-range parents are treated as
    /// roots rather than trusted.
    pub fn new(mut bones: Vec<Bone>) -> Self {
        for bone in &mut bones {
            bone.children_indices.clear();
        }
        let count = bones.len();
        for i in 0..count {
            match bones[i].parent_index {
                Some(p) if p < count && p != i => bones[p].children_indices.push(i),
                Some(_) => bones[i].parent_index = None,
                None => {}
            }
        }

        let root_bone_index = bones.iter().position(|b| b.parent_index.is_none());
        let mut skeleton = Self {
            bones,
            root_bone_index,
            name_to_index: HashMap::new(),
            source_name_to_index: HashMap::new(),
        };
        skeleton.rebuild_name_maps();
        skeleton
    }

    fn rebuild_name_maps(&mut self) {
        self.name_to_index = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        self.source_name_to_index = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.source_name.clone(), i))
            .collect();
    }

    /// Rewrite every bone's canonical name through the registry profile
    /// assigned to `asset_id` and rebuild the lookup maps. Called once by
    /// the asset cache when the skeleton is acquired.
    pub fn canonicalize_names(&mut self, registry: &BoneNameRegistry, asset_id: &str) {
        for bone in &mut self.bones {
            bone.name = registry.normalize(&bone.source_name, asset_id);
        }
        self.rebuild_name_maps();
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Canonical-name lookup.
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Authored-name lookup.
    pub fn bone_index_by_source(&self, source_name: &str) -> Option<usize> {
        self.source_name_to_index.get(source_name).copied()
    }

    pub fn root_bone_index(&self) -> Option<usize> {
        self.root_bone_index
    }

    /// All parentless bones. Heterogeneous rigs occasionally carry several
    /// disconnected roots; hierarchy traversal starts from every one.
    pub fn roots(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent_index.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}
