//! Skeletal animation runtime.
//!
//! The data flow is a pipeline: a [`skeleton::Skeleton`] plus
//! [`clip::AnimationClip`]s come out of the asset cache, the
//! [`sampler`] turns clip + time into an [`pose::AnimationPose`], the
//! [`compositor`] blends poses and composes the skinning palette, and two
//! drivers sit on top — the single-clip [`player`] and the layered
//! [`state_machine`].

pub mod blend_tree;
pub mod clip;
pub mod compositor;
pub mod parameters;
pub mod player;
pub mod pose;
pub mod sampler;
pub mod service;
pub mod skeleton;
pub mod state_machine;

pub use blend_tree::{BlendNode, EvalContext};
pub use clip::{wrap_clip_time, AnimationClip, Keyframe, TransformChannel};
pub use compositor::{
    additive_pose, blend_pose, compose_skinning_matrices, identity_palette, palette_bytes,
};
pub use parameters::{AnimationParameter, ParameterTable};
pub use player::{animation_player_system, AnimationPlayer};
pub use pose::{AnimationMask, AnimationPose};
pub use sampler::{build_rest_pose, sample_clip_pose, sample_clip_pose_into};
pub use service::AnimationPlayerService;
pub use skeleton::{Bone, Skeleton};
pub use state_machine::{
    state_machine_system, AnimationLayer, AnimationState, AnimationStateMachine,
    AnimationTransition, TransitionComparison, TransitionCondition,
};
