//! # Animation Engine
//!
//! A skeletal animation runtime: clip sampling, pose blending, blend trees,
//! and a layered state machine, emitting skinning matrix palettes ready for
//! GPU upload.
//!
//! ## Features
//!
//! - **Asset Cache**: Handle-based access to skeletons and clip libraries, no
//!   string lookups or I/O on the hot path
//! - **Bone-Name Canonicalisation**: Per-asset naming profiles and aliases so
//!   clips from different authoring tools bind to the same rig
//! - **Pose Pipeline**: Rest-pose construction, keyframe sampling, masked
//!   override/additive blending, hierarchical skinning-matrix composition
//! - **Blend Trees**: Clip, two-way blend, and 1-D blend-space nodes driven
//!   by named parameters
//! - **Players**: A single-clip player and a layered state machine with
//!   crossfades, exit times, and trigger conditions
//! - **Robustness**: Missing assets, unresolvable channels, and degenerate
//!   math degrade to rest pose or identity palettes, never panics
//!
//! ## Architecture Design
//!
//! This crate follows the **Anemic Domain Model** pattern:
//! - **Component/Resource**: Pure data structures ([`animation::AnimationPlayer`],
//!   [`assets::AnimationAssetCache`])
//! - **Service**: Business logic encapsulation with static methods
//!   ([`animation::AnimationPlayerService`])
//! - **System**: ECS systems for orchestration and scheduling
//!
//! ### Example
//!
//! ```ignore
//! use animation_engine::animation::{AnimationPlayer, AnimationPlayerService};
//!
//! fn start_walking(player: &mut AnimationPlayer) {
//!     AnimationPlayerService::play(player, "walk");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Error types shared across the runtime
//! - [`ecs`]: Frame timing resource for the per-tick systems
//! - [`assets`]: Asset cache and bone-name canonicalisation
//! - [`animation`]: Skeletons, clips, poses, blend trees, players
//! - [`scene`]: Persisted animator records for scene save/load

/// Error types shared across the runtime
pub mod core;
/// Frame timing resource for the per-tick systems
pub mod ecs;
/// Asset cache and bone-name canonicalisation
pub mod assets;
/// Skeletons, clips, poses, blend trees, players
pub mod animation;
/// Persisted animator records for scene save/load
pub mod scene;
