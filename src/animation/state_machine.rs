//! Layered animation state machine.
//!
//! Each layer owns named states (a state wraps a blend-tree root) and
//! transitions guarded by parameter conditions and/or an exit-time gate.
//! Layers are folded into one final pose in declaration order — override
//! layers blend, additive layers stack deltas — and the result is composed
//! into a skinning palette.

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::assets::{AnimationAssetCache, AssetHandle};
use crate::ecs::Time;

use super::blend_tree::{BlendNode, EvalContext};
use super::compositor::{additive_pose, blend_pose, compose_skinning_matrices};
use super::parameters::{AnimationParameter, ParameterTable};
use super::pose::{AnimationMask, AnimationPose};
use super::sampler::build_rest_pose;

// ============================================================================
// Transitions
// ============================================================================

/// How a condition compares its parameter against the reference value.
///
/// `Equals`/`NotEquals` compare in the parameter's own kind (bool vs bool,
/// int vs int, floats with an epsilon); the ordered comparisons always
/// compare as floats; `Triggered` checks and consumes a one-shot trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionComparison {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Triggered,
}

const FLOAT_COMPARE_EPSILON: f32 = 1e-4;

/// One guard on a transition. All conditions of a transition must hold.
#[derive(Clone, Debug)]
pub struct TransitionCondition {
    pub parameter: String,
    pub comparison: TransitionComparison,
    pub value: AnimationParameter,
}

impl TransitionCondition {
    /// Evaluate against the table. `Triggered` clears the trigger as a side
    /// effect of a successful check: the first declared transition to check
    /// a set trigger wins it, and at most one transition per update can
    /// consume it. That ordering is observable and intentional.
    fn evaluate(&self, params: &mut ParameterTable) -> bool {
        match self.comparison {
            TransitionComparison::Triggered => params.consume_trigger(&self.parameter),
            TransitionComparison::Equals => self.compare_equality(params),
            TransitionComparison::NotEquals => !self.compare_equality(params),
            ordered => {
                let lhs = params.get_float(&self.parameter);
                let rhs = self.value.as_float();
                match ordered {
                    TransitionComparison::GreaterThan => lhs > rhs,
                    TransitionComparison::LessThan => lhs < rhs,
                    TransitionComparison::GreaterOrEqual => lhs >= rhs,
                    TransitionComparison::LessOrEqual => lhs <= rhs,
                    _ => unreachable!(),
                }
            }
        }
    }

    fn compare_equality(&self, params: &ParameterTable) -> bool {
        match (params.get(&self.parameter), &self.value) {
            (Some(AnimationParameter::Bool(a)), AnimationParameter::Bool(b)) => a == b,
            (Some(AnimationParameter::Int(a)), AnimationParameter::Int(b)) => a == b,
            (Some(param), value) => {
                (param.as_float() - value.as_float()).abs() <= FLOAT_COMPARE_EPSILON
            }
            (None, value) => value.as_float().abs() <= FLOAT_COMPARE_EPSILON,
        }
    }
}

/// An outgoing edge of a state. Within a state, transitions are evaluated
/// in declaration order and the first match wins.
#[derive(Clone, Debug)]
pub struct AnimationTransition {
    /// Target state name.
    pub target: String,
    /// Resolved at registration; transitions with unknown targets are
    /// rejected there rather than silently ignored at evaluation time.
    target_index: usize,
    /// Minimum time-in-state before the transition may fire.
    pub exit_time: Option<f32>,
    /// Crossfade length in seconds; zero snaps immediately.
    pub fade_duration: f32,
    pub conditions: Vec<TransitionCondition>,
}

impl AnimationTransition {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            target_index: usize::MAX,
            exit_time: None,
            fade_duration: 0.0,
            conditions: Vec::new(),
        }
    }

    pub fn with_exit_time(mut self, exit_time: f32) -> Self {
        self.exit_time = Some(exit_time);
        self
    }

    pub fn with_fade(mut self, fade_duration: f32) -> Self {
        self.fade_duration = fade_duration.max(0.0);
        self
    }

    pub fn with_condition(
        mut self,
        parameter: impl Into<String>,
        comparison: TransitionComparison,
        value: AnimationParameter,
    ) -> Self {
        self.conditions.push(TransitionCondition {
            parameter: parameter.into(),
            comparison,
            value,
        });
        self
    }

    /// Guard on a set trigger (consumed when checked).
    pub fn with_trigger(self, parameter: impl Into<String>) -> Self {
        self.with_condition(
            parameter,
            TransitionComparison::Triggered,
            AnimationParameter::Trigger(true),
        )
    }

    fn conditions_hold(&self, params: &mut ParameterTable) -> bool {
        self.conditions.iter().all(|c| c.evaluate(params))
    }
}

/// A named state wrapping a blend-tree root.
#[derive(Clone, Debug)]
pub struct AnimationState {
    pub name: String,
    pub root: BlendNode,
    pub transitions: Vec<AnimationTransition>,
}

// ============================================================================
// Layers
// ============================================================================

/// An independently evaluated animation source folded into the final pose.
#[derive(Clone, Debug)]
pub struct AnimationLayer {
    pub name: String,
    /// Blend weight when folding this layer into the final pose.
    pub weight: f32,
    /// Additive layers apply their pose as a delta instead of overriding.
    pub additive: bool,
    /// Optional per-bone mask restricting this layer's influence.
    pub mask: Option<AnimationMask>,
    states: Vec<AnimationState>,
    entry_state: Option<usize>,
    current_state: Option<usize>,
    next_state: Option<usize>,
    time_in_state: f32,
    transition_elapsed: f32,
    transition_duration: f32,
}

impl AnimationLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            additive: false,
            mask: None,
            states: Vec::new(),
            entry_state: None,
            current_state: None,
            next_state: None,
            time_in_state: 0.0,
            transition_elapsed: 0.0,
            transition_duration: 0.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    pub fn with_mask(mut self, mask: AnimationMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Register a state. The first registered state becomes the entry state
    /// until [`AnimationLayer::set_entry_state`] overrides it.
    pub fn add_state(&mut self, name: impl Into<String>, root: BlendNode) -> usize {
        let name = name.into();
        if let Some(existing) = self.state_index(&name) {
            log::warn!("Layer '{}': state '{}' already exists, ignored", self.name, name);
            return existing;
        }
        let index = self.states.len();
        self.states.push(AnimationState {
            name,
            root,
            transitions: Vec::new(),
        });
        if self.entry_state.is_none() {
            self.entry_state = Some(index);
        }
        index
    }

    pub fn set_entry_state(&mut self, name: &str) -> bool {
        match self.state_index(name) {
            Some(index) => {
                self.entry_state = Some(index);
                true
            }
            None => {
                log::warn!("Layer '{}': unknown entry state '{}'", self.name, name);
                false
            }
        }
    }

    /// Register a transition out of `from`. Unknown source or target states
    /// are rejected here, with a warning, instead of silently failing at
    /// evaluation time.
    pub fn add_transition(&mut self, from: &str, mut transition: AnimationTransition) -> bool {
        let Some(target_index) = self.state_index(&transition.target) else {
            log::warn!(
                "Layer '{}': transition '{}' -> '{}' names an unknown target, rejected",
                self.name,
                from,
                transition.target
            );
            return false;
        };
        let Some(from_index) = self.state_index(from) else {
            log::warn!(
                "Layer '{}': transition from unknown state '{}', rejected",
                self.name,
                from
            );
            return false;
        };
        transition.target_index = target_index;
        self.states[from_index].transitions.push(transition);
        true
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.current_state.map(|i| self.states[i].name.as_str())
    }

    pub fn is_transitioning(&self) -> bool {
        self.next_state.is_some()
    }

    /// Rewind the layer to its entry state on the next update.
    pub fn reset(&mut self) {
        self.current_state = None;
        self.next_state = None;
        self.time_in_state = 0.0;
        self.transition_elapsed = 0.0;
        self.transition_duration = 0.0;
    }

    /// Advance cursors and produce this layer's pose. Returns `None` when
    /// the layer has no states.
    fn update(
        &mut self,
        delta_time: f32,
        cache: &AnimationAssetCache,
        skeleton_handle: AssetHandle,
        animation_handle: AssetHandle,
        params: &mut ParameterTable,
    ) -> Option<AnimationPose> {
        if self.states.is_empty() {
            return None;
        }

        // Activate the entry state on the first update.
        let current = match self.current_state {
            Some(index) => index,
            None => {
                let entry = self.entry_state.unwrap_or(0);
                self.states[entry].root.reset();
                self.current_state = Some(entry);
                self.time_in_state = 0.0;
                entry
            }
        };
        self.time_in_state += delta_time;

        if self.next_state.is_some() {
            // A crossfade is in flight; no new transitions are scanned.
            self.transition_elapsed += delta_time;
            if self.transition_duration <= 0.0 || self.transition_elapsed >= self.transition_duration
            {
                self.finish_transition();
            }
        } else if let Some((target, fade)) = self.pick_transition(current, params) {
            self.states[target].root.reset();
            if fade <= 0.0 {
                self.current_state = Some(target);
                self.time_in_state = 0.0;
            } else {
                self.next_state = Some(target);
                self.transition_elapsed = 0.0;
                self.transition_duration = fade;
            }
        }

        let current = self.current_state?;
        let ctx = EvalContext {
            cache,
            skeleton_handle,
            animation_handle,
            params,
        };
        let mut pose = self.states[current].root.evaluate(&ctx, delta_time);

        if let Some(next) = self.next_state {
            let t = (self.transition_elapsed / self.transition_duration).clamp(0.0, 1.0);
            let target_pose = if next == current {
                pose.clone()
            } else {
                self.states[next].root.evaluate(&ctx, delta_time)
            };
            blend_pose(&mut pose, &target_pose, t, None);
        }
        Some(pose)
    }

    /// Scan the current state's transitions in declaration order; the first
    /// whose exit-time gate and conditions all hold wins.
    fn pick_transition(
        &self,
        current: usize,
        params: &mut ParameterTable,
    ) -> Option<(usize, f32)> {
        for transition in &self.states[current].transitions {
            if let Some(exit_time) = transition.exit_time {
                if self.time_in_state < exit_time {
                    continue;
                }
            }
            if transition.conditions_hold(params) {
                return Some((transition.target_index, transition.fade_duration));
            }
        }
        None
    }

    fn finish_transition(&mut self) {
        if let Some(next) = self.next_state.take() {
            self.current_state = Some(next);
            // The target has already been playing for the fade length.
            self.time_in_state = self.transition_elapsed;
        }
        self.transition_elapsed = 0.0;
        self.transition_duration = 0.0;
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Owns all layers and the parameter table; emits the final pose and the
/// skinning palette consumed by the renderer.
#[derive(Component)]
pub struct AnimationStateMachine {
    pub skeleton_asset: String,
    pub animation_asset: String,
    pub parameters: ParameterTable,
    layers: Vec<AnimationLayer>,
    skeleton_handle: Option<AssetHandle>,
    animation_handle: Option<AssetHandle>,
    rest_pose: AnimationPose,
    final_pose: AnimationPose,
    skinning_matrices: Vec<Mat4>,
}

impl AnimationStateMachine {
    pub fn new(skeleton_asset: impl Into<String>, animation_asset: impl Into<String>) -> Self {
        Self {
            skeleton_asset: skeleton_asset.into(),
            animation_asset: animation_asset.into(),
            parameters: ParameterTable::new(),
            layers: Vec::new(),
            skeleton_handle: None,
            animation_handle: None,
            rest_pose: AnimationPose::default(),
            final_pose: AnimationPose::default(),
            skinning_matrices: Vec::new(),
        }
    }

    /// Append a layer; layers are folded in the order they were added.
    pub fn add_layer(&mut self, layer: AnimationLayer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn layer(&self, index: usize) -> Option<&AnimationLayer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut AnimationLayer> {
        self.layers.get_mut(index)
    }

    pub fn find_layer(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    // Parameter conveniences.
    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.parameters.set_float(name, value);
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.parameters.set_bool(name, value);
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i32) {
        self.parameters.set_int(name, value);
    }

    pub fn set_trigger(&mut self, name: impl Into<String>) {
        self.parameters.set_trigger(name);
    }

    /// Drop cached handles so the next update re-resolves them; also resets
    /// every layer (used on scene load / play-mode entry).
    pub fn invalidate_handles(&mut self) {
        self.skeleton_handle = None;
        self.animation_handle = None;
        for layer in &mut self.layers {
            layer.reset();
        }
    }

    pub fn final_pose(&self) -> &AnimationPose {
        &self.final_pose
    }

    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    /// One simulation tick. A missing skeleton makes this a no-op: the
    /// previous pose and palette stay untouched.
    pub fn update(&mut self, cache: &mut AnimationAssetCache, delta_time: f32) {
        if self.skeleton_handle.is_none() && !self.skeleton_asset.is_empty() {
            self.skeleton_handle = Some(cache.acquire(&self.skeleton_asset));
        }
        if self.animation_handle.is_none() && !self.animation_asset.is_empty() {
            self.animation_handle = if self.animation_asset == self.skeleton_asset {
                self.skeleton_handle
            } else {
                Some(cache.acquire(&self.animation_asset))
            };
        }

        let cache = &*cache;
        let skeleton_handle = self.skeleton_handle.unwrap_or(AssetHandle::INVALID);
        let animation_handle = self.animation_handle.unwrap_or(AssetHandle::INVALID);
        let Some(skeleton) = cache.skeleton(skeleton_handle) else {
            return;
        };

        // Rebuild the cached rest pose if the bound rig changed size.
        if self.rest_pose.bone_count() != skeleton.bone_count() {
            self.rest_pose = build_rest_pose(skeleton);
        }

        let mut final_pose = self.rest_pose.clone();
        for layer in &mut self.layers {
            let Some(layer_pose) = layer.update(
                delta_time,
                cache,
                skeleton_handle,
                animation_handle,
                &mut self.parameters,
            ) else {
                continue;
            };
            if layer.weight <= 0.0 {
                continue;
            }
            if layer.additive {
                additive_pose(&mut final_pose, &layer_pose, layer.weight, layer.mask.as_ref());
            } else {
                blend_pose(&mut final_pose, &layer_pose, layer.weight, layer.mask.as_ref());
            }
        }

        self.skinning_matrices = compose_skinning_matrices(skeleton, &final_pose);
        self.final_pose = final_pose;
    }
}

/// Advances every [`AnimationStateMachine`] once per tick.
pub fn state_machine_system(
    time: Res<Time>,
    mut cache: ResMut<AnimationAssetCache>,
    mut query: Query<&mut AnimationStateMachine>,
) {
    for mut machine in query.iter_mut() {
        machine.update(&mut cache, time.delta_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationClip, TransformChannel};
    use crate::animation::skeleton::{Bone, Skeleton};
    use crate::assets::MemoryAssetSource;
    use glam::Vec3;

    fn static_clip(name: &str, x: f32) -> AnimationClip {
        let mut channel = TransformChannel::new("root");
        channel.add_translation_key(0.0, Vec3::new(x, 0.0, 0.0));
        let mut clip = AnimationClip::new(name, 1.0);
        clip.add_channel(channel);
        clip
    }

    fn test_cache() -> AnimationAssetCache {
        let mut source = MemoryAssetSource::new();
        source.insert(
            "rig",
            Skeleton::new(vec![Bone::new("root", None), Bone::new("arm", Some(0))]),
            vec![
                static_clip("idle", 0.0),
                static_clip("walk", 1.0),
                static_clip("jump", 5.0),
            ],
        );
        AnimationAssetCache::new(Box::new(source))
    }

    fn single_layer_machine() -> AnimationStateMachine {
        let mut layer = AnimationLayer::new("base");
        layer.add_state("idle", BlendNode::clip(0, true));
        layer.add_state("walk", BlendNode::clip(1, true));
        layer.add_state("jump", BlendNode::clip(2, true));
        let mut machine = AnimationStateMachine::new("rig", "rig");
        machine.add_layer(layer);
        machine
    }

    fn root_x(machine: &AnimationStateMachine) -> f32 {
        machine.final_pose().translations[0].x
    }

    #[test]
    fn test_entry_state_activates() {
        let mut cache = test_cache();
        let mut machine = single_layer_machine();
        machine.update(&mut cache, 0.016);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("idle"));
        assert_eq!(machine.skinning_matrices().len(), 2);
    }

    #[test]
    fn test_condition_transition_snaps() {
        let mut cache = test_cache();
        let mut machine = single_layer_machine();
        machine
            .layer_mut(0)
            .unwrap()
            .add_transition(
                "idle",
                AnimationTransition::to("walk").with_condition(
                    "speed",
                    TransitionComparison::GreaterThan,
                    AnimationParameter::Float(0.5),
                ),
            );

        machine.update(&mut cache, 0.1);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("idle"));

        machine.set_float("speed", 1.0);
        machine.update(&mut cache, 0.1);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("walk"));
        machine.update(&mut cache, 0.1);
        assert!((root_x(&machine) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_exit_time_gates_transition() {
        let mut cache = test_cache();
        let mut machine = single_layer_machine();
        machine.layer_mut(0).unwrap().add_transition(
            "idle",
            AnimationTransition::to("walk")
                .with_exit_time(0.5)
                .with_condition(
                    "go",
                    TransitionComparison::Equals,
                    AnimationParameter::Bool(true),
                ),
        );
        machine.set_bool("go", true);

        // time_in_state: 0.2, 0.4 -> gate closed; 0.6 -> open.
        machine.update(&mut cache, 0.2);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("idle"));
        machine.update(&mut cache, 0.2);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("idle"));
        machine.update(&mut cache, 0.2);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("walk"));
    }

    #[test]
    fn test_trigger_consumed_by_first_transition_only() {
        let mut cache = test_cache();
        let mut machine = single_layer_machine();
        {
            let layer = machine.layer_mut(0).unwrap();
            layer.add_transition("idle", AnimationTransition::to("jump").with_trigger("Jump"));
            layer.add_transition("idle", AnimationTransition::to("walk").with_trigger("Jump"));
        }

        machine.set_trigger("Jump");
        machine.update(&mut cache, 0.1);
        // Declaration order decides who wins the trigger.
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("jump"));
        assert!(!machine.parameters.is_triggered("Jump"));

        // Consumed: no further transition fires.
        machine.update(&mut cache, 0.1);
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("jump"));
    }

    #[test]
    fn test_crossfade_blends_then_snaps() {
        let mut cache = test_cache();
        let mut machine = single_layer_machine();
        machine.layer_mut(0).unwrap().add_transition(
            "idle",
            AnimationTransition::to("walk")
                .with_fade(0.2)
                .with_condition(
                    "go",
                    TransitionComparison::Equals,
                    AnimationParameter::Bool(true),
                ),
        );

        machine.update(&mut cache, 0.1);
        machine.set_bool("go", true);

        // Crossfade begins this frame (elapsed 0 -> pure idle pose).
        machine.update(&mut cache, 0.1);
        assert!(machine.layer(0).unwrap().is_transitioning());

        // Halfway through the fade.
        machine.update(&mut cache, 0.1);
        assert!((root_x(&machine) - 0.5).abs() < 1e-4);

        // Fade completes and the machine settles on walk.
        machine.update(&mut cache, 0.1);
        machine.update(&mut cache, 0.1);
        assert!(!machine.layer(0).unwrap().is_transitioning());
        assert_eq!(machine.layer(0).unwrap().current_state_name(), Some("walk"));
        assert!((root_x(&machine) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_transition_target_rejected() {
        let mut machine = single_layer_machine();
        let accepted = machine
            .layer_mut(0)
            .unwrap()
            .add_transition("idle", AnimationTransition::to("no_such_state"));
        assert!(!accepted);
        assert!(machine.layer(0).unwrap().states[0].transitions.is_empty());
    }

    #[test]
    fn test_missing_skeleton_is_noop() {
        let mut cache = test_cache();
        let mut machine = AnimationStateMachine::new("missing", "missing");
        let mut layer = AnimationLayer::new("base");
        layer.add_state("idle", BlendNode::clip(0, true));
        machine.add_layer(layer);

        machine.update(&mut cache, 0.1);
        assert!(machine.skinning_matrices().is_empty());
        assert!(machine.final_pose().is_empty());
    }

    #[test]
    fn test_additive_layer_with_mask() {
        let mut cache = test_cache();
        let mut base = AnimationLayer::new("base");
        base.add_state("walk", BlendNode::clip(1, true));

        // Additive layer pushes the root a further +5, but the mask limits
        // it to bone 1, so the root must stay where the base put it.
        let mut mask = AnimationMask::new(2);
        mask.set_weight(0, 0.0);
        let mut overlay = AnimationLayer::new("overlay").additive().with_mask(mask);
        overlay.add_state("jump", BlendNode::clip(2, true));

        let mut machine = AnimationStateMachine::new("rig", "rig");
        machine.add_layer(base);
        machine.add_layer(overlay);

        machine.update(&mut cache, 0.1);
        assert!((root_x(&machine) - 1.0).abs() < 1e-4);
        // Bone 1 has no keys in either clip: rest + additive rest delta.
        assert!(machine.final_pose().translations[1].is_finite());
    }

    #[test]
    fn test_layer_weight_scales_override() {
        let mut cache = test_cache();
        let mut layer = AnimationLayer::new("base").with_weight(0.5);
        layer.add_state("walk", BlendNode::clip(1, true));
        let mut machine = AnimationStateMachine::new("rig", "rig");
        machine.add_layer(layer);

        machine.update(&mut cache, 0.1);
        // Folded over the rest pose (x = 0) at half weight.
        assert!((root_x(&machine) - 0.5).abs() < 1e-4);
    }
}
