//! Named parameters driving blend trees and state-machine transitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A tagged parameter value. A trigger is a one-shot boolean that is
/// cleared once a satisfied transition condition consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnimationParameter {
    Float(f32),
    Bool(bool),
    Int(i32),
    Trigger(bool),
}

impl AnimationParameter {
    /// Every kind viewed as a float; used by the ordered comparisons.
    pub fn as_float(&self) -> f32 {
        match *self {
            AnimationParameter::Float(v) => v,
            AnimationParameter::Bool(v) | AnimationParameter::Trigger(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            AnimationParameter::Int(v) => v as f32,
        }
    }
}

/// Parameter table owned by a state-machine instance, keyed by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterTable {
    values: HashMap<String, AnimationParameter>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.values
            .insert(name.into(), AnimationParameter::Float(value));
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.values
            .insert(name.into(), AnimationParameter::Bool(value));
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i32) {
        self.values
            .insert(name.into(), AnimationParameter::Int(value));
    }

    /// Arm a one-shot trigger.
    pub fn set_trigger(&mut self, name: impl Into<String>) {
        self.values
            .insert(name.into(), AnimationParameter::Trigger(true));
    }

    /// Disarm a trigger without consuming it through a transition.
    pub fn reset_trigger(&mut self, name: &str) {
        if let Some(AnimationParameter::Trigger(set)) = self.values.get_mut(name) {
            *set = false;
        }
    }

    pub fn get(&self, name: &str) -> Option<&AnimationParameter> {
        self.values.get(name)
    }

    /// Float view of a parameter; missing parameters read as 0.0.
    pub fn get_float(&self, name: &str) -> f32 {
        self.values.get(name).map_or(0.0, |p| p.as_float())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        matches!(
            self.values.get(name),
            Some(AnimationParameter::Bool(true) | AnimationParameter::Trigger(true))
        )
    }

    pub fn is_triggered(&self, name: &str) -> bool {
        matches!(
            self.values.get(name),
            Some(AnimationParameter::Trigger(true))
        )
    }

    /// Consume a trigger: returns whether it was set, clearing it either
    /// way. Only trigger-kind parameters can be consumed.
    pub fn consume_trigger(&mut self, name: &str) -> bool {
        match self.values.get_mut(name) {
            Some(AnimationParameter::Trigger(set)) => std::mem::replace(set, false),
            _ => false,
        }
    }
}
