//! ECS glue: shared resources consumed by the animation systems.
//!
//! The runtime itself is plain synchronous code; the types here only exist
//! so the per-frame entry points can be scheduled as `bevy_ecs` systems.

use bevy_ecs::prelude::*;

/// Frame timing resource, updated once per tick by the host application.
#[derive(Resource)]
pub struct Time {
    /// Seconds elapsed since the previous update.
    pub delta_seconds: f32,
    /// Total seconds since startup.
    pub elapsed_seconds: f64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            delta_seconds: 0.0,
            elapsed_seconds: 0.0,
        }
    }
}

impl Time {
    /// Advance the clock by one frame.
    pub fn advance(&mut self, delta_seconds: f32) {
        self.delta_seconds = delta_seconds;
        self.elapsed_seconds += delta_seconds as f64;
    }
}
