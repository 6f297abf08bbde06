//! Animation clips, transform channels and keyframes.

use glam::{Quat, Vec3};

/// A single `(time, value)` keyframe. Channels keep their keyframes sorted
/// by time.
#[derive(Clone, Copy, Debug)]
pub struct Keyframe<T> {
    /// Time in seconds.
    pub time: f32,
    pub value: T,
}

/// Per-bone track of translation/rotation/scale keyframes inside a clip.
#[derive(Clone, Debug)]
pub struct TransformChannel {
    /// Index of the targeted skeleton bone. May be stale after a skeleton
    /// re-import; binding falls back to name lookup (see the sampler).
    pub bone_index: Option<usize>,
    /// Bone name exactly as authored in the source document.
    pub source_bone_name: String,
    pub translation_keys: Vec<Keyframe<Vec3>>,
    pub rotation_keys: Vec<Keyframe<Quat>>,
    pub scale_keys: Vec<Keyframe<Vec3>>,
}

impl TransformChannel {
    pub fn new(source_bone_name: impl Into<String>) -> Self {
        Self {
            bone_index: None,
            source_bone_name: source_bone_name.into(),
            translation_keys: Vec::new(),
            rotation_keys: Vec::new(),
            scale_keys: Vec::new(),
        }
    }

    pub fn with_bone_index(mut self, index: usize) -> Self {
        self.bone_index = Some(index);
        self
    }

    /// Insert a translation key, keeping the track sorted by time.
    pub fn add_translation_key(&mut self, time: f32, value: Vec3) {
        insert_sorted(&mut self.translation_keys, time, value);
    }

    /// Insert a rotation key, keeping the track sorted by time.
    pub fn add_rotation_key(&mut self, time: f32, value: Quat) {
        insert_sorted(&mut self.rotation_keys, time, value);
    }

    /// Insert a scale key, keeping the track sorted by time.
    pub fn add_scale_key(&mut self, time: f32, value: Vec3) {
        insert_sorted(&mut self.scale_keys, time, value);
    }

    pub fn is_empty(&self) -> bool {
        self.translation_keys.is_empty()
            && self.rotation_keys.is_empty()
            && self.scale_keys.is_empty()
    }
}

fn insert_sorted<T>(keys: &mut Vec<Keyframe<T>>, time: f32, value: T) {
    let index = keys
        .binary_search_by(|k| k.time.total_cmp(&time))
        .unwrap_or_else(|i| i);
    keys.insert(index, Keyframe { time, value });
}

/// An immutable animation clip: a named set of transform channels.
#[derive(Clone, Debug, Default)]
pub struct AnimationClip {
    pub name: String,
    /// Duration in seconds.
    pub duration_seconds: f32,
    /// Authoring-tool tick rate, retained for diagnostics only.
    pub ticks_per_second: f32,
    pub channels: Vec<TransformChannel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration_seconds: f32) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            ticks_per_second: 0.0,
            channels: Vec::new(),
        }
    }

    pub fn add_channel(&mut self, channel: TransformChannel) {
        self.channels.push(channel);
    }
}

/// Wrap or clamp a clip-local time given the clip duration and loop flag.
///
/// Returns the adjusted time and whether a non-looping clip has finished.
/// The modulo wrap corrects negative results so reverse playback loops
/// correctly. This is the single implementation shared by the clip node and
/// the single-clip player so the two cannot drift apart.
pub fn wrap_clip_time(time: f32, duration: f32, looping: bool) -> (f32, bool) {
    if duration <= 0.0 {
        return (0.0, !looping);
    }
    if looping {
        let mut wrapped = time % duration;
        if wrapped < 0.0 {
            wrapped += duration;
        }
        // A tiny negative remainder can round back up to `duration`.
        if wrapped >= duration {
            wrapped = 0.0;
        }
        (wrapped, false)
    } else if time >= duration {
        (duration, true)
    } else {
        (time.max(0.0), false)
    }
}
