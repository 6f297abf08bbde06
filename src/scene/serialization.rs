//! Persisted animator state.
//!
//! The scene serializer stores an [`AnimatorRecord`] per animated entity as
//! plain text tokens: three quoted strings (skeleton asset, animation
//! asset, clip name), time, speed, the playing and looping flags, and a
//! bone count. A bone count above zero is followed by `bone_count * 16`
//! floats, the column-major values of each bone's last-known skinning
//! matrix in bone order, so a loaded scene can show the last pose before
//! the first animation tick.
//!
//! Asset handles are per-process and never persisted; applying a record
//! invalidates them so the next update re-resolves lazily.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::animation::player::AnimationPlayer;
use crate::core::AnimationError;

/// Snapshot of one [`AnimationPlayer`], ready for scene save/load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatorRecord {
    pub skeleton_asset: String,
    pub animation_asset: String,
    pub clip_name: String,
    pub current_time: f32,
    pub speed: f32,
    pub playing: bool,
    pub looping: bool,
    /// Last-known skinning palette, one matrix per bone.
    pub skinning_matrices: Vec<Mat4>,
}

impl AnimatorRecord {
    /// Snapshot a player's persistable fields (handles excluded).
    pub fn capture(player: &AnimationPlayer) -> Self {
        Self {
            skeleton_asset: player.skeleton_asset.clone(),
            animation_asset: player.animation_asset.clone(),
            clip_name: player.clip_name.clone(),
            current_time: player.current_time,
            speed: player.speed,
            playing: player.playing,
            looping: player.looping,
            skinning_matrices: player.skinning_matrices.clone(),
        }
    }

    /// Restore a player from this record. Cached handles are invalidated so
    /// the next update re-acquires assets in the new process.
    pub fn apply(&self, player: &mut AnimationPlayer) {
        player.skeleton_asset = self.skeleton_asset.clone();
        player.animation_asset = self.animation_asset.clone();
        player.clip_name = self.clip_name.clone();
        player.current_time = self.current_time;
        player.speed = self.speed;
        player.playing = self.playing;
        player.looping = self.looping;
        player.skinning_matrices = self.skinning_matrices.clone();
        player.invalidate_handles();
    }

    /// Render the text-token form.
    pub fn to_record_string(&self) -> String {
        let mut out = String::new();
        push_quoted(&mut out, &self.skeleton_asset);
        out.push(' ');
        push_quoted(&mut out, &self.animation_asset);
        out.push(' ');
        push_quoted(&mut out, &self.clip_name);
        out.push_str(&format!(
            " {} {} {} {} {}",
            self.current_time,
            self.speed,
            self.playing,
            self.looping,
            self.skinning_matrices.len()
        ));
        if !self.skinning_matrices.is_empty() {
            out.push('\n');
            let mut first = true;
            for matrix in &self.skinning_matrices {
                for value in matrix.to_cols_array() {
                    if !first {
                        out.push(' ');
                    }
                    out.push_str(&value.to_string());
                    first = false;
                }
            }
        }
        out
    }

    /// Parse the text-token form.
    pub fn from_record_str(input: &str) -> Result<Self, AnimationError> {
        let mut tokens = Tokenizer::new(input);
        let skeleton_asset = tokens.quoted("skeleton asset id")?;
        let animation_asset = tokens.quoted("animation asset id")?;
        let clip_name = tokens.quoted("clip name")?;
        let current_time = tokens.float("current time")?;
        let speed = tokens.float("speed")?;
        let playing = tokens.bool("playing flag")?;
        let looping = tokens.bool("looping flag")?;
        let bone_count = tokens.usize("bone count")?;

        // The count is untrusted input; never preallocate from it. A
        // corrupt record claiming a huge count runs out of tokens on the
        // first missing float instead of attempting the allocation.
        let mut skinning_matrices = Vec::new();
        for bone in 0..bone_count {
            let mut cols = [0.0f32; 16];
            for (i, slot) in cols.iter_mut().enumerate() {
                *slot = tokens.float(&format!("matrix value {i} of bone {bone}"))?;
            }
            skinning_matrices.push(Mat4::from_cols_array(&cols));
        }

        Ok(Self {
            skeleton_asset,
            animation_asset,
            clip_name,
            current_time,
            speed,
            playing,
            looping,
            skinning_matrices,
        })
    }
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Whitespace-separated token reader; quoted strings may span any token
/// boundary and support `\"` / `\\` escapes.
struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn malformed(what: &str, detail: impl Into<String>) -> AnimationError {
        AnimationError::MalformedRecord(format!("{what}: {}", detail.into()))
    }

    fn quoted(&mut self, what: &str) -> Result<String, AnimationError> {
        self.rest = self.rest.trim_start();
        let mut chars = self.rest.char_indices();
        match chars.next() {
            Some((_, '"')) => {}
            Some((_, other)) => {
                return Err(Self::malformed(what, format!("expected '\"', found {other:?}")))
            }
            None => return Err(Self::malformed(what, "unexpected end of record")),
        }

        let mut value = String::new();
        let mut escaped = false;
        for (index, c) in chars {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                self.rest = &self.rest[index + 1..];
                return Ok(value);
            } else {
                value.push(c);
            }
        }
        Err(Self::malformed(what, "unterminated quoted string"))
    }

    fn word(&mut self, what: &str) -> Result<&'a str, AnimationError> {
        self.rest = self.rest.trim_start();
        if self.rest.is_empty() {
            return Err(Self::malformed(what, "unexpected end of record"));
        }
        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(word)
    }

    fn float(&mut self, what: &str) -> Result<f32, AnimationError> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| Self::malformed(what, format!("not a float: {word:?}")))
    }

    fn bool(&mut self, what: &str) -> Result<bool, AnimationError> {
        match self.word(what)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Self::malformed(what, format!("not a bool: {other:?}"))),
        }
    }

    fn usize(&mut self, what: &str) -> Result<usize, AnimationError> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| Self::malformed(what, format!("not a count: {word:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample_record() -> AnimatorRecord {
        AnimatorRecord {
            skeleton_asset: "models/hero.gltf".into(),
            animation_asset: "models/hero.gltf".into(),
            clip_name: "walk cycle".into(),
            current_time: 0.75,
            speed: 1.5,
            playing: true,
            looping: true,
            skinning_matrices: vec![
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            ],
        }
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();
        let text = record.to_record_string();
        let parsed = AnimatorRecord::from_record_str(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_layout() {
        let text = sample_record().to_record_string();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\"models/hero.gltf\" \"models/hero.gltf\" \"walk cycle\" 0.75 1.5 true true 2"
        );
        // 2 bones * 16 column-major floats on the second line.
        assert_eq!(lines.next().unwrap().split_whitespace().count(), 32);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_zero_bones_omits_matrix_line() {
        let record = AnimatorRecord {
            clip_name: "idle".into(),
            ..Default::default()
        };
        let text = record.to_record_string();
        assert_eq!(text.lines().count(), 1);
        let parsed = AnimatorRecord::from_record_str(&text).unwrap();
        assert!(parsed.skinning_matrices.is_empty());
    }

    #[test]
    fn test_quotes_in_ids_are_escaped() {
        let record = AnimatorRecord {
            skeleton_asset: "weird\"name".into(),
            ..Default::default()
        };
        let parsed = AnimatorRecord::from_record_str(&record.to_record_string()).unwrap();
        assert_eq!(parsed.skeleton_asset, "weird\"name");
    }

    #[test]
    fn test_malformed_records_are_rejected() {
        for bad in [
            "",
            "\"a\" \"b\"",
            "\"a\" \"b\" \"c\" x 1 true false 0",
            "\"a\" \"b\" \"c\" 0 1 maybe false 0",
            "\"a\" \"b\" \"c\" 0 1 true false 1\n1 0 0",
            // Hostile bone count with no matrix data behind it.
            "\"a\" \"b\" \"c\" 0 1 true false 288230376151711744",
            "\"unterminated",
        ] {
            assert!(
                matches!(
                    AnimatorRecord::from_record_str(bad),
                    Err(AnimationError::MalformedRecord(_))
                ),
                "accepted malformed record: {bad:?}"
            );
        }
    }

    #[test]
    fn test_apply_invalidates_handles() {
        let mut player = AnimationPlayer::new("old", "old", "old");
        player.clip_index = Some(3);
        sample_record().apply(&mut player);

        assert_eq!(player.skeleton_asset, "models/hero.gltf");
        assert_eq!(player.current_time, 0.75);
        assert!(player.clip_index.is_none());
        assert!(player.skeleton_handle.is_none());
        assert_eq!(player.skinning_matrices.len(), 2);
    }

    #[test]
    fn test_capture_excludes_handles() {
        let player = AnimationPlayer::new("hero", "hero", "walk");
        let record = AnimatorRecord::capture(&player);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("handle"));
    }
}
