//! Bone-name canonicalisation.
//!
//! Different authoring pipelines emit different bone-name conventions for
//! topologically identical rigs (`mixamorig:Hips`, `rig:hips`,
//! `Armature|Hips`, ...). Without canonicalisation, channel-to-bone binding
//! silently fails. Each asset can be assigned a named [`NameProfile`]; assets
//! without an assignment use the default profile.

use std::collections::HashMap;

/// Describes how authored bone names are normalised into canonical names.
#[derive(Clone, Debug)]
pub struct NameProfile {
    /// Known namespace prefixes, matched case-insensitively and stripped
    /// before anything else (longest-match-first is not needed; the first
    /// hit wins).
    pub strip_prefixes: Vec<String>,
    /// Drop everything up to and including the last `:` or `|` separator.
    pub split_namespace: bool,
    /// Fold the result to lower-case.
    pub lowercase: bool,
}

impl Default for NameProfile {
    fn default() -> Self {
        Self {
            strip_prefixes: vec![
                "mixamorig:".to_string(),
                "rig:".to_string(),
                "armature|".to_string(),
            ],
            split_namespace: true,
            lowercase: true,
        }
    }
}

impl NameProfile {
    /// Normalise a raw authored bone name with this profile.
    pub fn apply(&self, raw: &str) -> String {
        let mut name = raw.trim();

        let lower = name.to_ascii_lowercase();
        for prefix in &self.strip_prefixes {
            // Prefixes are matched case-insensitively however they were
            // registered; ASCII folding keeps byte lengths equal.
            if lower.starts_with(&prefix.to_ascii_lowercase()) {
                name = &name[prefix.len()..];
                break;
            }
        }

        if self.split_namespace {
            if let Some(pos) = name.rfind([':', '|']) {
                name = &name[pos + 1..];
            }
        }

        let name = name.trim();
        if self.lowercase {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }
}

/// Registry of name profiles, per-asset assignments and aliases.
///
/// Aliases are stored pre-canonicalised so resolution is a single map
/// lookup after the profile has been applied.
#[derive(Debug, Default)]
pub struct BoneNameRegistry {
    default_profile: NameProfile,
    profiles: HashMap<String, NameProfile>,
    /// asset id -> profile name
    assignments: HashMap<String, String>,
    /// canonical -> canonical
    aliases: HashMap<String, String>,
}

impl BoneNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named profile that tooling can assign to asset ids.
    pub fn register_profile(&mut self, name: impl Into<String>, profile: NameProfile) {
        self.profiles.insert(name.into(), profile);
    }

    /// Assign a registered profile to an asset id. Returns `false` (and
    /// logs) when the profile is unknown.
    pub fn assign_profile(&mut self, asset_id: impl Into<String>, profile_name: &str) -> bool {
        if !self.profiles.contains_key(profile_name) {
            log::warn!("Unknown bone-name profile '{}', assignment ignored", profile_name);
            return false;
        }
        self.assignments
            .insert(asset_id.into(), profile_name.to_string());
        true
    }

    /// Register an alias between two authored names. Both sides are
    /// canonicalised with the default profile before being stored.
    pub fn add_alias(&mut self, from: &str, to: &str) {
        let from = self.default_profile.apply(from);
        let to = self.default_profile.apply(to);
        self.aliases.insert(from, to);
    }

    fn profile_for(&self, asset_id: &str) -> &NameProfile {
        self.assignments
            .get(asset_id)
            .and_then(|name| self.profiles.get(name))
            .unwrap_or(&self.default_profile)
    }

    /// Normalise a raw bone name using the profile assigned to `asset_id`
    /// (default profile if none), then resolve aliases.
    pub fn normalize(&self, raw: &str, asset_id: &str) -> String {
        let canonical = self.profile_for(asset_id).apply(raw);
        match self.aliases.get(&canonical) {
            Some(target) => target.clone(),
            None => canonical,
        }
    }
}

/// Canonicalise a bone name with the default profile, outside any registry.
/// Used as the last-resort lookup when binding channels to a skeleton.
pub fn canonical_bone_name(raw: &str) -> String {
    NameProfile::default().apply(raw)
}
