//! Input-binding override documents and their persistence.
//!
//! The document shape matches what input systems export as "binding
//! overrides": a flat list of `{action, id, path, interactions, processors}`
//! entries, where `path` is the control the binding was rebound to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::GameDataType;
use crate::store::SecureStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOverride {
    pub action: String,
    pub id: String,
    pub path: String,
    pub interactions: String,
    pub processors: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOverrides {
    pub bindings: Vec<BindingOverride>,
}

/// One control path claimed by several bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConflict {
    pub path: String,
    pub bindings: Vec<BindingOverride>,
}

impl BindingOverrides {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BindingOverride> {
        self.bindings.iter().find(|binding| binding.id == id)
    }

    pub fn set_override(&mut self, action: &str, id: &str, path: &str) {
        match self.bindings.iter_mut().find(|binding| binding.id == id) {
            Some(existing) => {
                existing.action = action.to_string();
                existing.path = path.to_string();
            }
            None => self.bindings.push(BindingOverride {
                action: action.to_string(),
                id: id.to_string(),
                path: path.to_string(),
                ..BindingOverride::default()
            }),
        }
    }

    pub fn remove_override(&mut self, id: &str) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.id != id);
        self.bindings.len() != before
    }

    /// The first other binding already on `new_path`, skipping binding `id`
    /// itself.
    pub fn conflict_for(&self, id: &str, new_path: &str) -> Option<&BindingOverride> {
        if new_path.is_empty() {
            return None;
        }
        self.bindings
            .iter()
            .find(|binding| binding.id != id && binding.path == new_path)
    }

    /// Applies the rebind unless another binding already uses the path.
    pub fn try_rebind(
        &mut self,
        action: &str,
        id: &str,
        new_path: &str,
    ) -> Result<(), BindingOverride> {
        if let Some(conflict) = self.conflict_for(id, new_path) {
            warn!(
                path = %new_path,
                bound_action = %conflict.action,
                requested_action = %action,
                "binding_duplicate_rejected"
            );
            return Err(conflict.clone());
        }
        self.set_override(action, id, new_path);
        Ok(())
    }

    /// Paths bound more than once, sorted by path.
    pub fn duplicates(&self) -> Vec<BindingConflict> {
        let mut by_path = BTreeMap::<&str, Vec<&BindingOverride>>::new();
        for binding in &self.bindings {
            if binding.path.is_empty() {
                continue;
            }
            by_path.entry(binding.path.as_str()).or_default().push(binding);
        }

        by_path
            .into_iter()
            .filter(|(_, bindings)| bindings.len() > 1)
            .map(|(path, bindings)| BindingConflict {
                path: path.to_string(),
                bindings: bindings.into_iter().cloned().collect(),
            })
            .collect()
    }
}

/// Persists overrides under [`GameDataType::InputKeyBindings`].
#[derive(Debug, Clone, Copy)]
pub struct BindingOverrideStore<'a> {
    store: &'a SecureStore,
    encrypt: bool,
}

impl<'a> BindingOverrideStore<'a> {
    pub fn new(store: &'a SecureStore, encrypt: bool) -> Self {
        Self { store, encrypt }
    }

    pub fn save(&self, overrides: &BindingOverrides) -> bool {
        let saved = self
            .store
            .save_typed(GameDataType::InputKeyBindings.key(), overrides, self.encrypt);
        if saved {
            info!(
                binding_count = overrides.bindings.len(),
                "binding_overrides_saved"
            );
        }
        saved
    }

    /// Empty overrides when nothing valid is stored.
    pub fn load(&self) -> (BindingOverrides, bool) {
        self.store
            .load_typed::<BindingOverrides>(GameDataType::InputKeyBindings.key())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::StoreConfig;

    const EXPORTED: &str = r#"{"bindings":[
        {"action":"Player/Jump","id":"jump-0","path":"<Keyboard>/j","interactions":"","processors":""},
        {"action":"Player/Fire","id":"fire-0","path":"<Mouse>/leftButton","interactions":"","processors":""},
        {"action":"Player/Move","id":"move-up","path":"<Keyboard>/i","interactions":"","processors":""}
    ]}"#;

    fn exported() -> BindingOverrides {
        BindingOverrides::from_json(EXPORTED).expect("parse")
    }

    #[test]
    fn parses_exported_overrides_and_tolerates_missing_fields() {
        assert_eq!(exported().bindings.len(), 3);
        let sparse = BindingOverrides::from_json(
            r#"{"bindings":[{"action":"UI/Submit","id":"s","path":"<Keyboard>/enter"}]}"#,
        )
        .expect("sparse");
        assert_eq!(sparse.bindings[0].interactions, "");
        assert!(BindingOverrides::from_json("{}").expect("empty").is_empty());
    }

    #[test]
    fn set_override_replaces_by_id() {
        let mut overrides = exported();
        overrides.set_override("Player/Jump", "jump-0", "<Keyboard>/space");
        overrides.set_override("Player/Crouch", "crouch-0", "<Keyboard>/c");
        assert_eq!(overrides.bindings.len(), 4);
        assert_eq!(
            overrides.get("jump-0").map(|b| b.path.as_str()),
            Some("<Keyboard>/space")
        );
    }

    #[test]
    fn remove_override_reports_whether_anything_changed() {
        let mut overrides = exported();
        assert!(overrides.remove_override("fire-0"));
        assert!(!overrides.remove_override("fire-0"));
        assert_eq!(overrides.bindings.len(), 2);
    }

    #[test]
    fn conflict_skips_the_binding_being_rebound() {
        let overrides = exported();
        assert!(overrides.conflict_for("jump-0", "<Keyboard>/j").is_none());
        assert_eq!(
            overrides
                .conflict_for("fire-0", "<Keyboard>/j")
                .map(|b| b.action.as_str()),
            Some("Player/Jump")
        );
        assert!(overrides.conflict_for("fire-0", "").is_none());
    }

    #[test]
    fn try_rebind_rejects_duplicates_and_leaves_document_untouched() {
        let mut overrides = exported();
        let before = overrides.clone();
        let conflict = overrides
            .try_rebind("Player/Fire", "fire-0", "<Keyboard>/i")
            .expect_err("duplicate");
        assert_eq!(conflict.id, "move-up");
        assert_eq!(overrides, before);

        overrides
            .try_rebind("Player/Fire", "fire-0", "<Keyboard>/f")
            .expect("free path");
        assert_eq!(
            overrides.get("fire-0").map(|b| b.path.as_str()),
            Some("<Keyboard>/f")
        );
    }

    #[test]
    fn duplicates_are_grouped_and_sorted_by_path() {
        let mut overrides = exported();
        overrides.set_override("Player/Dash", "dash-0", "<Keyboard>/j");
        overrides.set_override("Player/Use", "use-0", "<Keyboard>/i");
        overrides.set_override("Player/Empty", "empty-0", "");
        overrides.set_override("Player/Empty", "empty-1", "");

        let duplicates = overrides.duplicates();
        let paths = duplicates
            .iter()
            .map(|conflict| conflict.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["<Keyboard>/i", "<Keyboard>/j"]);
        assert_eq!(duplicates[1].bindings.len(), 2);
        assert_eq!(duplicates[1].bindings[0].id, "jump-0");
        assert_eq!(duplicates[1].bindings[1].id, "dash-0");
    }

    #[test]
    fn override_store_roundtrips_and_defaults_to_empty() {
        let temp = TempDir::new().expect("temp");
        let store = SecureStore::new(StoreConfig::default().with_save_dir(temp.path()));
        let bindings = BindingOverrideStore::new(&store, true);

        assert_eq!(bindings.load(), (BindingOverrides::default(), false));

        let overrides = exported();
        assert!(bindings.save(&overrides));
        assert!(store.record_path("inputKeyBindings").is_file());
        assert_eq!(bindings.load(), (overrides, false));
    }

    #[test]
    fn override_store_reports_tampering() {
        let temp = TempDir::new().expect("temp");
        let store = SecureStore::new(StoreConfig::default().with_save_dir(temp.path()));
        let bindings = BindingOverrideStore::new(&store, false);
        assert!(bindings.save(&exported()));

        let path = store.record_path("inputKeyBindings");
        let raw = fs::read_to_string(&path).expect("read");
        fs::write(&path, raw.replace("leftButton", "rightButton")).expect("tamper");

        assert_eq!(bindings.load(), (BindingOverrides::default(), true));
    }
}
