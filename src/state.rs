//! Persisted viewer state
//!
//! Remembers the last prop and the options used for each prop kind in
//! `<data_dir>/crafta-props/state.json`.

use crafta_props::{BuildOptions, PropKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub last_prop: PropKind,
    /// Keyed by prop name
    pub options: HashMap<String, BuildOptions>,
    /// Last particle support chosen in the build panel
    pub particles_enabled: Option<bool>,
}

impl AppState {
    pub fn path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("crafta-props").join("state.json"))
    }

    /// Load saved state, or defaults when there is none
    pub fn load() -> Self {
        Self::path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring unreadable state {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn options_for(&self, kind: PropKind) -> BuildOptions {
        self.options.get(&kind.to_string()).cloned().unwrap_or_default()
    }

    pub fn remember(&mut self, kind: PropKind, options: BuildOptions) {
        self.last_prop = kind;
        self.options.insert(kind.to_string(), options);
    }

    /// Particle support for this launch; `--no-particles` applies to the
    /// launch only and leaves the saved choice alone
    pub fn particles_for_launch(&self, disabled_by_flag: bool) -> bool {
        !disabled_by_flag && self.particles_enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let path = std::env::temp_dir()
            .join(format!("crafta-props-state-{}", std::process::id()))
            .join("state.json");

        let mut state = AppState::default();
        state.remember(
            PropKind::Sword,
            BuildOptions::new().size("giant").feature("magical"),
        );
        state.save_to(&path).unwrap();

        let loaded = AppState::load_from(&path);
        assert_eq!(loaded.last_prop, PropKind::Sword);
        assert_eq!(loaded.options_for(PropKind::Sword).size.as_deref(), Some("giant"));
        assert_eq!(loaded.options_for(PropKind::Couch), BuildOptions::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_no_particles_flag_is_not_remembered() {
        let path = std::env::temp_dir()
            .join(format!("crafta-props-flag-{}", std::process::id()))
            .join("state.json");

        let mut state = AppState::default();
        assert!(!state.particles_for_launch(true));
        state.remember(PropKind::Sword, BuildOptions::new().feature("magical"));
        state.save_to(&path).unwrap();

        let loaded = AppState::load_from(&path);
        assert_eq!(loaded.particles_enabled, None);
        assert!(loaded.particles_for_launch(false));

        let mut chosen = loaded;
        chosen.particles_enabled = Some(false);
        assert!(!chosen.particles_for_launch(false));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let state = AppState::load_from(Path::new("/nonexistent/crafta/state.json"));
        assert_eq!(state.last_prop, PropKind::Couch);
        assert!(state.options.is_empty());
    }
}
