//! Protocol extensions this server can negotiate.

use std::collections::HashMap;

pub const CLICK_DISTANCE: &str = "ClickDistance";
pub const CUSTOM_BLOCKS: &str = "CustomBlocks";
pub const EXT_PLAYER_LIST: &str = "ExtPlayerList";
pub const LONGER_MESSAGES: &str = "LongerMessages";
pub const CHANGE_MODEL: &str = "ChangeModel";
pub const ENV_MAP_APPEARANCE: &str = "EnvMapAppearance";
pub const ENV_WEATHER_TYPE: &str = "EnvWeatherType";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    pub name: &'static str,
    pub version: i32,
}

/// Everything advertised in our ExtInfo/ExtEntry burst.
pub const SUPPORTED: &[Extension] = &[
    Extension { name: CLICK_DISTANCE, version: 1 },
    Extension { name: CUSTOM_BLOCKS, version: 1 },
    Extension { name: EXT_PLAYER_LIST, version: 2 },
    Extension { name: LONGER_MESSAGES, version: 1 },
    Extension { name: CHANGE_MODEL, version: 1 },
    Extension { name: ENV_MAP_APPEARANCE, version: 2 },
    Extension { name: ENV_WEATHER_TYPE, version: 1 },
];

/// Exact name + version match against [`SUPPORTED`].
pub fn lookup(name: &str, version: i32) -> Option<&'static Extension> {
    SUPPORTED
        .iter()
        .find(|ext| ext.name == name && ext.version == version)
}

/// Extensions both sides agreed on, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSet {
    entries: HashMap<&'static str, i32>,
}

impl ExtensionSet {
    /// Record a client proposal. Returns `false` if it was not a supported match.
    pub fn accept(&mut self, name: &str, version: i32) -> bool {
        match lookup(name, version) {
            Some(ext) => {
                self.entries.insert(ext.name, ext.version);
                true
            }
            None => false,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_matches_are_recorded() {
        let mut set = ExtensionSet::default();
        assert!(set.accept(EXT_PLAYER_LIST, 2));
        assert!(!set.accept(ENV_MAP_APPEARANCE, 1));
        assert!(!set.accept("TextHotKey", 1));
        assert!(set.has(EXT_PLAYER_LIST));
        assert!(!set.has(ENV_MAP_APPEARANCE));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn duplicate_proposals_keep_unique_keys() {
        let mut set = ExtensionSet::default();
        set.accept(CUSTOM_BLOCKS, 1);
        set.accept(CUSTOM_BLOCKS, 1);
        assert_eq!(set.len(), 1);
    }
}
