//! Process-wide settings for the foreign-function layer.

use std::sync::OnceLock;

use rtsffi_core::{DEFAULT_MESSAGE_LIMIT, FfiError};
use rustc_hash::FxHashMap;

static CONFIG: OnceLock<FfiConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfiProperty {
    /// Size of the buffer platform diagnostics are cut to, terminator included.
    MessageBufferSize,
    /// Non-zero binds library symbols on first use instead of at load.
    LoadLazily,
    /// Slots preallocated in each context's root stack.
    InitialRootCapacity,
}

impl FfiProperty {
    pub const ALL: [FfiProperty; 3] = [
        FfiProperty::MessageBufferSize,
        FfiProperty::LoadLazily,
        FfiProperty::InitialRootCapacity,
    ];

    pub fn default_value(&self) -> usize {
        match self {
            FfiProperty::MessageBufferSize => DEFAULT_MESSAGE_LIMIT,
            FfiProperty::LoadLazily => 1,
            FfiProperty::InitialRootCapacity => 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfiConfig {
    properties: FxHashMap<FfiProperty, usize>,
}

impl FfiConfig {
    /// Every property at its default.
    pub fn new() -> Self {
        let mut properties = FxHashMap::default();
        for prop in FfiProperty::ALL {
            properties.insert(prop, prop.default_value());
        }
        Self { properties }
    }

    /// Override one property.
    pub fn set_property(&mut self, property: FfiProperty, value: usize) -> &mut Self {
        self.properties.insert(property, value);
        self
    }

    /// Value of `property`, falling back to its default.
    pub fn get_property(&self, property: FfiProperty) -> usize {
        self.properties
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn message_limit(&self) -> usize {
        self.get_property(FfiProperty::MessageBufferSize)
    }

    pub fn load_lazily(&self) -> bool {
        self.get_property(FfiProperty::LoadLazily) != 0
    }

    pub fn initial_root_capacity(&self) -> usize {
        self.get_property(FfiProperty::InitialRootCapacity)
    }

    /// Make `config` the process-wide configuration.
    ///
    /// Only possible once, and only before anything has read the
    /// configuration.
    pub fn install(config: FfiConfig) -> Result<(), FfiError> {
        CONFIG.set(config).map_err(|_| FfiError::Foreign {
            message: "ffi configuration already installed".into(),
        })
    }

    /// The installed configuration, or the defaults if none was installed.
    pub fn current() -> &'static FfiConfig {
        CONFIG.get_or_init(FfiConfig::new)
    }
}

impl Default for FfiConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated() {
        let config = FfiConfig::new();
        assert_eq!(config.message_limit(), 256);
        assert!(config.load_lazily());
        assert_eq!(config.initial_root_capacity(), 64);
    }

    #[test]
    fn set_property_overrides_default() {
        let mut config = FfiConfig::new();
        config
            .set_property(FfiProperty::LoadLazily, 0)
            .set_property(FfiProperty::MessageBufferSize, 128);
        assert!(!config.load_lazily());
        assert_eq!(config.get_property(FfiProperty::MessageBufferSize), 128);
    }

    #[test]
    fn current_is_stable() {
        let a = FfiConfig::current() as *const FfiConfig;
        let b = FfiConfig::current() as *const FfiConfig;
        assert_eq!(a, b);
        // Once read, the configuration can no longer be replaced.
        assert!(FfiConfig::install(FfiConfig::new()).is_err());
    }
}
