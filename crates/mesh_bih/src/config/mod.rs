//! Configuration system
//!
//! Build and collision tunables for the BIH, loadable from TOML or RON.

pub use serde::{Serialize, Deserialize};

/// Hard ceiling on triangles per mesh.
///
/// Leaf ranges address triangles with 24 significant bits; a configured cap
/// above this is rejected at build time.
pub const MAX_ADDRESSABLE_TRIANGLES: usize = 1 << 24;

/// Default cap on triangles per mesh
pub const DEFAULT_MAX_TRIANGLES: usize = 1 << 14;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Tree construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Largest triangle count accepted for a single mesh
    pub max_triangles_per_mesh: usize,
    /// Subsets with this many triangles or fewer become leaves
    pub leaf_size: usize,
    /// Subsets at this depth become leaves regardless of size
    pub max_depth: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_triangles_per_mesh: DEFAULT_MAX_TRIANGLES,
            leaf_size: 4,
            max_depth: 32,
        }
    }
}

impl BuildConfig {
    /// Check the parameters against the hard addressing limits
    pub fn validate(&self) -> Result<(), String> {
        if self.max_triangles_per_mesh > MAX_ADDRESSABLE_TRIANGLES {
            return Err(format!(
                "max_triangles_per_mesh {} exceeds the addressable limit {}",
                self.max_triangles_per_mesh, MAX_ADDRESSABLE_TRIANGLES
            ));
        }
        if self.leaf_size == 0 {
            return Err("leaf_size must be at least 1".to_string());
        }
        if self.max_depth == 0 {
            return Err("max_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Volumetric query parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollideConfig {
    /// Inflation of the exact overlap test at the contact position
    pub contact_epsilon: f32,
}

impl Default for CollideConfig {
    fn default() -> Self {
        Self { contact_epsilon: 1e-3 }
    }
}

/// Top-level BIH configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BihConfig {
    /// Construction parameters
    pub build: BuildConfig,
    /// Collision parameters
    pub collide: CollideConfig,
}

impl Config for BihConfig {}
