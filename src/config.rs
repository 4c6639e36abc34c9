use serde::Deserialize;
use std::{collections::HashMap, env, path::Path};

use crate::classifier::DEFAULT_PROVIDER_MARKER;
use crate::error::ConfigError;
use crate::registry::{Scope, TypeDescriptor};

// Environment overrides
const ENV_INCLUDE_PATTERNS: &str = "ADVISOR_CACHE_INCLUDE";
const ENV_PROVIDER_MARKER: &str = "ADVISOR_CACHE_MARKER";

/// What discovery does with a candidate whose type cannot be determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvableTypePolicy {
    /// Exclude it quietly
    #[default]
    Skip,
    /// Exclude it and log a warning
    Warn,
}

/// Resolution cache settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Regular expressions a component name must fully match; empty admits all
    pub include_patterns: Vec<String>,
    /// Type marker identifying providers
    pub provider_marker: String,
    pub unresolvable_types: UnresolvableTypePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            provider_marker: DEFAULT_PROVIDER_MARKER.to_string(),
            unresolvable_types: UnresolvableTypePolicy::Skip,
        }
    }
}

impl ResolverConfig {
    /// Environment variables win over file values.
    /// `ADVISOR_CACHE_INCLUDE` is a comma-separated pattern list.
    pub fn apply_env_overrides(&mut self, env_map: &HashMap<String, String>) {
        if let Some(patterns) = env_map.get(ENV_INCLUDE_PATTERNS) {
            self.include_patterns = patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(marker) = env_map.get(ENV_PROVIDER_MARKER).filter(|m| !m.trim().is_empty()) {
            self.provider_marker = marker.trim().to_string();
        }
    }
}

/// A component declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(default)]
    pub scope: Scope,
    /// Leave out to register a component whose type is unknown until created
    #[serde(default)]
    pub descriptor: Option<TypeDescriptor>,
}

/// Demo application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resolver: ResolverConfig,
    #[serde(rename = "component")]
    pub components: Vec<ComponentConfig>,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;

        let env_map: HashMap<String, String> = [ENV_INCLUDE_PATTERNS, ENV_PROVIDER_MARKER]
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        config.resolver.apply_env_overrides(&env_map);

        tracing::debug!(
            path = %path.display(),
            components = config.components.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[resolver]
include_patterns = ["test.*"]
unresolvable_types = "warn"

[[component]]
name = "testAspect"

[component.descriptor]
type = "demo.TestAspect"
markers = ["aspect"]

[[component.descriptor.methods]]
name = "doBefore"
annotations = { before = "execution(* demo..say())" }

[[component]]
name = "myTestBean"
scope = "prototype"
"#;

    #[test]
    fn test_parses_components_and_resolver_settings() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.resolver.include_patterns, vec!["test.*".to_string()]);
        assert_eq!(config.resolver.provider_marker, DEFAULT_PROVIDER_MARKER);
        assert_eq!(config.resolver.unresolvable_types, UnresolvableTypePolicy::Warn);
        assert_eq!(config.components.len(), 2);

        let aspect = &config.components[0];
        assert_eq!(aspect.scope, Scope::Singleton);
        let descriptor = aspect.descriptor.as_ref().unwrap();
        assert!(descriptor.has_marker("aspect"));
        assert_eq!(descriptor.methods[0].name, "doBefore");

        assert_eq!(config.components[1].scope, Scope::Prototype);
        assert!(config.components[1].descriptor.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.resolver, ResolverConfig::default());
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut resolver = ResolverConfig::default();
        let env_map = HashMap::from([
            (ENV_INCLUDE_PATTERNS.to_string(), "audit.*, ,tx.*".to_string()),
            (ENV_PROVIDER_MARKER.to_string(), "advice".to_string()),
        ]);

        resolver.apply_env_overrides(&env_map);

        assert_eq!(resolver.include_patterns, vec!["audit.*".to_string(), "tx.*".to_string()]);
        assert_eq!(resolver.provider_marker, "advice");
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.components.len(), 2);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = AppConfig::load("/nonexistent/advisor-cache.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let err = AppConfig::from_toml_str("[resolver\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
