use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolguard_mcp::gateway::{default_list_overrides, DEFAULT_INPUT_RECIPE, DEFAULT_OUTPUT_RECIPE};
use toolguard_mcp::GuardConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(
        "downstream server advertises tools but no policy identity is configured \
         (set TOOLGUARD_POLICY_TOKEN, or TOOLGUARD_VAULT_TOKEN and TOOLGUARD_VAULT_ITEM_ID)"
    )]
    MissingIdentity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub downstream: DownstreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Decision service endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default = "default_input_recipe")]
    pub input_recipe: String,

    #[serde(default = "default_output_recipe")]
    pub output_recipe: String,

    #[serde(default = "default_list_overrides")]
    pub list_overrides: Value,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_input_recipe() -> String {
    DEFAULT_INPUT_RECIPE.to_string()
}

fn default_output_recipe() -> String {
    DEFAULT_OUTPUT_RECIPE.to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
            app_id: None,
            input_recipe: default_input_recipe(),
            output_recipe: default_output_recipe(),
            list_overrides: default_list_overrides(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Values taken from the command line or environment, which win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub policy_base_url: Option<String>,
    pub app_id: Option<String>,
}

impl ProxyConfig {
    /// Load the configuration file, falling back to defaults when it does
    /// not exist.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            tracing::info!(path = %config_path.display(), "configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(base_url) = overrides.policy_base_url {
            self.policy.base_url = Some(base_url);
        }
        if let Some(app_id) = overrides.app_id {
            self.policy.app_id = Some(app_id);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.timeout_secs == 0 {
            return Err(ConfigError::Invalid("policy.timeout_secs must be positive".to_string()));
        }
        if self.downstream.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "downstream.handshake_timeout_secs must be positive".to_string(),
            ));
        }
        if !self.policy.list_overrides.is_object() {
            return Err(ConfigError::Invalid("policy.list_overrides must be a table".to_string()));
        }
        Ok(())
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_secs(self.policy.timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.downstream.handshake_timeout_secs)
    }

    /// Decision service endpoint; required once tools need guarding
    pub fn policy_base_url(&self) -> Result<&str, ConfigError> {
        self.policy.base_url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(
                "policy.base_url is not set (config file or TOOLGUARD_POLICY_BASE_URL)".to_string(),
            )
        })
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            input_recipe: self.policy.input_recipe.clone(),
            output_recipe: self.policy.output_recipe.clone(),
            list_overrides: self.policy.list_overrides.clone(),
            app_id: self.policy.app_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::load(&dir.path().join("toolguard.toml")).unwrap();

        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.policy.input_recipe, DEFAULT_INPUT_RECIPE);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(30));
        assert!(config.policy_base_url().is_err());
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
[policy]
base_url = "https://ai-guard.example.com"
timeout_secs = 5
app_id = "travel-agent"
input_recipe = "strict_input"
list_overrides = { ignore_recipe = true, malicious_prompt = { disabled = false, action = "report" } }

[vault]
base_url = "https://vault.example.com"

[downstream]
handshake_timeout_secs = 12
"#,
        );

        let config = ProxyConfig::load(file.path()).unwrap();

        assert_eq!(config.policy_base_url().unwrap(), "https://ai-guard.example.com");
        assert_eq!(config.policy_timeout(), Duration::from_secs(5));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(12));
        assert_eq!(config.vault.base_url.as_deref(), Some("https://vault.example.com"));

        let guard = config.guard_config();
        assert_eq!(guard.input_recipe, "strict_input");
        assert_eq!(guard.output_recipe, DEFAULT_OUTPUT_RECIPE);
        assert_eq!(guard.app_id.as_deref(), Some("travel-agent"));
        assert_eq!(
            guard.list_overrides,
            json!({"ignore_recipe": true, "malicious_prompt": {"disabled": false, "action": "report"}})
        );
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = write_config("[policy]\nbase_url = \"https://file.example.com\"\napp_id = \"file\"\n");

        let config = ProxyConfig::load(file.path()).unwrap().with_overrides(Overrides {
            policy_base_url: Some("https://env.example.com".to_string()),
            app_id: None,
        });

        assert_eq!(config.policy_base_url().unwrap(), "https://env.example.com");
        assert_eq!(config.policy.app_id.as_deref(), Some("file"));
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let syntax = write_config("[policy\nbase_url = ");
        assert!(matches!(ProxyConfig::load(syntax.path()), Err(ConfigError::Parse { .. })));

        let zero = write_config("[downstream]\nhandshake_timeout_secs = 0\n");
        assert!(matches!(ProxyConfig::load(zero.path()), Err(ConfigError::Invalid(_))));

        let overrides = write_config("[policy]\nlist_overrides = \"block\"\n");
        assert!(matches!(ProxyConfig::load(overrides.path()), Err(ConfigError::Invalid(_))));
    }
}
