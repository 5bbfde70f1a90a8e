//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level Layer Studio configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<GeminiConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_removal: Option<BackgroundRemovalConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Google Generative AI settings used by image generation and AI background
/// removal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (default: `GEMINI_API_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Text-to-image model (default: `imagen-4.0-generate-001`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,

    /// Image editing model used for AI background removal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_model: Option<String>,
}

pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const FALLBACK_API_KEY_ENV: &str = "API_KEY";

impl GeminiConfig {
    /// Resolve the API key: direct value, then the configured env var, then
    /// the `API_KEY` fallback.
    pub fn resolve_api_key(&self) -> Option<String> {
        let env = self
            .api_key_env
            .clone()
            .or_else(|| Some(DEFAULT_API_KEY_ENV.to_string()));
        resolve_secret_field(&self.api_key, &env)
            .or_else(|| resolve_secret_field(&None, &Some(FALLBACK_API_KEY_ENV.to_string())))
    }

    /// Name of the env var the key is expected in, for error messages.
    pub fn api_key_env_name(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemovalConfig {
    /// Maximum color distance from the backdrop color that is still treated
    /// as background (0-255).
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
}

fn default_tolerance() -> u8 {
    48
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Directory exported files are written to (default: current directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// JPEG quality, 1-100 (default: 92).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "layer_studio_editor=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::StudioError::Io)?;

        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::StudioError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn gemini(&self) -> GeminiConfig {
        self.gemini.clone().unwrap_or_default()
    }

    /// Background-removal color tolerance.
    pub fn background_tolerance(&self) -> u8 {
        self.background_removal
            .as_ref()
            .map(|b| b.tolerance)
            .unwrap_or_else(default_tolerance)
    }

    /// Export directory, tilde-expanded.
    pub fn output_dir(&self) -> PathBuf {
        self.export
            .as_ref()
            .and_then(|e| e.output_dir.as_ref())
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.export
            .as_ref()
            .and_then(|e| e.jpeg_quality)
            .unwrap_or(92)
    }

    /// Get a config value by dotted path (e.g. "export.jpegQuality").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let gemini = self.gemini();
        if gemini.resolve_api_key().is_none() {
            warnings.push(format!(
                "No Gemini API key configured (set gemini.apiKey or {}); generation and AI background removal will fail",
                gemini.api_key_env_name()
            ));
        }

        if let Some(quality) = self.export.as_ref().and_then(|e| e.jpeg_quality) {
            if !(1..=100).contains(&quality) {
                errors.push(format!("export.jpegQuality must be 1-100, got {quality}"));
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
                errors.push(format!("Unknown logging.level '{level}'"));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Layer Studio data: `~/.layer_studio/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".layer_studio")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_LS_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_LS_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_LS_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_LS_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.background_tolerance(), 48);
        assert_eq!(config.jpeg_quality(), 92);
        assert_eq!(config.output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/layer-studio.json")).unwrap();
        assert!(config.gemini.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                gemini: { apiKey: "direct-key", imageModel: "imagen-x" },
                export: { jpegQuality: 80 },
                backgroundRemoval: { tolerance: 30 },
            }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.gemini().resolve_api_key(), Some("direct-key".into()));
        assert_eq!(config.gemini().image_model.as_deref(), Some("imagen-x"));
        assert_eq!(config.jpeg_quality(), 80);
        assert_eq!(config.background_tolerance(), 30);
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(crate::error::StudioError::Config(_))
        ));
    }

    #[test]
    fn test_gemini_resolve_api_key_from_env() {
        // SAFETY: test-only, variable name unique to this test
        unsafe { std::env::set_var("TEST_LS_GEMINI_KEY", "from-env") };
        let gemini = GeminiConfig {
            api_key_env: Some("TEST_LS_GEMINI_KEY".into()),
            ..GeminiConfig::default()
        };
        assert_eq!(gemini.resolve_api_key(), Some("from-env".into()));
        assert_eq!(gemini.api_key_env_name(), "TEST_LS_GEMINI_KEY");
        unsafe { std::env::remove_var("TEST_LS_GEMINI_KEY") };
    }

    #[test]
    fn test_get_path() {
        let config = Config {
            export: Some(ExportConfig {
                output_dir: Some("/tmp/out".into()),
                jpeg_quality: Some(70),
            }),
            ..Config::default()
        };
        assert_eq!(
            config.get_path("export.jpegQuality"),
            Some(serde_json::json!(70))
        );
        assert!(config.get_path("export.missing").is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let json_str = r#"{ "logging": {} }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_bad_quality_errors() {
        let config = Config {
            export: Some(ExportConfig {
                output_dir: None,
                jpeg_quality: Some(0),
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("jpegQuality")),
            "Expected an error about jpegQuality, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_bad_log_level_errors() {
        let config = Config {
            logging: Some(LoggingConfig {
                level: Some("loud".into()),
                ..LoggingConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("loud")));
    }
}
