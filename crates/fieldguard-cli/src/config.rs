use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fieldguard_core::RuleDescriptor;
use fieldguard_generate::GenerateOptions;
use fieldguard_introspect::IntrospectOptions;

use crate::CliError;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "fieldguard.toml";

/// Contents of `fieldguard.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldguardConfig {
    pub sources: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub strict: bool,
    pub runtime_crate: Option<String>,
    pub introspect: IntrospectOptions,
    pub rules: Vec<RuleDescriptor>,
}

impl FieldguardConfig {
    pub fn parse(text: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, or `fieldguard.toml` when present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|err| CliError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::parse(&text)
    }

    /// Engine options with command-line values taking precedence.
    pub fn generate_options(&self, overrides: Overrides) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        let sources = if !overrides.sources.is_empty() {
            overrides.sources
        } else if !self.sources.is_empty() {
            self.sources.clone()
        } else {
            defaults.sources
        };
        GenerateOptions {
            sources,
            out_dir: overrides
                .out_dir
                .or_else(|| self.out_dir.clone())
                .unwrap_or(defaults.out_dir),
            strict: overrides.strict || self.strict,
            check: overrides.check,
            runtime_crate: self.runtime_crate.clone().unwrap_or(defaults.runtime_crate),
            introspect: self.introspect.clone(),
            custom_rules: self.rules.clone(),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sources: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub strict: bool,
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldguard_core::ParamKind;

    #[test]
    fn parses_partial_config() {
        let config = FieldguardConfig::parse(
            r#"
sources = ["app/src"]
strict = true

[introspect]
marker_method = "validated"
extractor_wrappers = ["Json", "Body"]

[[rules]]
kind = "slug"
rule_type = "crate::rules::Slug"
params = ["str"]
"#,
        )
        .unwrap();
        assert_eq!(config.introspect.marker_method, "validated");
        assert_eq!(config.introspect.mapping_methods, IntrospectOptions::default().mapping_methods);
        assert_eq!(config.rules[0].params, vec![ParamKind::Str]);
        assert!(!config.rules[0].builtin);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FieldguardConfig::parse("output = \"gen\"").unwrap_err();
        assert!(matches!(err, CliError::Toml(_)));
    }

    #[test]
    fn command_line_wins() {
        let config = FieldguardConfig {
            sources: vec![PathBuf::from("app/src")],
            out_dir: Some(PathBuf::from("app/src/generated")),
            runtime_crate: Some("crate::validation".to_string()),
            ..FieldguardConfig::default()
        };
        let options = config.generate_options(Overrides {
            out_dir: Some(PathBuf::from("out")),
            check: true,
            ..Overrides::default()
        });
        assert_eq!(options.sources, vec![PathBuf::from("app/src")]);
        assert_eq!(options.out_dir, PathBuf::from("out"));
        assert_eq!(options.runtime_crate, "crate::validation");
        assert!(options.check);
        assert!(!options.strict);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "out_dir = \"generated\"\n").unwrap();
        let config = FieldguardConfig::load(Some(&path)).unwrap();
        assert_eq!(config.out_dir, Some(PathBuf::from("generated")));

        let missing = FieldguardConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(missing, Err(CliError::InvalidConfig(_))));
    }
}
