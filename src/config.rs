use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("invalid lowering options in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// How `Option<T>` lowers when `T` already has a nil zero value.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OptionPolicy {
    /// Reference-like `T` stays `T`; absence is `nil`.
    #[default]
    NilSentinel,
    /// Every `Option<T>` becomes `*T`.
    AlwaysPointer,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LowerOptions {
    pub hidden_prefix: String,
    pub format_function: String,
    pub error_format_function: String,
    pub error_constructor: String,
    pub option_policy: OptionPolicy,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            hidden_prefix: "gx".into(),
            format_function: "fmt.Sprintf".into(),
            error_format_function: "fmt.Errorf".into(),
            error_constructor: "errors.New".into(),
            option_policy: OptionPolicy::NilSentinel,
        }
    }
}

impl LowerOptions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&content, path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let options: LowerOptions =
            toml::from_str(content).map_err(|error| ConfigError::Parse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;
        if options.hidden_prefix.is_empty()
            || !options
                .hidden_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            || options.hidden_prefix.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!(
                    "hidden-prefix `{}` is not a valid identifier prefix",
                    options.hidden_prefix
                ),
            });
        }
        Ok(options)
    }

    /// Name of a compiler-inserted binding, e.g. `gxErr0`.
    pub fn hidden(&self, role: &str) -> String {
        format!("{}{}", self.hidden_prefix, role)
    }
}

/// Import path for a qualified function name such as `fmt.Sprintf`.
pub fn import_path_of(function: &str) -> Option<&str> {
    function.rsplit_once('.').map(|(path, _)| path)
}
