//! Which model a run talks to.

use super::traits::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hosted Gemini models the agent is known to work with.
pub const GEMINI_MODELS: [&str; 3] = [
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
];

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Backend family. Registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Gemini,
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A configured model. Serialized as the `model` block of eval reports.
///
/// Parsed from `gemini-2.5-flash` or `local:<model>@<base_url>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    Gemini { name: String },
    Local { model: String, base_url: String },
}

impl ModelSpec {
    pub fn gemini(name: &str) -> Result<Self, ProviderError> {
        if !GEMINI_MODELS.contains(&name) {
            return Err(ProviderError::Other(format!(
                "Unknown Gemini model: {}. Supported: {}",
                name,
                GEMINI_MODELS.join(", ")
            )));
        }
        Ok(Self::Gemini { name: name.into() })
    }

    pub fn local(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::Local {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Gemini { .. } => BackendKind::Gemini,
            Self::Local { .. } => BackendKind::Local,
        }
    }

    /// The bare model name.
    pub fn model_name(&self) -> &str {
        match self {
            Self::Gemini { name } => name,
            Self::Local { model, .. } => model,
        }
    }

    /// Model name usable inside a file name.
    pub fn file_safe_name(&self) -> String {
        self.model_name().replace(['/', ':'], "-")
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::Gemini {
            name: DEFAULT_MODEL.into(),
        }
    }
}

impl FromStr for ModelSpec {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("local:") {
            Some(rest) => {
                let (model, base_url) = rest.rsplit_once('@').ok_or_else(|| {
                    ProviderError::Other(format!(
                        "Local model must look like local:<model>@<base_url>, got {}",
                        s
                    ))
                })?;
                if model.is_empty() || base_url.is_empty() {
                    return Err(ProviderError::Other(format!("Incomplete local model spec: {}", s)));
                }
                Ok(Self::local(model, base_url))
            }
            None => Self::gemini(s),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini { name } => write!(f, "{}", name),
            Self::Local { model, base_url } => write!(f, "local:{}@{}", model, base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gemini_and_rejects_unknown() {
        let spec: ModelSpec = "gemini-2.5-pro".parse().unwrap();
        assert_eq!(spec.kind(), BackendKind::Gemini);
        assert_eq!(spec.to_string(), "gemini-2.5-pro");
        assert!("gpt-4o".parse::<ModelSpec>().is_err());
    }

    #[test]
    fn parses_local_with_url() {
        let spec: ModelSpec = "local:qwen2.5:7b@http://localhost:8080/v1/".parse().unwrap();
        assert_eq!(spec, ModelSpec::local("qwen2.5:7b", "http://localhost:8080/v1"));
        assert_eq!(spec.file_safe_name(), "qwen2.5-7b");
        assert_eq!(spec.to_string(), "local:qwen2.5:7b@http://localhost:8080/v1");
        assert!("local:missing-url".parse::<ModelSpec>().is_err());
    }

    #[test]
    fn serializes_as_tagged_model_info() {
        let info = serde_json::to_value(ModelSpec::default()).unwrap();
        assert_eq!(info, serde_json::json!({"type": "gemini", "name": "gemini-2.5-flash"}));
    }
}
