//! LLM credential selection: OpenAI or Azure OpenAI.
//!
//! Exactly one credential set is active per run. The caller picks it with
//! the `--azure` flag (or [`ProviderConfig::auto_detect`]); validation
//! happens here, before any network call, so a half-configured Azure
//! environment is reported by name instead of surfacing later as an opaque
//! HTTP 401.
//!
//! Every selector takes a `lookup` closure rather than reading
//! `std::env` directly. The process-environment variants
//! ([`ProviderConfig::from_env`], [`ProviderConfig::auto_from_env`]) are
//! thin wrappers, which keeps the selection rules testable without
//! mutating global state.

use crate::error::ExtractError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_DEPLOYMENT_NAME: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

/// The four Azure variables, in the order they are reported when missing.
pub const AZURE_VARS: [&str; 4] = [
    AZURE_OPENAI_API_KEY,
    AZURE_OPENAI_ENDPOINT,
    AZURE_OPENAI_DEPLOYMENT_NAME,
    AZURE_OPENAI_API_VERSION,
];

/// Default OpenAI vision model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// A fully populated credential set.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    OpenAi {
        api_key: String,
        model: String,
    },
    Azure {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// Printable summary of a [`ProviderConfig`]; the key is masked.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub api_key: String,
}

impl ProviderConfig {
    /// Select the credential set named by `use_azure` from `lookup`.
    ///
    /// Empty values count as missing.
    pub fn select<F>(use_azure: bool, lookup: F) -> Result<Self, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if use_azure {
            let missing: Vec<String> = AZURE_VARS
                .iter()
                .filter(|name| get(**name).is_none())
                .map(|name| name.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(ExtractError::ConfigIncomplete {
                    provider: "Azure OpenAI".into(),
                    missing,
                });
            }
            Ok(ProviderConfig::Azure {
                api_key: get(AZURE_OPENAI_API_KEY).unwrap_or_default(),
                endpoint: get(AZURE_OPENAI_ENDPOINT).unwrap_or_default(),
                deployment: get(AZURE_OPENAI_DEPLOYMENT_NAME).unwrap_or_default(),
                api_version: get(AZURE_OPENAI_API_VERSION).unwrap_or_default(),
            })
        } else {
            let api_key = get(OPENAI_API_KEY).ok_or_else(|| ExtractError::MissingApiKey {
                provider: "OpenAI".into(),
                var: OPENAI_API_KEY.into(),
            })?;
            Ok(ProviderConfig::OpenAi {
                api_key,
                model: DEFAULT_OPENAI_MODEL.into(),
            })
        }
    }

    /// Pick Azure when all four Azure variables are set, otherwise OpenAI
    /// when its key is set.
    pub fn auto_detect<F>(lookup: F) -> Result<Self, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).is_some_and(|v| !v.trim().is_empty());

        if AZURE_VARS.iter().all(|v| present(*v)) {
            debug!("Auto-detected Azure OpenAI configuration");
            Self::select(true, lookup)
        } else if present(OPENAI_API_KEY) {
            debug!("Auto-detected OpenAI configuration");
            Self::select(false, lookup)
        } else {
            Err(ExtractError::NoProviderConfigured)
        }
    }

    /// [`Self::select`] over the process environment, after loading `.env`.
    pub fn from_env(use_azure: bool) -> Result<Self, ExtractError> {
        load_dotenv();
        Self::select(use_azure, |k| std::env::var(k).ok())
    }

    /// [`Self::auto_detect`] over the process environment, after loading `.env`.
    pub fn auto_from_env() -> Result<Self, ExtractError> {
        load_dotenv();
        Self::auto_detect(|k| std::env::var(k).ok())
    }

    /// Override the OpenAI model. Azure routes by deployment name, so this
    /// is a no-op there.
    pub fn with_model(mut self, new_model: impl Into<String>) -> Self {
        if let ProviderConfig::OpenAi { ref mut model, .. } = self {
            *model = new_model.into();
        }
        self
    }

    pub fn is_azure(&self) -> bool {
        matches!(self, ProviderConfig::Azure { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAi { .. } => "OpenAI",
            ProviderConfig::Azure { .. } => "Azure OpenAI",
        }
    }

    /// Model name for OpenAI, deployment name for Azure.
    pub fn model_name(&self) -> &str {
        match self {
            ProviderConfig::OpenAi { model, .. } => model,
            ProviderConfig::Azure { deployment, .. } => deployment,
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::OpenAi { api_key, .. } | ProviderConfig::Azure { api_key, .. } => {
                api_key
            }
        }
    }

    pub fn info(&self) -> ProviderInfo {
        match self {
            ProviderConfig::OpenAi { api_key, model } => ProviderInfo {
                provider: self.label().into(),
                model: Some(model.clone()),
                deployment_name: None,
                endpoint: None,
                api_version: None,
                api_key: mask_key(api_key),
            },
            ProviderConfig::Azure {
                api_key,
                endpoint,
                deployment,
                api_version,
            } => ProviderInfo {
                provider: self.label().into(),
                model: None,
                deployment_name: Some(deployment.clone()),
                endpoint: Some(endpoint.clone()),
                api_version: Some(api_version.clone()),
                api_key: mask_key(api_key),
            },
        }
    }

    /// Build the provider client.
    ///
    /// `ProviderFactory` reads the credentials from the process
    /// environment, so this is meant for configs produced by
    /// [`Self::from_env`] / [`Self::auto_from_env`].
    pub fn build(&self) -> Result<Arc<dyn LLMProvider>, ExtractError> {
        let (name, model) = match self {
            ProviderConfig::OpenAi { model, .. } => ("openai", model.as_str()),
            ProviderConfig::Azure { deployment, .. } => ("azure", deployment.as_str()),
        };
        info!("Using {} ({})", self.label(), model);
        ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: self.label().into(),
                hint: format!("{e}"),
            }
        })
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::OpenAi { api_key, model } => f
                .debug_struct("OpenAi")
                .field("api_key", &mask_key(api_key))
                .field("model", model)
                .finish(),
            ProviderConfig::Azure {
                api_key,
                endpoint,
                deployment,
                api_version,
            } => f
                .debug_struct("Azure")
                .field("api_key", &mask_key(api_key))
                .field("endpoint", endpoint)
                .field("deployment", deployment)
                .field("api_version", api_version)
                .finish(),
        }
    }
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Using {}", self.provider)?;
        if let Some(ref d) = self.deployment_name {
            writeln!(f, "   Deployment:  {d}")?;
        }
        if let Some(ref e) = self.endpoint {
            writeln!(f, "   Endpoint:    {e}")?;
        }
        if let Some(ref v) = self.api_version {
            writeln!(f, "   API Version: {v}")?;
        }
        if let Some(ref m) = self.model {
            writeln!(f, "   Model:       {m}")?;
        }
        write!(f, "   API Key:     {}", self.api_key)
    }
}

/// First eight characters followed by `...`.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }
}
