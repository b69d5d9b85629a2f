//! Provider selection and credential resolution.
//!
//! A client either brings its own key (BYOK) or relies on the key the server
//! was configured with. The choice is captured once in a [`ProviderConfig`]
//! and re-resolved on every round, so a continuation minutes later uses the
//! same credentials as the round that created the session.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::ports::InvocationContext;

/// Supported upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(alias = "open_ai")]
    OpenAi,
    #[serde(alias = "gemini")]
    Google,
    OpenRouter,
}

impl Provider {
    /// All providers, in configuration order.
    pub const ALL: [Self; 4] = [Self::Anthropic, Self::OpenAi, Self::Google, Self::OpenRouter];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding the server-side fallback key.
    #[must_use]
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Google => "GEMINI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Environment variable overriding the upstream base URL.
    #[must_use]
    pub const fn base_url_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "RELAY_ANTHROPIC_BASE_URL",
            Self::OpenAi => "RELAY_OPENAI_BASE_URL",
            Self::Google => "RELAY_GOOGLE_BASE_URL",
            Self::OpenRouter => "RELAY_OPENROUTER_BASE_URL",
        }
    }

    /// OpenAI-compatible chat-completions base URL.
    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider API key. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building upstream auth headers only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Where a round's credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Key supplied by the client with the request.
    Client(ApiKey),
    /// The server's configured key for the provider, looked up at call time.
    ServerFallback,
}

/// Provider plus credential choice, stored verbatim in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub credentials: CredentialSource,
}

impl ProviderConfig {
    /// Pick client credentials when supplied, otherwise the server fallback.
    #[must_use]
    pub fn new(provider: Provider, api_key: Option<ApiKey>) -> Self {
        let credentials = match api_key {
            Some(key) if !key.expose().trim().is_empty() => CredentialSource::Client(key),
            _ => CredentialSource::ServerFallback,
        };
        Self {
            provider,
            credentials,
        }
    }

    #[must_use]
    pub const fn is_byok(&self) -> bool {
        matches!(self.credentials, CredentialSource::Client(_))
    }
}

/// Server-side fallback keys and base URL overrides.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    keys: HashMap<Provider, ApiKey>,
    base_urls: HashMap<Provider, String>,
}

impl ProviderKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load keys and base URLs through a variable lookup (usually the process env).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = Self::new();
        for provider in Provider::ALL {
            if let Some(key) = lookup(provider.api_key_env()).filter(|k| !k.trim().is_empty()) {
                keys.keys.insert(provider, ApiKey::new(key));
            }
            if let Some(url) = lookup(provider.base_url_env()).filter(|u| !u.trim().is_empty()) {
                keys.base_urls
                    .insert(provider, url.trim_end_matches('/').to_string());
            }
        }
        keys
    }

    #[must_use]
    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, ApiKey::new(key));
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, url.into());
        self
    }

    /// Providers with a configured fallback key.
    pub fn configured(&self) -> impl Iterator<Item = Provider> + '_ {
        Provider::ALL
            .into_iter()
            .filter(|p| self.keys.contains_key(p))
    }

    /// Resolve the concrete key and endpoint for one invocation.
    pub fn resolve(&self, config: &ProviderConfig) -> Result<InvocationContext, RelayError> {
        let provider = config.provider;
        let api_key = match &config.credentials {
            CredentialSource::Client(key) => key.clone(),
            CredentialSource::ServerFallback => {
                self.keys.get(&provider).cloned().ok_or_else(|| {
                    RelayError::InvalidRequest(format!(
                        "No API key available for provider '{provider}'. Supply apiKey or configure {}",
                        provider.api_key_env()
                    ))
                })?
            }
        };
        let base_url = self
            .base_urls
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(InvocationContext {
            provider,
            api_key,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parses_aliases() {
        let p: Provider = serde_json::from_str(r#""gemini""#).unwrap();
        assert_eq!(p, Provider::Google);
        let p: Provider = serde_json::from_str(r#""openai""#).unwrap();
        assert_eq!(p, Provider::OpenAi);
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret");
        assert!(!format!("{key:?}").contains("sk-secret"));
        let config = ProviderConfig::new(Provider::OpenAi, Some(key));
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_byok_wins_over_fallback() {
        let keys = ProviderKeys::new().with_key(Provider::OpenAi, "server-key");
        let config = ProviderConfig::new(Provider::OpenAi, Some(ApiKey::new("client-key")));

        let ctx = keys.resolve(&config).unwrap();
        assert_eq!(ctx.api_key.expose(), "client-key");
        assert_eq!(ctx.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_blank_client_key_falls_back() {
        let config = ProviderConfig::new(Provider::Anthropic, Some(ApiKey::new("  ")));
        assert!(!config.is_byok());
    }

    #[test]
    fn test_missing_fallback_is_invalid_request() {
        let keys = ProviderKeys::new();
        let config = ProviderConfig::new(Provider::Google, None);
        let err = keys.resolve(&config).unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(msg) if msg.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn test_from_lookup_reads_keys_and_base_urls() {
        let keys = ProviderKeys::from_lookup(|name| match name {
            "OPENROUTER_API_KEY" => Some("or-key".into()),
            "RELAY_OPENROUTER_BASE_URL" => Some("http://localhost:9999/v1/".into()),
            _ => None,
        });

        assert_eq!(keys.configured().collect::<Vec<_>>(), vec![Provider::OpenRouter]);
        let ctx = keys
            .resolve(&ProviderConfig::new(Provider::OpenRouter, None))
            .unwrap();
        assert_eq!(ctx.base_url, "http://localhost:9999/v1");
    }
}
