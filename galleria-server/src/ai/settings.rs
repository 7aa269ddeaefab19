//! Layered resolution of AI settings.
//!
//! A value is looked up in an ordered list of providers and the first
//! non-empty (after trim) answer wins:
//!
//! 1. the per-request override, when the caller supplies one;
//! 2. the `system_configs` table ([`DatabaseLayer`]);
//! 3. a snapshot of the process environment ([`EnvLayer`]);
//! 4. compiled-in defaults ([`DefaultLayer`]).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::warn;

use crate::entities::ConfigStore;

pub const DEFAULT_IMAGE_API_URL: &str = "https://api.openai.com/v1/images/generations";
pub const DEFAULT_CHAT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Every AI setting, named after its config key and environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum AiSetting {
    #[strum(serialize = "AI_API_KEY")]
    ApiKey,
    #[strum(serialize = "AI_IMAGE_API_URL")]
    ImageApiUrl,
    #[strum(serialize = "AI_CHAT_API_URL")]
    ChatApiUrl,
    #[strum(serialize = "AI_IMAGE_MODEL")]
    ImageModel,
    #[strum(serialize = "AI_CHAT_MODEL")]
    ChatModel,
    #[strum(serialize = "AI_MODELS")]
    Models,
    #[strum(serialize = "AI_IMAGE_API_MODE")]
    ImageApiMode,
}

impl AiSetting {
    pub fn key(self) -> &'static str {
        self.into()
    }

    /// `true` for keys whose values must never be echoed back in full.
    pub fn is_secret(self) -> bool {
        matches!(self, AiSetting::ApiKey)
    }

    pub fn default_value(self) -> Option<&'static str> {
        match self {
            AiSetting::ApiKey => None,
            AiSetting::ImageApiUrl => Some(DEFAULT_IMAGE_API_URL),
            AiSetting::ChatApiUrl => Some(DEFAULT_CHAT_API_URL),
            AiSetting::ImageModel => Some(DEFAULT_IMAGE_MODEL),
            AiSetting::ChatModel => Some(DEFAULT_CHAT_MODEL),
            AiSetting::Models => Some("dall-e-3,gpt-4o-mini"),
            AiSetting::ImageApiMode => Some("auto"),
        }
    }
}

/// Which layer produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettingLayer {
    Override,
    Database,
    Environment,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetting {
    pub value: String,
    pub layer: SettingLayer,
}

/// One source of setting values.
#[async_trait]
pub trait SettingProvider: Send + Sync {
    fn layer(&self) -> SettingLayer;

    /// Raw value for `key`; blank values are treated as absent by the resolver.
    async fn lookup(&self, key: AiSetting) -> Option<String>;
}

/// Reads the `system_configs` table on every lookup, so admin edits apply to
/// the next request without a restart.
pub struct DatabaseLayer<S> {
    store: Arc<S>,
}

impl<S: ConfigStore> DatabaseLayer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ConfigStore> SettingProvider for DatabaseLayer<S> {
    fn layer(&self) -> SettingLayer {
        SettingLayer::Database
    }

    async fn lookup(&self, key: AiSetting) -> Option<String> {
        match self.store.get_config_value(key.key()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key.key(), error = %e, "config lookup failed; skipping database layer");
                None
            }
        }
    }
}

/// Environment values captured once, at construction.
#[derive(Debug, Clone, Default)]
pub struct EnvLayer {
    values: HashMap<AiSetting, String>,
}

impl EnvLayer {
    pub fn from_process() -> Self {
        let values = AiSetting::iter()
            .filter_map(|key| std::env::var(key.key()).ok().map(|v| (key, v)))
            .collect();
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (AiSetting, String)>,
    {
        Self {
            values: pairs.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SettingProvider for EnvLayer {
    fn layer(&self) -> SettingLayer {
        SettingLayer::Environment
    }

    async fn lookup(&self, key: AiSetting) -> Option<String> {
        self.values.get(&key).cloned()
    }
}

pub struct DefaultLayer;

#[async_trait]
impl SettingProvider for DefaultLayer {
    fn layer(&self) -> SettingLayer {
        SettingLayer::Default
    }

    async fn lookup(&self, key: AiSetting) -> Option<String> {
        key.default_value().map(str::to_owned)
    }
}

/// How image generation reaches the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ImageApiMode {
    /// Dedicated image-generation endpoint.
    Images,
    /// Chat-completion endpoint whose reply embeds an image link.
    Chat,
    /// Chat when the image endpoint path ends in `/chat/completions`.
    #[default]
    Auto,
}

impl ImageApiMode {
    pub fn uses_chat(self, image_api_url: &str) -> bool {
        match self {
            ImageApiMode::Images => false,
            ImageApiMode::Chat => true,
            ImageApiMode::Auto => {
                let path = image_api_url.split(['?', '#']).next().unwrap_or_default();
                path.trim_end_matches('/').ends_with("/chat/completions")
            }
        }
    }
}

/// Everything one image-generation job needs, resolved up front.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    /// Image endpoint, or the chat endpoint when `use_chat` is set.
    pub endpoint: String,
    pub model: String,
    pub use_chat: bool,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
}

/// Model names advertised to clients.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub image_model: String,
    pub chat_model: String,
    pub models: Vec<String>,
}

pub struct SettingsResolver {
    layers: Vec<Box<dyn SettingProvider>>,
}

impl std::fmt::Debug for SettingsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let layers: Vec<SettingLayer> = self.layers.iter().map(|l| l.layer()).collect();
        f.debug_struct("SettingsResolver").field("layers", &layers).finish()
    }
}

impl SettingsResolver {
    /// Layers are consulted in the given order.
    pub fn new(layers: Vec<Box<dyn SettingProvider>>) -> Self {
        Self { layers }
    }

    /// Database, then `env`, then defaults.
    pub fn standard<S: ConfigStore>(store: Arc<S>, env: EnvLayer) -> Self {
        Self::new(vec![
            Box::new(DatabaseLayer::new(store)),
            Box::new(env),
            Box::new(DefaultLayer),
        ])
    }

    pub async fn resolve(
        &self,
        key: AiSetting,
        override_value: Option<&str>,
    ) -> Option<ResolvedSetting> {
        if let Some(value) = non_blank(override_value) {
            return Some(ResolvedSetting {
                value,
                layer: SettingLayer::Override,
            });
        }
        for layer in &self.layers {
            if let Some(value) = non_blank(layer.lookup(key).await.as_deref()) {
                return Some(ResolvedSetting {
                    value,
                    layer: layer.layer(),
                });
            }
        }
        None
    }

    pub async fn value(&self, key: AiSetting) -> Option<String> {
        self.resolve(key, None).await.map(|r| r.value)
    }

    /// Settings for one image job. `model_override` beats every stored model.
    pub async fn generation(&self, model_override: Option<&str>) -> GenerationSettings {
        let image_api_url = self
            .value(AiSetting::ImageApiUrl)
            .await
            .unwrap_or_else(|| DEFAULT_IMAGE_API_URL.to_owned());
        let mode = match self.value(AiSetting::ImageApiMode).await {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unknown AI_IMAGE_API_MODE; using auto");
                ImageApiMode::Auto
            }),
            None => ImageApiMode::Auto,
        };
        let use_chat = mode.uses_chat(&image_api_url);
        // Forced chat mode against a plain image URL goes to the chat endpoint.
        let endpoint = if use_chat && !ImageApiMode::Auto.uses_chat(&image_api_url) {
            self.chat_api_url().await
        } else {
            image_api_url
        };
        GenerationSettings {
            api_key: self.value(AiSetting::ApiKey).await,
            endpoint,
            model: self
                .resolve(AiSetting::ImageModel, model_override)
                .await
                .map(|r| r.value)
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_owned()),
            use_chat,
        }
    }

    pub async fn chat(&self, model_override: Option<&str>) -> ChatSettings {
        ChatSettings {
            api_key: self.value(AiSetting::ApiKey).await,
            endpoint: self.chat_api_url().await,
            model: self
                .resolve(AiSetting::ChatModel, model_override)
                .await
                .map(|r| r.value)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
        }
    }

    async fn chat_api_url(&self) -> String {
        self.value(AiSetting::ChatApiUrl)
            .await
            .unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_owned())
    }

    pub async fn models(&self) -> ModelCatalog {
        let image_model = self
            .value(AiSetting::ImageModel)
            .await
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_owned());
        let chat_model = self
            .value(AiSetting::ChatModel)
            .await
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned());
        let mut models: Vec<String> = self
            .value(AiSetting::Models)
            .await
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned)
            .collect();
        for m in [&image_model, &chat_model] {
            if !models.contains(m) {
                models.push(m.clone());
            }
        }
        ModelCatalog {
            image_model,
            chat_model,
            models,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `sk-abcdef123456` → `sk-…3456`. Short secrets are fully hidden.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "****".to_owned();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::SqliteStore;

    async fn resolver_with(env: EnvLayer) -> (Arc<SqliteStore>, SettingsResolver) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let resolver = SettingsResolver::standard(Arc::clone(&store), env);
        (store, resolver)
    }

    #[tokio::test]
    async fn precedence_is_override_database_env_default() {
        let env = EnvLayer::from_pairs([(AiSetting::ImageModel, "env-model".to_owned())]);
        let (store, resolver) = resolver_with(env).await;

        let r = resolver.resolve(AiSetting::ImageModel, None).await.unwrap();
        assert_eq!((r.value.as_str(), r.layer), ("env-model", SettingLayer::Environment));

        store
            .upsert_config_entry("AI_IMAGE_MODEL", "db-model", None)
            .await
            .unwrap();
        let r = resolver.resolve(AiSetting::ImageModel, None).await.unwrap();
        assert_eq!((r.value.as_str(), r.layer), ("db-model", SettingLayer::Database));

        let r = resolver
            .resolve(AiSetting::ImageModel, Some("req-model"))
            .await
            .unwrap();
        assert_eq!((r.value.as_str(), r.layer), ("req-model", SettingLayer::Override));

        let r = resolver.resolve(AiSetting::ChatModel, None).await.unwrap();
        assert_eq!((r.value.as_str(), r.layer), ("gpt-4o-mini", SettingLayer::Default));
    }

    #[tokio::test]
    async fn blank_values_fall_through() {
        let env = EnvLayer::from_pairs([(AiSetting::ApiKey, "sk-env".to_owned())]);
        let (store, resolver) = resolver_with(env).await;
        store.upsert_config_entry("AI_API_KEY", "   ", None).await.unwrap();

        let r = resolver.resolve(AiSetting::ApiKey, Some("")).await.unwrap();
        assert_eq!(r.layer, SettingLayer::Environment);

        let (_, bare) = resolver_with(EnvLayer::empty()).await;
        assert!(bare.resolve(AiSetting::ApiKey, None).await.is_none());
    }

    #[tokio::test]
    async fn chat_mode_follows_endpoint_path_in_auto() {
        let env = EnvLayer::from_pairs([(
            AiSetting::ImageApiUrl,
            "https://proxy.example/v1/chat/completions".to_owned(),
        )]);
        let (store, resolver) = resolver_with(env).await;
        let settings = resolver.generation(None).await;
        assert!(settings.use_chat);
        assert_eq!(settings.endpoint, "https://proxy.example/v1/chat/completions");

        store
            .upsert_config_entry("AI_IMAGE_API_MODE", "IMAGES", None)
            .await
            .unwrap();
        let settings = resolver.generation(Some("flux")).await;
        assert!(!settings.use_chat);
        assert_eq!(settings.model, "flux");
    }

    #[tokio::test]
    async fn forced_chat_mode_uses_chat_endpoint() {
        let env = EnvLayer::from_pairs([(AiSetting::ImageApiMode, "chat".to_owned())]);
        let (_, resolver) = resolver_with(env).await;
        let settings = resolver.generation(None).await;
        assert!(settings.use_chat);
        assert_eq!(settings.endpoint, DEFAULT_CHAT_API_URL);

        let chat = resolver.chat(None).await;
        assert_eq!(chat.model, DEFAULT_CHAT_MODEL);
    }

    #[tokio::test]
    async fn model_catalog_includes_active_models() {
        let env = EnvLayer::from_pairs([
            (AiSetting::Models, "a, b,,".to_owned()),
            (AiSetting::ChatModel, "b".to_owned()),
        ]);
        let (_, resolver) = resolver_with(env).await;
        let catalog = resolver.models().await;
        assert_eq!(catalog.models, vec!["a", "b", "dall-e-3"]);
    }

    #[test]
    fn masks_keep_only_prefix_and_suffix() {
        assert_eq!(mask_secret("sk-1234567890abcd"), "sk-…abcd");
        assert_eq!(mask_secret("short"), "****");
    }
}
