// File: ./src/shell.rs
//! Startup wiring.
//!
//! The device locale is read once, the localizer is built with it, the
//! language provider starts from whatever the localizer selected, and the
//! API client is configured from the same config. Nothing here is global:
//! the host keeps the `AppShell` and passes handles down.
use crate::client::ApiClient;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::i18n::Localizer;
use crate::language::{AppTranslation, LanguageHandle, LanguageProvider};
use crate::locale::{LocaleCatalog, LocaleId, device_language};
use crate::secure_store::CredentialStore;
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Debug)]
pub struct AppShell {
    config: AppConfig,
    language: LanguageProvider,
    api: ApiClient,
}

impl AppShell {
    /// Resolves the config from `ctx` and the environment, detects the device
    /// language and loads the bundled locales.
    pub fn bootstrap(ctx: &dyn AppContext, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let config = AppConfig::resolve(ctx)?;
        let catalog = LocaleCatalog::bundled().context("Bundled locales are invalid")?;
        Self::from_parts(config, catalog, device_language(), store)
    }

    /// Same wiring with every input explicit.
    pub fn from_parts(
        config: AppConfig,
        catalog: LocaleCatalog,
        device_language: Option<LocaleId>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let fallback = LocaleId::parse(&config.fallback_language)
            .context("Invalid fallback_language in config")?;
        let localizer = Localizer::new(catalog, device_language, fallback)?;
        log::info!(
            "Language: {} (fallback {})",
            localizer.current_locale(),
            localizer.fallback_locale()
        );

        let api = ApiClient::from_config(&config, store)
            .with_context(|| format!("Cannot build API client for '{}'", config.api_url))?;
        log::info!("API base URL: {}", api.base_url());

        Ok(Self {
            config,
            language: LanguageProvider::new(localizer),
            api,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn language(&self) -> &LanguageProvider {
        &self.language
    }

    pub fn language_handle(&self) -> LanguageHandle {
        self.language.handle()
    }

    pub fn translation(&self) -> AppTranslation {
        self.language.translation()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use crate::secure_store::MemoryStore;

    fn store() -> Arc<dyn CredentialStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn unsupported_device_language_starts_in_fallback() {
        let shell = AppShell::from_parts(
            AppConfig::default(),
            LocaleCatalog::bundled().unwrap(),
            LocaleId::from_tag("de-DE"),
            store(),
        )
        .unwrap();
        assert_eq!(shell.translation().current_language(), "en");
    }

    #[test]
    fn supported_device_language_is_selected() {
        let shell = AppShell::from_parts(
            AppConfig::default(),
            LocaleCatalog::bundled().unwrap(),
            LocaleId::from_tag("fr_CA.UTF-8"),
            store(),
        )
        .unwrap();
        let t = shell.translation();
        assert_eq!(t.current_language(), "fr");
        assert_eq!(t.t("tabs.home"), "Accueil");
    }

    #[test]
    fn bad_fallback_in_config_fails_startup() {
        let config = AppConfig {
            fallback_language: "es".to_string(),
            ..AppConfig::default()
        };
        let err = AppShell::from_parts(config, LocaleCatalog::bundled().unwrap(), None, store())
            .unwrap_err();
        assert!(err.to_string().contains("es"));
    }

    #[test]
    fn bad_api_url_fails_startup() {
        let config = AppConfig {
            api_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(
            AppShell::from_parts(config, LocaleCatalog::bundled().unwrap(), None, store()).is_err()
        );
    }

    #[tokio::test]
    async fn bootstrap_reads_config_file() {
        let ctx = TestContext::new();
        ctx.write_config("api_url = \"http://127.0.0.1:9\"\nmax_redirects = 3\n")
            .unwrap();
        let shell = AppShell::bootstrap(&ctx, store()).unwrap();
        assert_eq!(shell.config().max_redirects, 3);
        // The environment may override the file, so only check what it can't.
        assert!(shell.api().base_url().scheme().is_some());
    }
}
