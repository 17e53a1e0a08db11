/* appshell/src/mobile.rs
 *
 * UniFFI interface exposing the shell core to the Android/iOS host.
 */

use crate::client::ApiError;
use crate::config::AppConfig;
use crate::context::StandardContext;
use crate::language::Subscription;
use crate::locale::{LocaleCatalog, LocaleId, device_language};
use crate::secure_store::{CredentialStore, StoreError};
use crate::shell::AppShell;
use futures::future::BoxFuture;
use http::Method;
use http::header::{CONTENT_TYPE, HeaderValue};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum MobileError {
    Generic(String),
}
impl From<String> for MobileError {
    fn from(e: String) -> Self {
        Self::Generic(e)
    }
}
impl From<&str> for MobileError {
    fn from(e: &str) -> Self {
        Self::Generic(e.to_string())
    }
}
impl From<anyhow::Error> for MobileError {
    fn from(e: anyhow::Error) -> Self {
        Self::Generic(format!("{:#}", e))
    }
}
impl From<ApiError> for MobileError {
    fn from(e: ApiError) -> Self {
        Self::Generic(e.to_string())
    }
}
impl std::fmt::Display for MobileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MobileError::Generic(s) => write!(f, "{}", s),
        }
    }
}
impl std::error::Error for MobileError {}

/// Implemented by the host on top of its secure storage
/// (Keystore-backed preferences, iOS Keychain).
#[uniffi::export(with_foreign)]
pub trait MobileSecureStore: Send + Sync {
    fn get_item(&self, key: String) -> Option<String>;
}

/// Implemented by the host UI to re-render on language changes.
#[uniffi::export(with_foreign)]
pub trait LanguageListener: Send + Sync {
    fn on_language_changed(&self, language: String);
}

struct ForeignStore(Arc<dyn MobileSecureStore>);

impl std::fmt::Debug for ForeignStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ForeignStore")
    }
}

impl CredentialStore for ForeignStore {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        let host = self.0.clone();
        let key = key.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || host.get_item(key).filter(|v| !v.is_empty()))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))
        })
    }
}

#[derive(uniffi::Record)]
pub struct MobileLanguage {
    pub code: String,
    pub label: String,
    pub name: String,
    pub native_name: String,
    pub active: bool,
}

#[derive(uniffi::Record)]
pub struct MobileResponse {
    pub status: u16,
    pub body: String,
}

#[derive(uniffi::Object)]
pub struct ShellMobile {
    shell: AppShell,
    listeners: Mutex<Vec<Subscription>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl ShellMobile {
    /// `files_dir` is the app sandbox; `config/config.toml` under it is
    /// optional. `device_language` is the first language the OS reports;
    /// when absent it is detected here.
    #[uniffi::constructor]
    pub fn new(
        files_dir: String,
        device_language_code: Option<String>,
        secure_store: Arc<dyn MobileSecureStore>,
    ) -> Result<Self, MobileError> {
        #[cfg(target_os = "android")]
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("AppShellRust"),
        );

        let ctx = StandardContext::new(Some(PathBuf::from(files_dir)));
        let config = AppConfig::resolve(&ctx)?;
        let device = match device_language_code {
            Some(code) => LocaleId::from_tag(&code),
            None => device_language(),
        };
        let catalog = LocaleCatalog::bundled().map_err(|e| MobileError::from(e.to_string()))?;
        let store: Arc<dyn CredentialStore> = Arc::new(ForeignStore(secure_store));
        let shell = AppShell::from_parts(config, catalog, device, store)?;

        Ok(Self {
            shell,
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn translate(&self, key: String) -> String {
        self.shell.translation().t(&key)
    }

    pub fn translate_with(&self, key: String, args: HashMap<String, String>) -> String {
        let args: Vec<(&str, &str)> = args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.shell.translation().t_with(&key, &args)
    }

    pub fn translate_count(&self, key: String, count: i64) -> String {
        self.shell.translation().t_count(&key, count)
    }

    pub fn current_language(&self) -> String {
        self.shell.translation().current_language().to_string()
    }

    /// Returns false, changing nothing, for unsupported codes.
    pub fn change_language(&self, language: String) -> bool {
        match LocaleId::from_tag(&language) {
            Some(id) => self.shell.translation().change_language(&id),
            None => false,
        }
    }

    pub fn language_options(&self) -> Vec<MobileLanguage> {
        let t = self.shell.translation();
        let current = t.current_language();
        t.language_options()
            .into_iter()
            .map(|o| MobileLanguage {
                active: o.id == current,
                code: o.id.to_string(),
                label: o.label,
                name: o.name,
                native_name: o.native_name,
            })
            .collect()
    }

    /// The listener stays registered for the lifetime of this object.
    pub fn add_language_listener(&self, listener: Arc<dyn LanguageListener>) {
        let subscription = self
            .shell
            .translation()
            .subscribe(move |l: &LocaleId| listener.on_language_changed(l.to_string()));
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(subscription);
    }

    pub fn api_base_url(&self) -> String {
        self.shell.api().base_url().to_string()
    }

    /// Sends a request through the authenticated client. `body`, when given,
    /// is sent as JSON.
    pub async fn request(
        &self,
        method: String,
        path: String,
        body: Option<String>,
    ) -> Result<MobileResponse, MobileError> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| MobileError::from(e.to_string()))?;
        let api = self.shell.api();
        let is_json = body.is_some();
        let mut req = api.request(method, &path, body.unwrap_or_default())?;
        if is_json {
            req.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let response = api.send(req).await?;
        Ok(MobileResponse {
            status: response.status().as_u16(),
            body: response.text(),
        })
    }
}
