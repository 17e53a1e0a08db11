// Crate root library declaration and module exports.
pub mod client;
pub mod config;
pub mod context;
pub mod i18n;
pub mod language;
pub mod locale;
pub mod secure_store;
pub mod shell;

// --- ANDROID / IOS SUPPORT ---
#[cfg(feature = "mobile")]
pub mod mobile;

#[cfg(feature = "mobile")]
uniffi::setup_scaffolding!();

pub use crate::language::{AppTranslation, LanguageHandle, LanguageProvider};
pub use crate::locale::LocaleId;
pub use crate::shell::AppShell;
