// File: ./src/i18n.rs
//! Localization engine: lookup with fallback, runtime locale switching.
//!
//! Translations resolve in three steps and never fail: the selected locale's
//! table, then the fallback locale's table, then the key itself.
use crate::locale::{LocaleCatalog, LocaleError, LocaleId};
use rust_i18n::{Backend, SimpleBackend};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// One entry of a language picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageOption {
    pub id: LocaleId,
    /// Short uppercase label, e.g. `EN`.
    pub label: String,
    /// English name of the language.
    pub name: String,
    /// The language's name for itself.
    pub native_name: String,
}

pub struct Localizer {
    backend: SimpleBackend,
    locales: Vec<LocaleId>,
    fallback: LocaleId,
    current: RwLock<LocaleId>,
}

impl fmt::Debug for Localizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Localizer")
            .field("locales", &self.locales)
            .field("fallback", &self.fallback)
            .field("current", &self.current_locale())
            .finish()
    }
}

impl Localizer {
    /// Registers every table of `catalog` and selects `initial` when it is
    /// registered, `fallback` otherwise.
    pub fn new(
        catalog: LocaleCatalog,
        initial: Option<LocaleId>,
        fallback: LocaleId,
    ) -> Result<Self, LocaleError> {
        if catalog.is_empty() {
            return Err(LocaleError::EmptyCatalog);
        }
        if !catalog.contains(&fallback) {
            return Err(LocaleError::UnknownFallback(fallback));
        }

        let mut backend = SimpleBackend::new();
        for (id, table) in catalog.iter() {
            let data: HashMap<&str, &str> = table.iter().collect();
            backend.add_translations(id.as_str(), &data);
        }

        let selected = match initial {
            Some(id) if catalog.contains(&id) => id,
            Some(id) => {
                log::info!(
                    "Locale '{}' is not supported, falling back to '{}'",
                    id,
                    fallback
                );
                fallback.clone()
            }
            None => fallback.clone(),
        };

        Ok(Self {
            backend,
            locales: catalog.ids().cloned().collect(),
            fallback,
            current: RwLock::new(selected),
        })
    }

    pub fn current_locale(&self) -> LocaleId {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fallback_locale(&self) -> &LocaleId {
        &self.fallback
    }

    pub fn locales(&self) -> &[LocaleId] {
        &self.locales
    }

    pub fn is_supported(&self, id: &LocaleId) -> bool {
        self.locales.contains(id)
    }

    /// Switches to `id` if it is registered. Returns `false`, changing
    /// nothing, otherwise.
    pub fn set_locale(&self, id: &LocaleId) -> bool {
        if !self.is_supported(id) {
            log::debug!("Ignoring unsupported locale '{}'", id);
            return false;
        }
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if *current != *id {
            log::debug!("Locale changed: {} -> {}", &*current, id);
            *current = id.clone();
        }
        true
    }

    pub fn translate(&self, key: &str) -> String {
        self.translate_in(&self.current_locale(), key)
    }

    pub fn translate_in(&self, locale: &LocaleId, key: &str) -> String {
        self.lookup(locale, key).unwrap_or_else(|| key.to_string())
    }

    /// Like [`Localizer::translate`], substituting `%{name}` placeholders.
    /// Values are inserted as-is.
    pub fn translate_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.translate_with_in(&self.current_locale(), key, args)
    }

    pub fn translate_with_in(&self, locale: &LocaleId, key: &str, args: &[(&str, &str)]) -> String {
        interpolate(&self.translate_in(locale, key), args)
    }

    /// Picks `key_one` or `key_other` according to the current locale's
    /// plural rule and substitutes `%{count}`. Falls back to plain `key`.
    pub fn translate_count(&self, key: &str, count: i64) -> String {
        self.translate_count_in(&self.current_locale(), key, count)
    }

    pub fn translate_count_in(&self, locale: &LocaleId, key: &str, count: i64) -> String {
        let plural_key = format!("{}_{}", key, plural_category(locale, count));
        let text = self
            .lookup(locale, &plural_key)
            .or_else(|| self.lookup(locale, key))
            .unwrap_or_else(|| key.to_string());
        interpolate(&text, &[("count", &count.to_string())])
    }

    pub fn language_options(&self) -> Vec<LanguageOption> {
        self.locales.iter().map(language_option).collect()
    }

    fn lookup(&self, locale: &LocaleId, key: &str) -> Option<String> {
        self.backend
            .translate(locale.as_str(), key)
            .or_else(|| self.backend.translate(self.fallback.as_str(), key))
            .map(|s| s.to_string())
    }
}

fn plural_category(locale: &LocaleId, count: i64) -> &'static str {
    let singular = match locale.as_str() {
        // French and Portuguese count zero as singular.
        "fr" | "pt" => count.abs() <= 1,
        _ => count.abs() == 1,
    };
    if singular { "one" } else { "other" }
}

/// Substitutes `%{name}` placeholders in one pass over `template`, so
/// inserted values are never scanned again. Unknown placeholders stay as-is.
fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match args.iter().find(|(n, _)| *n == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn language_option(id: &LocaleId) -> LanguageOption {
    let label = id.as_str().to_ascii_uppercase();
    match isolang::Language::from_639_1(id.as_str()) {
        Some(lang) => LanguageOption {
            id: id.clone(),
            label,
            name: lang.to_name().to_string(),
            native_name: lang
                .to_autonym()
                .map(str::to_string)
                .unwrap_or_else(|| lang.to_name().to_string()),
        },
        None => LanguageOption {
            id: id.clone(),
            name: label.clone(),
            native_name: label.clone(),
            label,
        },
    }
}
