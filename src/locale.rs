// File: ./src/locale.rs
//! Locale identifiers and the static translation tables behind them.
//!
//! Tables are JSON objects, one per locale. Nested objects flatten into
//! dotted keys, so `{"tabs": {"home": "Home"}}` is looked up as `tabs.home`.
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

const BUNDLED: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.json")),
    ("fr", include_str!("../locales/fr.json")),
];

#[derive(Debug)]
pub enum LocaleError {
    InvalidId(String),
    InvalidJson { locale: String, message: String },
    EmptyCatalog,
    UnknownFallback(LocaleId),
}

impl fmt::Display for LocaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleError::InvalidId(raw) => write!(f, "Invalid locale identifier '{}'", raw),
            LocaleError::InvalidJson { locale, message } => {
                write!(f, "Invalid translation table for '{}': {}", locale, message)
            }
            LocaleError::EmptyCatalog => write!(f, "No locale registered"),
            LocaleError::UnknownFallback(id) => {
                write!(f, "Fallback locale '{}' is not registered", id)
            }
        }
    }
}

impl std::error::Error for LocaleError {}

/// A short, lowercase language code such as `en` or `fr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleId(String);

impl LocaleId {
    /// Extracts the language subtag from an OS or BCP-47 style tag:
    /// `fr-FR`, `fr_FR.UTF-8` and `FR` all give `fr`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lang = tag
            .trim()
            .split(['-', '_', '.', '@'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        // "C" and "POSIX" carry no language.
        if lang.is_empty() || lang == "c" || lang == "posix" {
            return None;
        }
        if !lang.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self(lang))
    }

    pub fn parse(tag: &str) -> Result<Self, LocaleError> {
        Self::from_tag(tag).ok_or_else(|| LocaleError::InvalidId(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocaleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for LocaleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Immutable key -> display string mapping for one locale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleTable {
    entries: HashMap<String, String>,
}

impl LocaleTable {
    pub fn from_json(locale: &str, json: &str) -> Result<Self, LocaleError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| LocaleError::InvalidJson {
                locale: locale.to_string(),
                message: e.to_string(),
            })?;
        let Value::Object(map) = value else {
            return Err(LocaleError::InvalidJson {
                locale: locale.to_string(),
                message: "top level must be an object".to_string(),
            });
        };

        let mut entries = HashMap::new();
        for (key, value) in map {
            flatten_into(&mut entries, locale, key, value);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocaleTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn flatten_into(out: &mut HashMap<String, String>, locale: &str, key: String, value: Value) {
    match value {
        Value::String(s) => {
            out.insert(key, s);
        }
        Value::Object(children) => {
            for (child, v) in children {
                flatten_into(out, locale, format!("{}.{}", key, child), v);
            }
        }
        other => {
            log::warn!(
                "Skipping non-string translation '{}' in locale '{}': {}",
                key,
                locale,
                other
            );
        }
    }
}

/// The fixed set of supported locales and their tables.
///
/// Registration order is kept; it is the order a language switcher shows.
#[derive(Debug, Clone, Default)]
pub struct LocaleCatalog {
    tables: Vec<(LocaleId, LocaleTable)>,
}

impl LocaleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The locales compiled into the binary.
    pub fn bundled() -> Result<Self, LocaleError> {
        BUNDLED
            .iter()
            .try_fold(Self::new(), |catalog, (id, json)| catalog.with_json(id, json))
    }

    /// Registers `table` under `id`, replacing an earlier table with the same id.
    pub fn with_table(mut self, id: LocaleId, table: LocaleTable) -> Self {
        if let Some(slot) = self.tables.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = table;
        } else {
            self.tables.push((id, table));
        }
        self
    }

    pub fn with_json(self, id: &str, json: &str) -> Result<Self, LocaleError> {
        let locale = LocaleId::parse(id)?;
        let table = LocaleTable::from_json(locale.as_str(), json)?;
        Ok(self.with_table(locale, table))
    }

    pub fn contains(&self, id: &LocaleId) -> bool {
        self.table(id).is_some()
    }

    pub fn table(&self, id: &LocaleId) -> Option<&LocaleTable> {
        self.tables.iter().find(|(l, _)| l == id).map(|(_, t)| t)
    }

    pub fn ids(&self) -> impl Iterator<Item = &LocaleId> {
        self.tables.iter().map(|(l, _)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocaleId, &LocaleTable)> {
        self.tables.iter().map(|(l, t)| (l, t))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// The device's preferred language. Only the first locale the OS reports is
/// considered.
pub fn device_language() -> Option<LocaleId> {
    let first = sys_locale::get_locales().next()?;
    let id = LocaleId::from_tag(&first);
    log::debug!("Device locale '{}' -> {:?}", first, id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_extracts_language_subtag() {
        assert_eq!(LocaleId::from_tag("fr-FR").unwrap(), "fr");
        assert_eq!(LocaleId::from_tag("fr_FR.UTF-8").unwrap(), "fr");
        assert_eq!(LocaleId::from_tag("EN").unwrap(), "en");
        assert_eq!(LocaleId::from_tag("sr@latin").unwrap(), "sr");
        assert_eq!(LocaleId::from_tag(" de ").unwrap(), "de");
    }

    #[test]
    fn from_tag_rejects_languageless_tags() {
        assert!(LocaleId::from_tag("").is_none());
        assert!(LocaleId::from_tag("C").is_none());
        assert!(LocaleId::from_tag("POSIX").is_none());
        assert!(LocaleId::from_tag("12").is_none());
    }

    #[test]
    fn nested_objects_flatten_to_dotted_keys() {
        let table = LocaleTable::from_json(
            "en",
            r#"{"tabs": {"home": "Home", "explore": {"title": "Explore"}}, "ok": "OK"}"#,
        )
        .unwrap();
        assert_eq!(table.get("tabs.home"), Some("Home"));
        assert_eq!(table.get("tabs.explore.title"), Some("Explore"));
        assert_eq!(table.get("ok"), Some("OK"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn non_string_leaves_are_skipped() {
        let table = LocaleTable::from_json("en", r#"{"n": 3, "list": ["a"], "s": "x"}"#).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("s"), Some("x"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            LocaleTable::from_json("en", "{"),
            Err(LocaleError::InvalidJson { .. })
        ));
        assert!(matches!(
            LocaleTable::from_json("en", r#"["a"]"#),
            Err(LocaleError::InvalidJson { .. })
        ));
    }

    #[test]
    fn re_registering_replaces_the_table_in_place() {
        let catalog = LocaleCatalog::new()
            .with_json("en", r#"{"a": "1"}"#)
            .unwrap()
            .with_json("fr", r#"{"a": "un"}"#)
            .unwrap()
            .with_json("en", r#"{"a": "one"}"#)
            .unwrap();
        let ids: Vec<&str> = catalog.ids().map(LocaleId::as_str).collect();
        assert_eq!(ids, vec!["en", "fr"]);
        let en = LocaleId::parse("en").unwrap();
        assert_eq!(catalog.table(&en).unwrap().get("a"), Some("one"));
    }

    #[test]
    fn bundled_locales_load() {
        let catalog = LocaleCatalog::bundled().unwrap();
        let ids: Vec<&str> = catalog.ids().map(LocaleId::as_str).collect();
        assert_eq!(ids, vec!["en", "fr"]);
    }

    #[test]
    fn bundled_french_covers_every_english_key() {
        let catalog = LocaleCatalog::bundled().unwrap();
        let en = catalog.table(&LocaleId::parse("en").unwrap()).unwrap();
        let fr = catalog.table(&LocaleId::parse("fr").unwrap()).unwrap();
        let missing: Vec<&str> = en.keys().filter(|k| !fr.contains_key(k)).collect();
        assert!(missing.is_empty(), "fr is missing keys: {:?}", missing);
    }
}
