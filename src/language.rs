// File: ./src/language.rs
/*! Language state shared by the UI, and the provider that keeps it in step
with the localization engine.

- `LanguageState` holds the selected locale and notifies observers
  synchronously on change. Writers are serialized and the value is swapped
  before anyone is notified, so an observer only ever sees complete values,
  in the order the changes were made.
- `LanguageProvider` owns the `Localizer` together with the state.
  `change_language` switches both or neither.
- `LanguageHandle` is what UI code is handed. It does not keep the provider
  alive; building an `AppTranslation` from a handle whose provider is gone is
  a wiring bug and panics.

Observers run on the caller's thread while the change is in progress. They
may read the state and translate, but must not change the language
themselves (that would deadlock).
*/

use crate::i18n::{LanguageOption, Localizer};
use crate::locale::LocaleId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::watch;

/// Receives every locale change.
pub trait LocaleObserver: Send + Sync {
    fn locale_changed(&self, locale: &LocaleId);
}

impl<F> LocaleObserver for F
where
    F: Fn(&LocaleId) + Send + Sync,
{
    fn locale_changed(&self, locale: &LocaleId) {
        self(locale)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct StateInner {
    current: RwLock<LocaleId>,
    writer: Mutex<()>,
    observers: Mutex<Vec<(u64, Arc<dyn LocaleObserver>)>>,
    next_id: AtomicU64,
    watch: watch::Sender<LocaleId>,
}

/// Observable holder of the selected locale.
///
/// Cloning gives another handle to the same value.
#[derive(Clone)]
pub struct LanguageState {
    inner: Arc<StateInner>,
}

impl std::fmt::Debug for LanguageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageState")
            .field("current", &self.get())
            .field("observers", &lock(&self.inner.observers).len())
            .finish()
    }
}

impl LanguageState {
    pub fn new(initial: LocaleId) -> Self {
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(StateInner {
                current: RwLock::new(initial),
                writer: Mutex::new(()),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                watch: tx,
            }),
        }
    }

    pub fn get(&self) -> LocaleId {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores `id` and notifies every observer before returning. Setting the
    /// value it already holds notifies nobody.
    pub fn set(&self, id: LocaleId) {
        self.set_if(id, |_| true);
    }

    /// Stores `id` only if `accept` agrees. `accept` runs while the value is
    /// locked, so a paired side effect (switching the engine) happens in the
    /// same step as the store.
    pub(crate) fn set_if(&self, id: LocaleId, accept: impl FnOnce(&LocaleId) -> bool) -> bool {
        let _writer = lock(&self.inner.writer);
        {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !accept(&id) {
                return false;
            }
            if *current == id {
                return true;
            }
            *current = id.clone();
        }

        let observers: Vec<Arc<dyn LocaleObserver>> = lock(&self.inner.observers)
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        log::debug!("Language set to '{}', notifying {} observer(s)", id, observers.len());
        for observer in observers {
            observer.locale_changed(&id);
        }
        self.inner.watch.send_replace(id);
        true
    }

    /// Registers `observer` until the returned guard is dropped.
    pub fn subscribe(&self, observer: impl LocaleObserver + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.observers).push((id, Arc::new(observer)));
        Subscription {
            id,
            state: Arc::downgrade(&self.inner),
        }
    }

    /// Async view of the value, for consumers that poll from a runtime.
    pub fn watch(&self) -> watch::Receiver<LocaleId> {
        self.inner.watch.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }
}

/// Keeps an observer registered. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    state: Weak<StateInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state.observers).retain(|(id, _)| *id != self.id);
        }
    }
}

struct ProviderInner {
    localizer: Localizer,
    state: LanguageState,
}

impl ProviderInner {
    fn change_language(&self, id: &LocaleId) -> bool {
        self.state
            .set_if(id.clone(), |id| self.localizer.set_locale(id))
    }
}

/// Owner of the language state for the lifetime of the UI.
pub struct LanguageProvider {
    inner: Arc<ProviderInner>,
}

impl LanguageProvider {
    /// The initial state is whatever locale `localizer` selected at startup.
    pub fn new(localizer: Localizer) -> Self {
        let state = LanguageState::new(localizer.current_locale());
        Self {
            inner: Arc::new(ProviderInner { localizer, state }),
        }
    }

    /// Switches the engine and the state together. Unsupported ids change
    /// neither and return `false`.
    pub fn change_language(&self, id: &LocaleId) -> bool {
        self.inner.change_language(id)
    }

    pub fn current_language(&self) -> LocaleId {
        self.inner.state.get()
    }

    /// The locale the engine has selected. Always equal to
    /// [`LanguageProvider::current_language`] once a change call returns.
    pub fn engine_language(&self) -> LocaleId {
        self.inner.localizer.current_locale()
    }

    pub fn handle(&self) -> LanguageHandle {
        LanguageHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn translation(&self) -> AppTranslation {
        AppTranslation {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for LanguageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageProvider")
            .field("state", &self.inner.state)
            .field("localizer", &self.inner.localizer)
            .finish()
    }
}

/// A non-owning reference to a `LanguageProvider`, handed to UI code.
#[derive(Clone, Debug)]
pub struct LanguageHandle {
    inner: Weak<ProviderInner>,
}

impl LanguageHandle {
    /// `None` once the provider has been dropped.
    pub fn try_translation(&self) -> Option<AppTranslation> {
        self.inner.upgrade().map(|inner| AppTranslation { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// What presentation code sees: translate, read and change the language.
#[derive(Clone)]
pub struct AppTranslation {
    inner: Arc<ProviderInner>,
}

impl AppTranslation {
    /// # Panics
    ///
    /// If the provider behind `handle` no longer exists.
    pub fn new(handle: &LanguageHandle) -> Self {
        handle
            .try_translation()
            .expect("AppTranslation must be used within a LanguageProvider")
    }

    /// Translates `key` in the current language.
    pub fn t(&self, key: &str) -> String {
        self.inner
            .localizer
            .translate_in(&self.inner.state.get(), key)
    }

    pub fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.inner
            .localizer
            .translate_with_in(&self.inner.state.get(), key, args)
    }

    pub fn t_count(&self, key: &str, count: i64) -> String {
        self.inner
            .localizer
            .translate_count_in(&self.inner.state.get(), key, count)
    }

    pub fn current_language(&self) -> LocaleId {
        self.inner.state.get()
    }

    pub fn change_language(&self, id: &LocaleId) -> bool {
        self.inner.change_language(id)
    }

    pub fn is_supported(&self, id: &LocaleId) -> bool {
        self.inner.localizer.is_supported(id)
    }

    pub fn language_options(&self) -> Vec<LanguageOption> {
        self.inner.localizer.language_options()
    }

    pub fn subscribe(&self, observer: impl LocaleObserver + 'static) -> Subscription {
        self.inner.state.subscribe(observer)
    }

    pub fn watch(&self) -> watch::Receiver<LocaleId> {
        self.inner.state.watch()
    }
}

impl std::fmt::Debug for AppTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppTranslation")
            .field("current", &self.current_language())
            .finish()
    }
}
