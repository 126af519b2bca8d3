//! Precedence resolution for preference values.
//!
//! ## Read precedence (highest to lowest)
//!
//! 1. Explicit value passed by the caller
//! 2. Session override (skipped for [`Scope::StoreOnly`])
//! 3. Persistent store (skipped for [`Scope::SessionOnly`])
//! 4. Caller-supplied default
//!
//! ## Writes
//!
//! | scope              | session   | store |
//! |--------------------|-----------|-------|
//! | `SessionThenStore` | set       | set   |
//! | `SessionOnly`      | set       | -     |
//! | `StoreOnly`        | -         | set   |
//! | `ClearSession`     | cleared   | -     |

use tracing::{debug, warn};

use super::session::Session;
use super::store::PreferenceStore;
use crate::error::{PreferenceError, PreferenceResult};

/// Which layers a read or write touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    SessionThenStore,
    SessionOnly,
    StoreOnly,
    ClearSession,
}

impl Scope {
    /// Maps the three CLI switches onto a scope.
    ///
    /// `clear_session` wins over everything else. Asking for both
    /// session-only and skip-session has no meaning and is rejected.
    pub fn from_flags(
        session_only: bool,
        skip_session: bool,
        clear_session: bool,
    ) -> PreferenceResult<Self> {
        match (session_only, skip_session, clear_session) {
            (_, _, true) => Ok(Scope::ClearSession),
            (true, true, false) => Err(PreferenceError::ConflictingScope),
            (true, false, false) => Ok(Scope::SessionOnly),
            (false, true, false) => Ok(Scope::StoreOnly),
            (false, false, false) => Ok(Scope::SessionThenStore),
        }
    }
}

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Explicit,
    Session,
    Store,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Explicit => write!(f, "explicit"),
            ValueSource::Session => write!(f, "session"),
            ValueSource::Store => write!(f, "preferences"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved::new(f(self.value), self.source)
    }
}

/// Resolves and writes preferences against a store and a session.
pub struct Resolver<'a> {
    store: &'a dyn PreferenceStore,
    session: &'a mut Session,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn PreferenceStore, session: &'a mut Session) -> Self {
        Self { store, session }
    }

    /// Walks explicit → session → store without a default.
    ///
    /// With [`Scope::ClearSession`] the session entry is dropped first and
    /// the lookup continues against the store.
    pub fn lookup(
        &mut self,
        name: &str,
        explicit: Option<&str>,
        scope: Scope,
    ) -> Option<Resolved<String>> {
        if let Some(value) = explicit.filter(|v| !v.trim().is_empty()) {
            return Some(Resolved::new(value.to_string(), ValueSource::Explicit));
        }

        if scope == Scope::ClearSession {
            self.session.clear(name);
        }

        if matches!(scope, Scope::SessionThenStore | Scope::SessionOnly) {
            if let Some(value) = self.session.get(name) {
                return Some(Resolved::new(value.to_string(), ValueSource::Session));
            }
        }

        if scope == Scope::SessionOnly {
            return None;
        }

        match self.store.get(name) {
            Ok(Some(value)) => Some(Resolved::new(value, ValueSource::Store)),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read preference {}: {}", name, e);
                None
            }
        }
    }

    /// Like [`Resolver::lookup`], falling back to `default`.
    pub fn resolve(
        &mut self,
        name: &str,
        explicit: Option<&str>,
        scope: Scope,
        default: impl FnOnce() -> String,
    ) -> Resolved<String> {
        self.lookup(name, explicit, scope)
            .unwrap_or_else(|| Resolved::new(default(), ValueSource::Default))
    }

    /// Writes `value` according to `scope`.
    ///
    /// `value` may only be omitted when clearing the session.
    pub fn apply(&mut self, name: &str, value: Option<&str>, scope: Scope) -> PreferenceResult<()> {
        if scope == Scope::ClearSession {
            let existed = self.session.clear(name);
            debug!("Cleared session value for {} (present: {})", name, existed);
            return Ok(());
        }

        let value = value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PreferenceError::MissingValue {
                parameter: name.to_string(),
            })?;

        if scope != Scope::SessionOnly {
            self.store.set(name, value)?;
            debug!("Persisted preference {}", name);
        }

        if scope != Scope::StoreOnly {
            self.session.set(name, value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::store::SqlitePreferenceStore;
    use tempfile::{tempdir, TempDir};

    struct FailingStore;

    impl PreferenceStore for FailingStore {
        fn get(&self, _name: &str) -> PreferenceResult<Option<String>> {
            Err(PreferenceError::Io(std::io::Error::other("store offline")))
        }

        fn set(&self, _name: &str, _value: &str) -> PreferenceResult<()> {
            Err(PreferenceError::Io(std::io::Error::other("store offline")))
        }

        fn entries(&self) -> PreferenceResult<Vec<(String, String)>> {
            Ok(Vec::new())
        }
    }

    fn temp_store() -> (TempDir, SqlitePreferenceStore) {
        let dir = tempdir().unwrap();
        let store = SqlitePreferenceStore::new(dir.path().join("prefs.db"));
        (dir, store)
    }

    fn fallback() -> String {
        "English".to_string()
    }

    #[test]
    fn test_scope_from_flags() {
        assert_eq!(Scope::from_flags(false, false, false).unwrap(), Scope::SessionThenStore);
        assert_eq!(Scope::from_flags(true, false, false).unwrap(), Scope::SessionOnly);
        assert_eq!(Scope::from_flags(false, true, false).unwrap(), Scope::StoreOnly);
        assert_eq!(Scope::from_flags(true, true, true).unwrap(), Scope::ClearSession);
        assert!(matches!(
            Scope::from_flags(true, true, false),
            Err(PreferenceError::ConflictingScope)
        ));
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        resolver.apply("AIMetaLanguage", Some("Dutch"), Scope::SessionThenStore).unwrap();
        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::SessionThenStore, fallback);

        assert_eq!(resolved.value, "Dutch");
        assert_eq!(resolved.source, ValueSource::Session);
        assert_eq!(store.get("AIMetaLanguage").unwrap().as_deref(), Some("Dutch"));
    }

    #[test]
    fn test_explicit_value_wins() {
        let (_dir, store) = temp_store();
        store.set("AIMetaLanguage", "German").unwrap();
        let mut session = Session::new();
        session.set("AIMetaLanguage", "Y");
        let mut resolver = Resolver::new(&store, &mut session);

        let resolved =
            resolver.resolve("AIMetaLanguage", Some("X"), Scope::SessionThenStore, fallback);
        assert_eq!(resolved, Resolved::new("X".to_string(), ValueSource::Explicit));
    }

    #[test]
    fn test_blank_explicit_value_is_ignored() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        let resolved =
            resolver.resolve("AIMetaLanguage", Some(""), Scope::SessionThenStore, fallback);
        assert_eq!(resolved.source, ValueSource::Default);
    }

    #[test]
    fn test_clear_session_falls_through_to_store() {
        let (_dir, store) = temp_store();
        store.set("AIMetaLanguage", "German").unwrap();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        resolver.apply("AIMetaLanguage", Some("Dutch"), Scope::SessionOnly).unwrap();
        resolver.apply("AIMetaLanguage", None, Scope::ClearSession).unwrap();
        // clearing twice is fine
        resolver.apply("AIMetaLanguage", None, Scope::ClearSession).unwrap();

        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::SessionThenStore, fallback);
        assert_eq!(resolved, Resolved::new("German".to_string(), ValueSource::Store));
    }

    #[test]
    fn test_clear_session_read_drops_override() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        session.set("AIMetaLanguage", "Dutch");
        let mut resolver = Resolver::new(&store, &mut session);

        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::ClearSession, fallback);
        assert_eq!(resolved.source, ValueSource::Default);
        assert!(session.get("AIMetaLanguage").is_none());
    }

    #[test]
    fn test_session_only_write_is_not_persisted() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        resolver.apply("AIMetaLanguage", Some("Dutch"), Scope::SessionOnly).unwrap();
        assert_eq!(store.get("AIMetaLanguage").unwrap(), None);

        // a fresh session only sees the store
        let mut fresh = Session::new();
        let mut resolver = Resolver::new(&store, &mut fresh);
        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::SessionThenStore, fallback);
        assert_eq!(resolved.value, "English");
    }

    #[test]
    fn test_skip_session_read_ignores_override() {
        let (_dir, store) = temp_store();
        store.set("AIMetaLanguage", "German").unwrap();
        let mut session = Session::new();
        session.set("AIMetaLanguage", "Dutch");
        let mut resolver = Resolver::new(&store, &mut session);

        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::StoreOnly, fallback);
        assert_eq!(resolved.value, "German");
    }

    #[test]
    fn test_skip_session_write_leaves_session_alone() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        session.set("AIMetaLanguage", "Dutch");
        let mut resolver = Resolver::new(&store, &mut session);

        resolver.apply("AIMetaLanguage", Some("German"), Scope::StoreOnly).unwrap();

        assert_eq!(session.get("AIMetaLanguage"), Some("Dutch"));
        assert_eq!(store.get("AIMetaLanguage").unwrap().as_deref(), Some("German"));
    }

    #[test]
    fn test_session_only_read_skips_store() {
        let (_dir, store) = temp_store();
        store.set("AIMetaLanguage", "German").unwrap();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        assert!(resolver.lookup("AIMetaLanguage", None, Scope::SessionOnly).is_none());
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let (_dir, store) = temp_store();
        let mut session = Session::new();
        let mut resolver = Resolver::new(&store, &mut session);

        let err = resolver.apply("AIMetaLanguage", None, Scope::SessionThenStore).unwrap_err();
        assert!(matches!(
            err,
            PreferenceError::MissingValue { ref parameter } if parameter == "AIMetaLanguage"
        ));
    }

    #[test]
    fn test_store_read_failure_is_a_miss() {
        let mut session = Session::new();
        let mut resolver = Resolver::new(&FailingStore, &mut session);

        let resolved = resolver.resolve("AIMetaLanguage", None, Scope::SessionThenStore, fallback);
        assert_eq!(resolved, Resolved::new("English".to_string(), ValueSource::Default));
    }

    #[test]
    fn test_store_write_failure_propagates() {
        let mut session = Session::new();
        let mut resolver = Resolver::new(&FailingStore, &mut session);

        assert!(resolver.apply("AIMetaLanguage", Some("Dutch"), Scope::SessionThenStore).is_err());
        // nothing mirrored when the store rejected the write
        assert!(session.get("AIMetaLanguage").is_none());
    }
}
