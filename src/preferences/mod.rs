//! Preferences facade.
//!
//! Typed get/put over a [`PreferenceStore`], string type-sniffing for values
//! that arrive as text, and the version gate that decides whether a bundle
//! (bundled defaults or a remote campaign) replaces local settings.

pub mod bundle;
pub mod store;

pub use bundle::PreferenceBundle;
pub use store::{JsonFileStore, MemoryStore, PrefValue, PreferenceStore, SharedPreferenceStore};

use std::sync::Arc;

/// Version of the last applied bundle.
pub const PREFERENCES_VERSION: &str = "preferences_version";
/// Reset to `false` whenever a newer bundle is applied.
pub const WELCOME_SCREEN_SHOWN: &str = "welcome_screen_shown";
/// Whether persisted sensor states are restored at startup.
pub const SENSOR_AUTOSTART: &str = "sensor_autostart";
/// Per-install salt for identifier hashing.
pub const PRIVACY_HASH: &str = "privacy_hash";

/// Preference errors.
#[derive(Debug)]
pub enum PreferenceError {
    Io(String),
    Parse(String),
    /// The bundle carries no `preferences_version`
    MissingVersion,
    /// The bundle's version is not an integer
    InvalidVersion(String),
    Network(String),
    /// A background fetch was cancelled before it finished
    Cancelled,
    /// A background fetch was requested outside an async runtime
    NoRuntime,
}

impl std::fmt::Display for PreferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreferenceError::Io(e) => write!(f, "IO error: {e}"),
            PreferenceError::Parse(e) => write!(f, "Parse error: {e}"),
            PreferenceError::MissingVersion => {
                write!(f, "Bundle has no {PREFERENCES_VERSION} entry")
            }
            PreferenceError::InvalidVersion(v) => write!(f, "Invalid bundle version '{v}'"),
            PreferenceError::Network(e) => write!(f, "Network error: {e}"),
            PreferenceError::Cancelled => write!(f, "Fetch cancelled"),
            PreferenceError::NoRuntime => write!(f, "No async runtime to run the fetch on"),
        }
    }
}

impl std::error::Error for PreferenceError {}

/// Result of offering a bundle to the version gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
    /// Every entry was written.
    Applied { version: i32, keys: usize },
    /// The bundle was not newer than what is stored; nothing was written.
    Stale { offered: i32, stored: i32 },
}

/// Typed facade over a shared store.
#[derive(Clone)]
pub struct Preferences {
    store: SharedPreferenceStore,
}

impl Preferences {
    pub fn new(store: SharedPreferenceStore) -> Self {
        Self { store }
    }

    /// Preferences over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::shared())
    }

    /// Preferences persisted to a JSON file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PreferenceError> {
        Ok(Self::new(Arc::new(JsonFileStore::open(path)?)))
    }

    pub fn store(&self) -> &SharedPreferenceStore {
        &self.store
    }

    pub fn put_boolean(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.store.put(key, PrefValue::Bool(value))?;
        tracing::debug!("{} boolean {}", key, value);
        Ok(())
    }

    pub fn put_int(&self, key: &str, value: i32) -> Result<(), PreferenceError> {
        self.store.put(key, PrefValue::Int(value))?;
        tracing::debug!("{} int {}", key, value);
        Ok(())
    }

    pub fn put_string(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.store.put(key, PrefValue::Str(value.to_string()))?;
        tracing::debug!("{} string {}", key, value);
        Ok(())
    }

    /// Store a value that arrived as text.
    ///
    /// `"true"`/`"false"` (any case) become booleans, anything that parses as
    /// a 32-bit integer becomes an int, everything else is kept as a string.
    pub fn put_preference(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        tracing::debug!("Setting pref {} to: {}", key, value);
        match sniff(value) {
            PrefValue::Bool(b) => self.put_boolean(key, b),
            PrefValue::Int(i) => self.put_int(key, i),
            PrefValue::Str(s) => self.put_string(key, &s),
        }
    }

    /// Stored boolean, or `default` when absent or of another type.
    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.store.get(key) {
            Some(PrefValue::Bool(b)) => b,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        match self.store.get(key) {
            Some(PrefValue::Int(i)) => i,
            _ => default,
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.store.get(key) {
            Some(PrefValue::Str(s)) => s,
            _ => default.to_string(),
        }
    }

    /// Version of the last applied bundle, 0 if none.
    pub fn stored_version(&self) -> i32 {
        self.get_int(PREFERENCES_VERSION, 0)
    }

    /// Whether `bundle` is strictly newer than the stored preferences.
    pub fn newer_prefs_available(&self, bundle: &PreferenceBundle) -> bool {
        bundle.version() > self.stored_version()
    }

    /// Offer a bundle to the version gate.
    ///
    /// All-or-nothing: a newer bundle has every entry written and resets
    /// `welcome_screen_shown`; an older or equal one changes nothing.
    pub fn apply_bundle(&self, bundle: &PreferenceBundle) -> Result<BundleOutcome, PreferenceError> {
        let stored = self.stored_version();
        if bundle.version() <= stored {
            tracing::debug!(
                "Preferences are recent (stored {}, offered {}), not overwriting",
                stored,
                bundle.version()
            );
            return Ok(BundleOutcome::Stale {
                offered: bundle.version(),
                stored,
            });
        }

        tracing::info!(
            "Newer preferences available (stored {}, offered {}), overwriting",
            stored,
            bundle.version()
        );
        for (key, value) in bundle.entries() {
            self.put_preference(key, value)?;
        }
        // The version key may have been spelled differently in the bundle.
        self.put_int(PREFERENCES_VERSION, bundle.version())?;
        self.put_boolean(WELCOME_SCREEN_SHOWN, false)?;

        Ok(BundleOutcome::Applied {
            version: bundle.version(),
            keys: bundle.len(),
        })
    }

    /// Parse a bundle document and offer it to the version gate.
    pub fn load_preferences_str(&self, json: &str) -> Result<BundleOutcome, PreferenceError> {
        let bundle = PreferenceBundle::parse(json)?;
        self.apply_bundle(&bundle)
    }

    /// Apply the bundled default preferences file.
    pub fn load_default_preferences(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<BundleOutcome, PreferenceError> {
        let bundle = PreferenceBundle::from_file(path)?;
        self.apply_bundle(&bundle)
    }

    /// Start fetching a campaign bundle from `url` in the background.
    ///
    /// Fails with [`PreferenceError::NoRuntime`] outside a Tokio runtime;
    /// use [`crate::campaign::BlockingCampaignLoader`] from synchronous code.
    #[cfg(feature = "campaign")]
    pub fn load_campaign_preferences(
        &self,
        config: crate::campaign::CampaignConfig,
    ) -> Result<crate::campaign::CampaignFetch, PreferenceError> {
        crate::campaign::CampaignFetch::spawn(self.clone(), config)
    }

    /// Persisted enable flag for a sensor type.
    pub fn sensor_enabled(&self, type_name: &str) -> bool {
        self.get_boolean(type_name, false)
    }

    pub fn set_sensor_enabled(&self, type_name: &str, enabled: bool) -> Result<(), PreferenceError> {
        self.put_boolean(type_name, enabled)
    }

    /// Whether persisted sensor states should be restored at startup.
    pub fn sensor_autostart(&self) -> bool {
        self.get_boolean(SENSOR_AUTOSTART, true)
    }

    /// The per-install hashing salt, generated and persisted on first use.
    pub fn privacy_salt(&self) -> String {
        let existing = self.get_string(PRIVACY_HASH, "");
        if !existing.is_empty() {
            return existing;
        }
        let salt = uuid::Uuid::new_v4().simple().to_string();
        if let Err(e) = self.put_string(PRIVACY_HASH, &salt) {
            tracing::warn!("Could not persist privacy salt: {}", e);
        }
        salt
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("entries", &self.store.entries().len())
            .finish()
    }
}

/// Classify a textual preference value.
fn sniff(value: &str) -> PrefValue {
    if value.eq_ignore_ascii_case("true") {
        PrefValue::Bool(true)
    } else if value.eq_ignore_ascii_case("false") {
        PrefValue::Bool(false)
    } else if let Ok(i) = value.parse::<i32>() {
        PrefValue::Int(i)
    } else {
        PrefValue::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_preference_sniffs_types() {
        let prefs = Preferences::in_memory();

        prefs.put_preference("flag", "true").unwrap();
        assert!(prefs.get_boolean("flag", false));

        prefs.put_preference("off", "FALSE").unwrap();
        assert!(!prefs.get_boolean("off", true));

        prefs.put_preference("n", "42").unwrap();
        assert_eq!(prefs.get_int("n", 0), 42);

        prefs.put_preference("s", "hello").unwrap();
        assert_eq!(prefs.get_string("s", ""), "hello");
    }

    #[test]
    fn test_sniff_edge_cases() {
        assert_eq!(sniff("-7"), PrefValue::Int(-7));
        // Out of i32 range stays a string.
        assert_eq!(sniff("99999999999"), PrefValue::Str("99999999999".into()));
        assert_eq!(sniff("TrUe"), PrefValue::Bool(true));
        assert_eq!(sniff(" 5"), PrefValue::Str(" 5".into()));
    }

    #[test]
    fn test_getters_fall_back_on_type_mismatch() {
        let prefs = Preferences::in_memory();
        prefs.put_string("k", "text").unwrap();
        assert_eq!(prefs.get_int("k", 9), 9);
        assert!(prefs.get_boolean("k", true));
        assert_eq!(prefs.get_string("missing", "dflt"), "dflt");
    }

    #[test]
    fn test_newer_bundle_applied() {
        let prefs = Preferences::in_memory();
        prefs.put_int(PREFERENCES_VERSION, 3).unwrap();
        prefs.put_boolean(WELCOME_SCREEN_SHOWN, true).unwrap();
        prefs.put_string("upload_url", "old").unwrap();

        let outcome = prefs
            .load_preferences_str(
                r#"[{"upload_url": "new", "upload_interval": "60", "preferences_version": "5"}]"#,
            )
            .unwrap();

        assert_eq!(outcome, BundleOutcome::Applied { version: 5, keys: 3 });
        assert_eq!(prefs.get_string("upload_url", ""), "new");
        assert_eq!(prefs.get_int("upload_interval", 0), 60);
        assert_eq!(prefs.stored_version(), 5);
        assert!(!prefs.get_boolean(WELCOME_SCREEN_SHOWN, true));
    }

    #[test]
    fn test_older_bundle_discarded() {
        let prefs = Preferences::in_memory();
        prefs.put_int(PREFERENCES_VERSION, 3).unwrap();
        prefs.put_boolean(WELCOME_SCREEN_SHOWN, true).unwrap();
        prefs.put_string("upload_url", "old").unwrap();

        let outcome = prefs
            .load_preferences_str(r#"[{"upload_url": "new", "preferences_version": "2"}]"#)
            .unwrap();

        assert_eq!(outcome, BundleOutcome::Stale { offered: 2, stored: 3 });
        assert_eq!(prefs.get_string("upload_url", ""), "old");
        assert_eq!(prefs.stored_version(), 3);
        assert!(prefs.get_boolean(WELCOME_SCREEN_SHOWN, false));
    }

    #[test]
    fn test_equal_version_is_stale() {
        let prefs = Preferences::in_memory();
        prefs.put_int(PREFERENCES_VERSION, 4).unwrap();
        let bundle = PreferenceBundle::parse(r#"[{"preferences_version": "4"}]"#).unwrap();
        assert!(!prefs.newer_prefs_available(&bundle));
    }

    #[test]
    fn test_privacy_salt_is_stable() {
        let prefs = Preferences::in_memory();
        let first = prefs.privacy_salt();
        assert!(!first.is_empty());
        assert_eq!(prefs.privacy_salt(), first);
    }

    #[test]
    fn test_sensor_flags_default_off() {
        let prefs = Preferences::in_memory();
        assert!(!prefs.sensor_enabled("a::B"));
        prefs.set_sensor_enabled("a::B", true).unwrap();
        assert!(prefs.sensor_enabled("a::B"));
        assert!(prefs.sensor_autostart());
    }
}
