//! Catalog browser preferences.
//!
//! Two user decisions gate the sync controller: whether adding a catalog
//! node recreates its folder path in the layer tree, and whether removing
//! the last layer of a folder deletes the emptied folders. Each is a sticky
//! three-valued [`UserActionPreference`]; `Ask` defers to a
//! [`PolicyResolver`] every time the decision is needed.
//!
//! # Persistence
//!
//! ```no_run
//! use earthsci_catalog::{CatalogPreferences, PolicyGate, SharedPreferences, UserActionPreference};
//!
//! let prefs = SharedPreferences::new(CatalogPreferences::load("catalog.toml")?);
//! prefs.set_auto_save("catalog.toml");
//!
//! // Persisted immediately.
//! prefs.set(PolicyGate::DeleteEmptyFolders, UserActionPreference::Always);
//! # Ok::<(), earthsci_catalog::CatalogError>(())
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use earthsci_core::{Prompt, PromptAnswer, Signal};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::targets;

/// A sticky answer to a recurring question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserActionPreference {
    /// Always perform the action.
    Always,
    /// Never perform the action.
    Never,
    /// Ask every time.
    #[default]
    Ask,
}

impl UserActionPreference {
    /// The remembered form of a yes/no answer.
    pub fn from_answer(yes: bool) -> Self {
        if yes { Self::Always } else { Self::Never }
    }

    /// The decision this preference implies, or `None` for `Ask`.
    pub fn decision(self) -> Option<bool> {
        match self {
            Self::Always => Some(true),
            Self::Never => Some(false),
            Self::Ask => None,
        }
    }
}

/// A decision point of the sync controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyGate {
    /// Recreate the catalog folder path when adding a node.
    FullPathRequired,
    /// Delete folders emptied by a removal.
    DeleteEmptyFolders,
}

impl PolicyGate {
    /// Title of the question put to the user.
    pub fn title(self) -> &'static str {
        match self {
            Self::FullPathRequired => "Add node path",
            Self::DeleteEmptyFolders => "Delete empty folders",
        }
    }

    /// The question put to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::FullPathRequired => {
                "Do you want to recreate the catalog folder structure in the layer tree?"
            }
            Self::DeleteEmptyFolders => {
                "Removing these layers leaves empty folders. Do you want to delete them?"
            }
        }
    }
}

/// The persisted preference values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPreferences {
    /// Answer for [`PolicyGate::FullPathRequired`].
    pub add_node_structure_mode: UserActionPreference,
    /// Answer for [`PolicyGate::DeleteEmptyFolders`].
    pub delete_empty_folders_mode: UserActionPreference,
}

/// File formats preferences can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferencesFormat {
    /// JSON.
    Json,
    /// TOML.
    Toml,
}

impl PreferencesFormat {
    /// The format named by the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl CatalogPreferences {
    /// The stored answer for `gate`.
    pub fn get(&self, gate: PolicyGate) -> UserActionPreference {
        match gate {
            PolicyGate::FullPathRequired => self.add_node_structure_mode,
            PolicyGate::DeleteEmptyFolders => self.delete_empty_folders_mode,
        }
    }

    /// Store `value` for `gate`, returning the previous answer.
    pub fn set(&mut self, gate: PolicyGate, value: UserActionPreference) -> UserActionPreference {
        let slot = match gate {
            PolicyGate::FullPathRequired => &mut self.add_node_structure_mode,
            PolicyGate::DeleteEmptyFolders => &mut self.delete_empty_folders_mode,
        };
        std::mem::replace(slot, value)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = PreferencesFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        Self::parse(&content, format, path)
    }

    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(target: targets::PREFERENCES, path = %path.display(), "no preferences file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a `.toml` or `.json` file.
    ///
    /// The file is written atomically using a temporary file and rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.render(PreferencesFormat::from_path(path)?, path)?;
        atomic_write(path, text.as_bytes())
    }

    fn parse(content: &str, format: PreferencesFormat, path: &Path) -> Result<Self> {
        match format {
            PreferencesFormat::Toml => toml::from_str(content).map_err(|source| CatalogError::TomlDe {
                path: path.to_path_buf(),
                source,
            }),
            PreferencesFormat::Json => serde_json::from_str(content).map_err(|source| CatalogError::Json {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn render(&self, format: PreferencesFormat, path: &Path) -> Result<String> {
        match format {
            PreferencesFormat::Toml => Ok(toml::to_string_pretty(self)?),
            PreferencesFormat::Json => serde_json::to_string_pretty(self).map_err(|source| CatalogError::Json {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "preferences".to_string());
    let temp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
        fs::remove_file(&temp_path).ok();
        return Err(CatalogError::io(path, e));
    }
    Ok(())
}

/// Get/set access to the stored gate answers.
pub trait PreferenceStore: Send + Sync {
    /// The stored answer for `gate`.
    fn preference(&self, gate: PolicyGate) -> UserActionPreference;

    /// Store an answer for `gate`.
    fn set_preference(&self, gate: PolicyGate, value: UserActionPreference);
}

/// Thread-safe preferences with change notification and optional auto-save.
pub struct SharedPreferences {
    data: RwLock<CatalogPreferences>,
    changed: Signal<PolicyGate>,
    auto_save: RwLock<Option<PathBuf>>,
}

impl Default for SharedPreferences {
    fn default() -> Self {
        Self::new(CatalogPreferences::default())
    }
}

impl SharedPreferences {
    /// Wrap `preferences`.
    pub fn new(preferences: CatalogPreferences) -> Self {
        Self {
            data: RwLock::new(preferences),
            changed: Signal::new(),
            auto_save: RwLock::new(None),
        }
    }

    /// Signal emitted with the gate whose answer changed.
    pub fn changed(&self) -> &Signal<PolicyGate> {
        &self.changed
    }

    /// Save to `path` after every change.
    pub fn set_auto_save(&self, path: impl Into<PathBuf>) {
        *self.auto_save.write() = Some(path.into());
    }

    /// Stop saving after changes.
    pub fn disable_auto_save(&self) {
        *self.auto_save.write() = None;
    }

    /// Whether auto-save is enabled.
    pub fn is_auto_save_enabled(&self) -> bool {
        self.auto_save.read().is_some()
    }

    /// A copy of the current values.
    pub fn snapshot(&self) -> CatalogPreferences {
        *self.data.read()
    }

    /// The stored answer for `gate`.
    pub fn get(&self, gate: PolicyGate) -> UserActionPreference {
        self.data.read().get(gate)
    }

    /// Store an answer for `gate`, notifying and auto-saving if it changed.
    pub fn set(&self, gate: PolicyGate, value: UserActionPreference) {
        let previous = self.data.write().set(gate, value);
        if previous == value {
            return;
        }
        tracing::debug!(target: targets::PREFERENCES, ?gate, ?previous, ?value, "preference changed");
        self.try_auto_save();
        self.changed.emit(gate);
    }

    /// Save to the auto-save path, if one is set.
    pub fn sync(&self) -> Result<()> {
        let path = self.auto_save.read().clone();
        match path {
            Some(path) => self.snapshot().save(path),
            None => Ok(()),
        }
    }

    fn try_auto_save(&self) {
        if let Err(e) = self.sync() {
            tracing::error!(target: targets::PREFERENCES, "Failed to auto-save preferences: {}", e);
        }
    }
}

impl PreferenceStore for SharedPreferences {
    fn preference(&self, gate: PolicyGate) -> UserActionPreference {
        self.get(gate)
    }

    fn set_preference(&self, gate: PolicyGate, value: UserActionPreference) {
        self.set(gate, value);
    }
}

/// Decides a gate whose stored preference is `Ask`.
pub trait PolicyResolver: Send + Sync {
    /// Produce a decision for `gate`, possibly asking the user.
    fn resolve(&self, gate: PolicyGate) -> PromptAnswer;
}

impl<F> PolicyResolver for F
where
    F: Fn(PolicyGate) -> PromptAnswer + Send + Sync,
{
    fn resolve(&self, gate: PolicyGate) -> PromptAnswer {
        self(gate)
    }
}

/// Resolves gates by asking a [`Prompt`] a yes/no question.
pub struct PromptPolicyResolver {
    prompt: Arc<dyn Prompt>,
}

impl PromptPolicyResolver {
    /// Ask through `prompt`.
    pub fn new(prompt: Arc<dyn Prompt>) -> Self {
        Self { prompt }
    }
}

impl PolicyResolver for PromptPolicyResolver {
    fn resolve(&self, gate: PolicyGate) -> PromptAnswer {
        self.prompt.ask_yes_no(gate.title(), gate.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earthsci_core::AutoPrompt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults_ask() {
        let prefs = CatalogPreferences::default();
        assert_eq!(prefs.get(PolicyGate::FullPathRequired), UserActionPreference::Ask);
        assert_eq!(prefs.get(PolicyGate::DeleteEmptyFolders), UserActionPreference::Ask);
        assert_eq!(UserActionPreference::Ask.decision(), None);
        assert_eq!(UserActionPreference::from_answer(true), UserActionPreference::Always);
    }

    #[test]
    fn test_toml_shape() {
        let mut prefs = CatalogPreferences::default();
        prefs.set(PolicyGate::DeleteEmptyFolders, UserActionPreference::Never);
        let text = toml::to_string_pretty(&prefs).unwrap();
        assert!(text.contains("delete_empty_folders_mode = \"never\""));
        assert!(text.contains("add_node_structure_mode = \"ask\""));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let prefs: CatalogPreferences = toml::from_str("add_node_structure_mode = \"always\"").unwrap();
        assert_eq!(prefs.add_node_structure_mode, UserActionPreference::Always);
        assert_eq!(prefs.delete_empty_folders_mode, UserActionPreference::Ask);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(PreferencesFormat::from_path(Path::new("a/b.TOML")).unwrap(), PreferencesFormat::Toml);
        assert_eq!(PreferencesFormat::from_path(Path::new("b.json")).unwrap(), PreferencesFormat::Json);
        assert!(matches!(
            PreferencesFormat::from_path(Path::new("b.ini")),
            Err(CatalogError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_changed_signal_only_on_change() {
        let prefs = SharedPreferences::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        prefs.changed().connect(move |gate| {
            assert_eq!(*gate, PolicyGate::FullPathRequired);
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        prefs.set(PolicyGate::FullPathRequired, UserActionPreference::Always);
        prefs.set(PolicyGate::FullPathRequired, UserActionPreference::Always);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(prefs.preference(PolicyGate::FullPathRequired), UserActionPreference::Always);
    }

    #[test]
    fn test_prompt_resolver_asks_prompt() {
        let prompt = Arc::new(AutoPrompt::new(PromptAnswer::remembered(true)));
        let resolver = PromptPolicyResolver::new(prompt.clone());
        assert_eq!(resolver.resolve(PolicyGate::DeleteEmptyFolders), PromptAnswer::remembered(true));
        assert_eq!(prompt.asked(), 1);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |gate: PolicyGate| PromptAnswer::once(gate == PolicyGate::FullPathRequired);
        assert!(resolver.resolve(PolicyGate::FullPathRequired).yes);
        assert!(!resolver.resolve(PolicyGate::DeleteEmptyFolders).yes);
    }
}
