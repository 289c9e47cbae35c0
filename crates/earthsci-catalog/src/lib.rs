//! Catalog browsing support for EarthSci.
//!
//! A catalog is a read-only tree of datasets and the layers they offer. This
//! crate keeps a catalog and the layer tree of `earthsci-core` in step:
//!
//! - **Catalog Tree**: an arena of [`CatalogEntry`] values addressed by
//!   [`CatalogId`]
//! - **Sync Controller**: existence queries, structure-preserving insertion
//!   and removal with empty-folder pruning
//! - **Preferences**: the sticky always/never/ask answers that gate the
//!   controller, persisted as TOML or JSON
//!
//! # Example
//!
//! ```
//! use earthsci_catalog::{CatalogEntry, CatalogTree, SyncController};
//! use earthsci_core::LayerTree;
//! use url::Url;
//!
//! let mut catalog = CatalogTree::new(CatalogEntry::folder("Catalogs"));
//! let gebco = Url::parse("https://example.com/gebco.xml").unwrap();
//! let layer = catalog
//!     .add(catalog.root(), CatalogEntry::layer("Gebco", gebco.clone(), None))
//!     .unwrap();
//!
//! let tree = LayerTree::new();
//! let controller = SyncController::new(tree.clone());
//! controller.add_to_layer_model(&catalog, &[layer]).unwrap();
//!
//! assert!(controller.exists_in_layer_model(&gebco));
//! assert_eq!(controller.decorate_text("Gebco", &catalog, layer).as_deref(), Some("Gebco*"));
//! ```

pub mod catalog;
pub mod controller;
mod error;
pub mod insert;
pub mod preferences;

pub use catalog::{CatalogEntry, CatalogId, CatalogTree, LayerInfo};
pub use controller::{SyncController, SyncControllerBuilder};
pub use error::{CatalogError, Result};
pub use insert::{CatalogLayerInserter, LayerInserter};
pub use preferences::{
    CatalogPreferences, PolicyGate, PolicyResolver, PreferenceStore, PreferencesFormat,
    PromptPolicyResolver, SharedPreferences, UserActionPreference,
};

/// Tracing targets used by this crate.
pub mod targets {
    /// Catalog to layer tree synchronization.
    pub const SYNC: &str = "earthsci_catalog::sync";
    /// Preference loading, saving and gate resolution.
    pub const PREFERENCES: &str = "earthsci_catalog::preferences";
}
