//! # offsite-renderer
//!
//! Tera-based rendering of the sync tool configuration file from two
//! [`ConnectionProfile`](offsite_core::ConnectionProfile)s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use offsite_core::{ConnectionProfile, SecretBundle, settings::SyncToolSettings};
//! use offsite_renderer::{ConfigContext, TemplateEngine};
//!
//! fn render(bundle: &SecretBundle) {
//!     let settings = SyncToolSettings::default();
//!     let Ok((source, destination)) = ConnectionProfile::pair_from_bundle(bundle) else {
//!         return;
//!     };
//!     if let (Ok(ctx), Ok(engine)) = (
//!         ConfigContext::new(&source, &destination, &settings),
//!         TemplateEngine::new(None),
//!     ) {
//!         if let Ok(text) = engine.render_sync_config(&ctx) {
//!             println!("{} bytes", text.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{ConfigContext, ProfileCtx};
pub use engine::{TemplateEngine, SYNC_CONFIG_TEMPLATE};
pub use error::RenderError;
