//! Templar - template expression engine for declarative configuration
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌────────┐   ┌───────────┐
//! │ config tree  │──▶│ scanner │──▶│ parser │──▶│ evaluator │◀── helpers
//! │ (YAML/JSON)  │   └─────────┘   └────────┘   └─────┬─────┘
//! └──────┬───────┘                                    │ resolve(path)
//!        │                                      ┌─────▼─────┐
//!        │ $merge / $concat / $forEach          │  context  │
//!        ▼                                      └───────────┘
//! ┌──────────────┐     ┌────────────┐     ┌─────────┐
//! │  structure   │     │ references │     │ secrets │
//! └──────────────┘     └────────────┘     └─────────┘
//! ```
//!
//! Resolution is synchronous and allocation-local: contexts are read-only
//! during a pass and nothing is cached between template strings.

pub mod config;
pub mod context;
pub mod error;
pub mod helpers;
pub mod references;
pub mod secrets;
pub mod structure;
pub mod template;

pub use config::TemplarConfig;
pub use context::{
    ConfigContext, ContextEntry, ContextError, GenericContext, LayeredContext, NestedContext,
    ScopedContext,
};
pub use error::{FixSuggestion, Result, TemplarError};
pub use helpers::{HelperRegistry, HELPERS};
pub use references::{
    collect_template_references, get_action_template_references, ActionKind, ActionReference,
};
pub use secrets::{throw_on_missing_secret_keys, NamedConfig};
pub use structure::resolve_template_struct;
pub use template::{resolve_template_string, ResolveOptions};
