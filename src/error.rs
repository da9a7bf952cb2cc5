// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Templar Error Types with Error Codes
//!
//! Error code ranges:
//! - TPL-000-009: Template syntax errors (always fatal)
//! - TPL-010-019: Template resolution errors (missing keys, operand types, helpers)
//! - TPL-020-029: Structural directive errors (`$merge`, `$concat`, `$forEach`)
//! - TPL-030-039: Reference and secret validation errors
//! - TPL-040-049: Config/IO errors

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TemplarError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Display strings are the user-facing messages; `code()` gives the stable
/// identifier used in logs.
#[derive(Error, Debug, Diagnostic)]
#[diagnostic(url(docsrs))]
pub enum TemplarError {
    // ═══════════════════════════════════════════
    // TEMPLATE SYNTAX (000-009)
    // ═══════════════════════════════════════════
    #[error("Invalid template string ({template}): {reason}.")]
    #[diagnostic(
        code(templar::template_parse),
        help("Check that every expression is closed and string literals are quoted")
    )]
    TemplateParse { template: String, reason: String },

    // ═══════════════════════════════════════════
    // TEMPLATE RESOLUTION (010-019)
    // ═══════════════════════════════════════════
    #[error("Invalid template string ({template}): {reason}.")]
    #[diagnostic(
        code(templar::template_resolve),
        help("Check the referenced keys exist in the context, or add a `?` suffix")
    )]
    TemplateResolve {
        template: String,
        reason: String,
        /// True when the failure was a key missing from the context
        missing_key: bool,
    },

    // ═══════════════════════════════════════════
    // STRUCTURAL DIRECTIVES (020-029)
    // ═══════════════════════════════════════════
    #[error("{reason}")]
    #[diagnostic(
        code(templar::structural),
        help("Check $merge, $concat and $forEach usage in the configuration")
    )]
    Structural { reason: String },

    // ═══════════════════════════════════════════
    // REFERENCES / SECRETS (030-039)
    // ═══════════════════════════════════════════
    #[error("Found invalid {prefix} reference ({reason}).")]
    #[diagnostic(code(templar::invalid_reference))]
    InvalidReference { prefix: String, reason: String },

    #[error("{message}")]
    #[diagnostic(code(templar::missing_secrets))]
    MissingSecrets {
        message: String,
        /// (config name, sorted missing keys) pairs
        missing: Vec<(String, Vec<String>)>,
    },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("Config error: {reason}")]
    ConfigError { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    #[diagnostic(
        code(templar::yaml_parse),
        help("Check YAML syntax: indentation must be consistent, strings with special chars need quoting")
    )]
    YamlParse(#[from] serde_yaml::Error),
}

impl TemplarError {
    /// Get the error code (e.g., "TPL-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateParse { .. } => "TPL-001",
            Self::TemplateResolve {
                missing_key: true, ..
            } => "TPL-010",
            Self::TemplateResolve { .. } => "TPL-011",
            Self::Structural { .. } => "TPL-020",
            Self::InvalidReference { .. } => "TPL-030",
            Self::MissingSecrets { .. } => "TPL-031",
            Self::ConfigError { .. } => "TPL-040",
            Self::IoError(_) => "TPL-041",
            Self::JsonError(_) => "TPL-042",
            Self::YamlParse(_) => "TPL-043",
        }
    }

    /// True for a resolution failure caused by a key missing from the context
    pub fn is_missing_key(&self) -> bool {
        matches!(
            self,
            Self::TemplateResolve {
                missing_key: true,
                ..
            }
        )
    }
}

impl FixSuggestion for TemplarError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TemplarError::TemplateParse { .. } => {
                Some("Close every ${ with }, quote strings, and balance ${if}/${endif} blocks")
            }
            TemplarError::TemplateResolve {
                missing_key: true, ..
            } => Some("Define the key in the context, use `||` for a fallback, or add `?`"),
            TemplarError::TemplateResolve { .. } => {
                Some("Check operand types and helper function arguments")
            }
            TemplarError::Structural { .. } => {
                Some("$forEach needs $return, $concat must be the only key of a list item")
            }
            TemplarError::InvalidReference { .. } => {
                Some("Use ${action[\"<kind>\"].<name>} with a literal kind and name")
            }
            TemplarError::MissingSecrets { .. } => {
                Some("Load the missing secrets or remove the references")
            }
            TemplarError::ConfigError { .. } => {
                Some("Check ~/.config/templar/config.toml for syntax errors")
            }
            TemplarError::IoError(_) => Some("Check file path and permissions"),
            TemplarError::JsonError(_) => Some("Check JSON syntax"),
            TemplarError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}
