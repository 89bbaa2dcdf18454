//! Error types for the SFC transpiler.
//!
//! Every failure carries a stable diagnostic code so hosts can match on it
//! without parsing messages. Errors are `Clone` because a failed placeholder
//! in the dependency cache hands the same failure to every awaiting caller.

use thiserror::Error;

use crate::sfc::Identity;

pub const ERR_PARSE: &str = "SFC-ERR-PARSE";
pub const ERR_CYCLE: &str = "SFC-ERR-CYCLE";
pub const ERR_LOAD: &str = "SFC-ERR-LOAD";
pub const ERR_CODEGEN: &str = "SFC-ERR-CODEGEN";
pub const ERR_RESOLVE: &str = "SFC-ERR-RESOLVE";
pub const ERR_PUBLISH: &str = "SFC-ERR-PUBLISH";
pub const ERR_DEPENDENCY: &str = "SFC-ERR-DEPENDENCY";

/// Result type for transpiler operations.
pub type Result<T> = std::result::Result<T, TranspileError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranspileError {
    /// The document is structurally unusable: no script section, an
    /// unterminated section, or script text the parser gave up on.
    #[error("parse error in {identity}: {message}")]
    Parse { identity: Identity, message: String },

    /// An identity reappeared in its own ancestor chain.
    #[error("cyclic dependency detected: {}", render_chain(.chain))]
    CyclicDependency { chain: Vec<Identity> },

    /// The content loader failed and the policy is fail-fast.
    #[error("failed to load {locator}: {reason}")]
    ContentLoad { locator: Identity, reason: String },

    /// The script could not be turned into a module safely.
    #[error("code generation failed for {identity}: {message}")]
    Generation { identity: Identity, message: String },

    /// A reference could not be resolved against its base document.
    #[error("cannot resolve '{reference}' from {base}: {reason}")]
    Resolve {
        reference: String,
        base: Identity,
        reason: String,
    },

    /// The artifact store refused the generated module.
    #[error("failed to publish artifact: {0}")]
    Publish(String),

    /// A dependency failed; `source` is the child's own failure.
    #[error("dependency {dependency} of {parent} failed: {source}")]
    Dependency {
        parent: Identity,
        dependency: Identity,
        #[source]
        source: Box<TranspileError>,
    },
}

impl TranspileError {
    pub fn parse(identity: &Identity, message: impl Into<String>) -> Self {
        Self::Parse {
            identity: identity.clone(),
            message: message.into(),
        }
    }

    pub fn generation(identity: &Identity, message: impl Into<String>) -> Self {
        Self::Generation {
            identity: identity.clone(),
            message: message.into(),
        }
    }

    /// Stable diagnostic code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => ERR_PARSE,
            Self::CyclicDependency { .. } => ERR_CYCLE,
            Self::ContentLoad { .. } => ERR_LOAD,
            Self::Generation { .. } => ERR_CODEGEN,
            Self::Resolve { .. } => ERR_RESOLVE,
            Self::Publish(_) => ERR_PUBLISH,
            Self::Dependency { .. } => ERR_DEPENDENCY,
        }
    }

    /// Innermost failure, looking through `Dependency` wrappers.
    pub fn root_cause(&self) -> &TranspileError {
        match self {
            Self::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The cycle chain if this failure (or its root cause) is a cycle.
    pub fn cycle_chain(&self) -> Option<&[Identity]> {
        match self.root_cause() {
            Self::CyclicDependency { chain } => Some(chain),
            _ => None,
        }
    }
}

fn render_chain(chain: &[Identity]) -> String {
    chain
        .iter()
        .map(Identity::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}
