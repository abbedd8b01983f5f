//! Error handling for the Reticle network
//!
//! Every rejected operation surfaces as a [`ReteError`]. Errors are fatal to the
//! call that produced them, never to the network: a failed `add_wme` or
//! `add_production` leaves the network usable.

use thiserror::Error;

/// Error type for Rete network operations
#[derive(Error, Debug, Clone)]
pub enum ReteError {
    /// A working memory element contained a variable placeholder
    #[error("Invalid fact: {message}")]
    InvalidFact { message: String, field: Option<String>, variable: Option<String> },

    /// A production could not be compiled into the network
    #[error("Invalid production: {message}")]
    InvalidProduction { message: String, production_id: Option<u64>, production_name: Option<String> },

    /// A production with the same id is already registered
    #[error("Production {production_id} ({production_name}) is already registered")]
    DuplicateProduction { production_id: u64, production_name: String },

    /// No production with this id is registered
    #[error("Unknown production: {production_id}")]
    UnknownProduction { production_id: u64 },

    /// The fact to retract is not in working memory
    #[error("Fact not found in working memory: {fact}")]
    FactNotFound { fact: String },

    /// A filter or bind parameter names a variable the match does not bind
    #[error("Unbound variable {variable}: {message}")]
    UnboundVariable { message: String, variable: String },

    /// A caller supplied predicate, function or action failed
    #[error("Procedure error: {message}")]
    Procedure { message: String, production_id: Option<u64>, source_details: Option<String> },

    /// The activation being fired no longer exists
    #[error("Stale activation: {message}")]
    StaleActivation { message: String, production_id: u64 },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String, setting: Option<String>, actual: Option<String> },

    /// Internal structural inconsistency in the network
    #[error("Network error: {message}")]
    Network { message: String, node_type: Option<String> },
}

impl ReteError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ReteError::InvalidFact { .. } => "invalid_fact",
            ReteError::InvalidProduction { .. } => "invalid_production",
            ReteError::DuplicateProduction { .. } => "duplicate_production",
            ReteError::UnknownProduction { .. } => "unknown_production",
            ReteError::FactNotFound { .. } => "fact_not_found",
            ReteError::UnboundVariable { .. } => "unbound_variable",
            ReteError::Procedure { .. } => "procedure",
            ReteError::StaleActivation { .. } => "stale_activation",
            ReteError::Configuration { .. } => "configuration",
            ReteError::Network { .. } => "network",
        }
    }

    /// Whether the error was caused by caller input rather than network state
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ReteError::Network { .. } | ReteError::Procedure { .. })
    }
}

/// Result type alias for network operations
pub type ReteResult<T> = Result<T, ReteError>;

/// Convenience constructors for common error scenarios
impl ReteError {
    /// A fact field held a variable where a constant was required
    pub fn invalid_fact(field: &str, variable: &str) -> Self {
        Self::InvalidFact {
            message: format!("field '{field}' holds variable ?{variable}, facts must be constant"),
            field: Some(field.to_string()),
            variable: Some(variable.to_string()),
        }
    }

    /// A production failed validation
    pub fn invalid_production(production_id: u64, production_name: &str, message: impl Into<String>) -> Self {
        Self::InvalidProduction {
            message: message.into(),
            production_id: Some(production_id),
            production_name: Some(production_name.to_string()),
        }
    }

    /// Re-adding an already registered production
    pub fn duplicate_production(production_id: u64, production_name: &str) -> Self {
        Self::DuplicateProduction { production_id, production_name: production_name.to_string() }
    }

    /// Removing or querying an unregistered production
    pub fn unknown_production(production_id: u64) -> Self {
        Self::UnknownProduction { production_id }
    }

    /// Retracting a fact that is not asserted
    pub fn fact_not_found(fact: impl std::fmt::Display) -> Self {
        Self::FactNotFound { fact: fact.to_string() }
    }

    /// A procedure parameter is not bound by the match
    pub fn unbound_variable(variable: &str, message: impl Into<String>) -> Self {
        Self::UnboundVariable { message: message.into(), variable: variable.to_string() }
    }

    /// Wrap a failure returned by a caller supplied procedure
    pub fn procedure(message: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Procedure {
            message: message.into(),
            production_id: None,
            source_details: Some(format!("{error:#}")),
        }
    }

    /// Wrap a failure returned by a production action
    pub fn action_failed(production_id: u64, error: &anyhow::Error) -> Self {
        Self::Procedure {
            message: format!("action of production {production_id} failed"),
            production_id: Some(production_id),
            source_details: Some(format!("{error:#}")),
        }
    }

    /// Firing a match that has since been retracted
    pub fn stale_activation(production_id: u64, message: impl Into<String>) -> Self {
        Self::StaleActivation { message: message.into(), production_id }
    }

    /// Create a configuration error
    pub fn configuration(setting: &str, actual: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            setting: Some(setting.to_string()),
            actual: Some(actual.to_string()),
        }
    }

    /// Internal network inconsistency
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), node_type: None }
    }

    /// Internal network inconsistency at a specific node kind
    pub fn network_at(node_type: &str, message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), node_type: Some(node_type.to_string()) }
    }
}
