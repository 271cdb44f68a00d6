use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, Utc};

/// Structured engine error carrying a category, a stable code, and an
/// optional source. The category drives the HTTP status mapping and decides
/// whether a failed run still gets an execution log entry.
#[derive(Debug)]
pub struct EngineError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl EngineError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        EngineError {
            category,
            severity: ErrorSeverity::Error,
            code: default_code(category).to_string(),
            message: message.into(),
            occurred_at: Utc::now(),
            source: None,
        }
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn rule_not_found(rule_id: uuid::Uuid) -> Self {
        EngineError::new(
            ErrorCategory::RuleNotFound,
            format!("rule not found: {}", rule_id),
        )
    }

    pub fn invalid_trigger_config<T: Into<String>>(message: T) -> Self {
        EngineError::new(ErrorCategory::InvalidTriggerConfig, message)
    }

    pub fn unknown_trigger_type(trigger_type: &str) -> Self {
        EngineError::new(
            ErrorCategory::UnknownTriggerType,
            format!("unknown trigger type '{}'", trigger_type),
        )
    }

    /// Config errors never produce an execution log entry: evaluation has
    /// not started when they surface.
    pub fn is_config_rejection(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::RuleNotFound
                | ErrorCategory::InvalidTriggerConfig
                | ErrorCategory::UnknownTriggerType
        )
    }
}

fn default_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::RuleNotFound => "CAD-RULE-404",
        ErrorCategory::InvalidTriggerConfig => "CAD-TRIG-001",
        ErrorCategory::UnknownTriggerType => "CAD-TRIG-002",
        ErrorCategory::PersistenceError => "CAD-DB-001",
        ErrorCategory::TimeoutError => "CAD-TIME-001",
        ErrorCategory::ConfigurationError => "CAD-CFG-001",
        ErrorCategory::IoError => "CAD-IO-001",
        ErrorCategory::SerializationError => "CAD-SER-001",
        ErrorCategory::InternalError => "CAD-INT-001",
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

impl From<cadence_backend::sqlx::Error> for EngineError {
    fn from(err: cadence_backend::sqlx::Error) -> Self {
        EngineError::new(
            ErrorCategory::PersistenceError,
            format!("database operation failed: {}", err),
        )
        .with_source(anyhow::anyhow!(err))
    }
}

impl From<cadence_backend::sqlx::migrate::MigrateError> for EngineError {
    fn from(err: cadence_backend::sqlx::migrate::MigrateError) -> Self {
        EngineError::new(
            ErrorCategory::PersistenceError,
            format!("migration failed: {}", err),
        )
        .with_code("CAD-DB-002")
        .with_source(anyhow::anyhow!(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::new(ErrorCategory::IoError, err.to_string()).with_source(anyhow::anyhow!(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::new(ErrorCategory::SerializationError, err.to_string())
            .with_source(anyhow::anyhow!(err))
    }
}
