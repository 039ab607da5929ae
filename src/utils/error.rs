use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Malformed {service} payload: {message}")]
    Malformed { service: String, message: String },

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: String, after_ms: u64 },

    #[error("Insufficient time for final response ({remaining_ms}ms left, {threshold_ms}ms required)")]
    BudgetExceeded { remaining_ms: u64, threshold_ms: u64 },

    #[error("Invalid response format: {message}")]
    InvalidResponse { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Budget,
    Data,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn timeout(stage: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            stage: stage.into(),
            after_ms: after.as_millis() as u64,
        }
    }

    pub fn malformed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) | Self::Timeout { .. } => ErrorCategory::Network,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::BudgetExceeded { .. } => ErrorCategory::Budget,
            Self::Malformed { .. } | Self::InvalidResponse { .. } => ErrorCategory::Data,
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::Io(_) | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Budget | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// 回傳給呼叫端的穩定錯誤代碼
    pub fn code(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::Timeout { .. } => "GENERATION_TIMEOUT",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Internal { .. } => "INTERNAL_ERROR",
            _ => "SEARCH_ERROR",
        }
    }

    /// 類 HTTP 狀態碼，只放在錯誤結果的 context 中，不影響實際回應狀態
    pub fn status(&self) -> u16 {
        match self {
            Self::BudgetExceeded { .. } | Self::Timeout { .. } => 504,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check connectivity to the upstream providers and retry",
            ErrorCategory::Upstream => "Verify the provider API keys and quotas",
            ErrorCategory::Budget => "Raise budget.total_ms or lower budget.stage_timeout_ms",
            ErrorCategory::Data => "Retry the query; the model reply could not be used",
            ErrorCategory::Configuration => "Fix the configuration file and restart",
            ErrorCategory::Internal => "Inspect the service logs for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidResponse { .. } => {
                "Failed to generate a valid response. Please try again or rephrase your question."
                    .to_string()
            }
            other => format!(
                "I encountered an error while processing your request: {}. Please try again or rephrase your question.",
                other
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_error_maps_to_gateway_timeout() {
        let err = AppError::BudgetExceeded {
            remaining_ms: 200,
            threshold_ms: 1000,
        };
        assert_eq!(err.code(), "BUDGET_EXCEEDED");
        assert_eq!(err.status(), 504);
        assert_eq!(err.category(), ErrorCategory::Budget);
        assert!(err
            .user_friendly_message()
            .starts_with("I encountered an error while processing your request: Insufficient time"));
    }

    #[test]
    fn test_invalid_response_message() {
        let err = AppError::InvalidResponse {
            message: "empty content".to_string(),
        };
        assert_eq!(err.code(), "INVALID_RESPONSE");
        assert_eq!(
            err.user_friendly_message(),
            "Failed to generate a valid response. Please try again or rephrase your question."
        );
    }

    #[test]
    fn test_unclassified_errors_use_search_error_code() {
        let err = AppError::malformed("tavily", "missing results");
        assert_eq!(err.code(), "SEARCH_ERROR");
        assert_eq!(err.status(), 500);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
