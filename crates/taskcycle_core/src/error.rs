use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation_error - {0}")]
    Validation(String),
    #[error("not_found - {0}")]
    NotFound(String),
    #[error("invalid_schedule - {0}")]
    InvalidSchedule(String),
    #[error("store_unavailable - {0}")]
    StoreUnavailable(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
}

impl AppError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_schedule<M: Into<String>>(message: M) -> Self {
        Self::InvalidSchedule(message.into())
    }

    pub fn store_unavailable<M: Into<String>>(message: M) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::InvalidSchedule(message)
            | Self::StoreUnavailable(message)
            | Self::InvalidData(message) => message,
        }
    }

    /// Only a store outage is worth retrying; every other failure is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
