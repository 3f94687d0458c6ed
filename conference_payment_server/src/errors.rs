use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use conference_payment_engine::{
    traits::{AccountApiError, PaymentOptionError},
    CallbackRejection,
    IssuanceError,
    ReconciliationError,
};
use log::{error, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    RequestRejected(String),
    #[error("The service is temporarily unavailable, please try again later.")]
    ServiceUnavailable,
    #[error("The payment gateway could not be reached. {0}")]
    GatewayError(String),
    #[error("Invalid payment notification. {0}")]
    InvalidCallback(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCallback(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::RequestRejected(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
}

impl From<IssuanceError> for ServerError {
    fn from(e: IssuanceError) -> Self {
        match e {
            IssuanceError::OptionNotFound(_) => Self::NoRecordFound(e.to_string()),
            IssuanceError::UserNotFound(_) => Self::AuthenticationError(AuthError::AccountNotFound),
            IssuanceError::OptionNotYetActive(_) | IssuanceError::OptionExpired(_) | IssuanceError::AlreadyPaid => {
                Self::RequestRejected(e.to_string())
            },
            IssuanceError::GatewayUnavailable(msg) => {
                warn!("💻️ Could not issue order. The payment gateway is not responding. {msg}");
                Self::ServiceUnavailable
            },
            IssuanceError::DatabaseError(msg) => {
                error!("💻️ Could not issue order. {msg}");
                Self::ServiceUnavailable
            },
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(_) | ReconciliationError::UserNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            ReconciliationError::UpstreamError(msg) => Self::GatewayError(msg),
            ReconciliationError::DatabaseError(msg) => Self::BackendError(msg),
        }
    }
}

impl From<CallbackRejection> for ServerError {
    fn from(e: CallbackRejection) -> Self {
        Self::InvalidCallback(e.to_string())
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::InvalidUser(msg) => Self::InvalidRequestBody(msg),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PaymentOptionError> for ServerError {
    fn from(e: PaymentOptionError) -> Self {
        match e {
            PaymentOptionError::InvalidOption(msg) => Self::InvalidRequestBody(msg),
            e => Self::BackendError(e.to_string()),
        }
    }
}
