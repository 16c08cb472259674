use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {kind} {name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Resource already exists: {kind} {name} in namespace {namespace}")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Failed to access object metadata: {0}")]
    MetadataError(String),
}

impl Error {
    /// Classify an error returned by `kube::Client`.
    ///
    /// `kind`, `namespace` and `name` describe the object the request addressed
    /// and fill in the structured NotFound/AlreadyExists variants, which the API
    /// server only reports as a message.
    pub fn from_kube(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => Error::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                },
                409 if resp.reason == "AlreadyExists" => Error::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                },
                409 => Error::Conflict(resp.message),
                400 | 422 => Error::Invalid(resp.message),
                401 | 403 => Error::Forbidden(resp.message),
                502..=504 => Error::Connection(resp.message),
                code => Error::Internal(format!("{} {}: {}", code, resp.reason, resp.message)),
            },
            kube::Error::SerdeError(e) => Error::Serialization(e),
            kube::Error::BuildRequest(e) => Error::Invalid(e.to_string()),
            kube::Error::Auth(e) => Error::Forbidden(e.to_string()),
            other => Error::Connection(other.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::Invalid(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// HTTP status and `Status.reason` an API server answers with for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            Error::AlreadyExists { .. } => (StatusCode::CONFLICT, "AlreadyExists"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            Error::Invalid(_) | Error::MetadataError(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid")
            }
            Error::Serialization(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            Error::Connection(_) => (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl From<kube::core::request::Error> for Error {
    fn from(err: kube::core::request::Error) -> Self {
        Error::Invalid(err.to_string())
    }
}
