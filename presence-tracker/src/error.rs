//! Error types for the presence and tracking core.

/// Errors surfaced by presence watching and tracking sessions.
///
/// None of these are fatal to the hosting process. `InvalidTarget` and
/// `TargetNotFound` end the session that raised them; the others are reported
/// and the session carries on with whatever data it already has.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid target id: {0:?}")]
    InvalidTarget(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Location unavailable")]
    LocationUnavailable,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Short machine-readable name, used in API bodies and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidTarget(_) => "invalid_target",
            Error::TargetNotFound(_) => "target_not_found",
            Error::SubscriptionFailed(_) => "subscription_failed",
            Error::LocationUnavailable => "location_unavailable",
            Error::Store(_) => "store_error",
            Error::Decode(_) => "decode_error",
        }
    }

    /// Message shown to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidTarget(_) => "Error: ID de usuario no válido".to_string(),
            Error::TargetNotFound(_) => {
                "Error: Usuario no encontrado en la base de datos".to_string()
            }
            Error::SubscriptionFailed(message) => {
                format!("Error de conexión con la base de datos: {}", message)
            }
            Error::LocationUnavailable => "No se pudo obtener tu ubicación actual".to_string(),
            Error::Store(_) | Error::Decode(_) => {
                "Error: No se pudo leer los datos del usuario".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
