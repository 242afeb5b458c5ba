use thiserror::Error;

/// Error taxonomy for the authentication subsystem.
///
/// The gateway layer is the only site permitted to translate these into HTTP
/// status codes and response bodies; every other layer simply propagates
/// them with `?`. [`AppError::Authentication`] deliberately carries no
/// message so that callers cannot accidentally leak "wrong user" vs. "wrong
/// code" detail into a response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request body, missing field, or an otherwise client-caused
    /// input problem. Safe to surface verbatim; carries no secret material.
    #[error("{0}")]
    Input(String),

    /// Any login or recovery failure. Collapsed to a single opaque message
    /// on purpose — never distinguish "no such user" from "wrong code".
    #[error("Invalid credentials")]
    Authentication,

    /// Authenticated but not permitted to perform the requested action.
    #[error("{0}")]
    Forbidden(String),

    /// A guard that wants to hide the existence of an endpoint entirely
    /// (`localhost_only`) rather than reveal it with a 401/403.
    #[error("not found")]
    HiddenNotFound,

    /// An operation conflicts with in-progress state.
    #[error("{0}")]
    Conflict(String),

    /// Irrecoverable persistence failure. The response body must carry no
    /// internal detail; detail belongs in the log entry, not the variant.
    #[error("storage error")]
    Store(String),

    /// A WebAuthn sign counter regressed, indicating a cloned authenticator.
    #[error("authenticator clone suspected")]
    CloneSuspected,
}
