use bcrypt::BcryptError;
use diesel::{r2d2::PoolError, result::Error as DieselError};
use failure::Fail;
use http::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by storage, credential and form handling.
#[derive(Debug, Fail)]
pub enum Error {
    /// No connection could be checked out of the pool
    #[fail(display = "database connection unavailable: {}", _0)]
    Connection(#[fail(cause)] PoolError),
    /// A query failed, including unique constraint violations
    #[fail(display = "database query failed: {}", _0)]
    Query(#[fail(cause)] DieselError),
    /// No row exists for the requested id or login
    #[fail(display = "the requested record does not exist")]
    NotFound,
    /// Hashing or verifying a password failed
    #[fail(display = "password hashing failed: {}", _0)]
    Crypto(#[fail(cause)] BcryptError),
    /// The session may not perform the action
    #[fail(display = "permission denied")]
    Forbidden,
    /// A request body could not be decoded
    #[fail(display = "invalid input: {}", _0)]
    Validation(String),
}

impl Error {
    pub fn is_storage(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Query(_) => true,
            _ => false,
        }
    }

    /// The status code a handler responds with when failing with this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Error::NotFound,
            e => Error::Query(e),
        }
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Error::Connection(e)
    }
}

impl From<BcryptError> for Error {
    fn from(e: BcryptError) -> Self {
        Error::Crypto(e)
    }
}

impl From<serde_urlencoded::de::Error> for Error {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        Error::Validation(e.to_string())
    }
}
