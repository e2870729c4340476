//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tfmkt_domain::TfmktError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TfmktError);

impl From<InfraError> for TfmktError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TfmktError> for InfraError {
    fn from(value: TfmktError) -> Self {
        InfraError(value)
    }
}

trait IntoTfmktError {
    fn into_tfmkt(self) -> TfmktError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TfmktError */
/* -------------------------------------------------------------------------- */

impl IntoTfmktError for SqlError {
    fn into_tfmkt(self) -> TfmktError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => {
                        TfmktError::StorageUnavailable("database is busy".into())
                    }
                    ErrorCode::DatabaseLocked => {
                        TfmktError::StorageUnavailable("database is locked".into())
                    }
                    ErrorCode::CannotOpen => TfmktError::StorageUnavailable(format!(
                        "unable to open database file: {message}"
                    )),
                    ErrorCode::DiskFull => TfmktError::StorageUnavailable("disk is full".into()),
                    ErrorCode::ReadOnly => {
                        TfmktError::StorageUnavailable("database is read-only".into())
                    }
                    _ => TfmktError::StorageUnavailable(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => TfmktError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                TfmktError::StorageUnavailable(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                TfmktError::StorageUnavailable(format!("invalid column type for {name}: {ty}"))
            }
            RE::InvalidQuery => TfmktError::Internal("invalid SQL query".into()),
            other => TfmktError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_tfmkt())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → TfmktError */
/* -------------------------------------------------------------------------- */

impl IntoTfmktError for r2d2::Error {
    fn into_tfmkt(self) -> TfmktError {
        TfmktError::StorageUnavailable(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_tfmkt())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TfmktError */
/* -------------------------------------------------------------------------- */

impl IntoTfmktError for HttpError {
    fn into_tfmkt(self) -> TfmktError {
        if self.is_timeout() {
            return TfmktError::FetchFailed("origin request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return TfmktError::FetchFailed("origin connection failure".into());
        }

        if self.is_decode() {
            return TfmktError::FetchFailed(format!("malformed origin response: {self}"));
        }

        if self.is_builder() {
            return TfmktError::Internal(format!("invalid origin request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => TfmktError::NotFound(message),
                _ => TfmktError::FetchFailed(message),
            };
        }

        TfmktError::FetchFailed(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_tfmkt())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
