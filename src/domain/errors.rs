use std::fmt;
use thiserror::Error;

/// MySQL: deadlock found when trying to get lock
const MYSQL_ER_LOCK_DEADLOCK: u16 = 1213;
/// MySQL: lock wait timeout exceeded
const MYSQL_ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// SQLSTATE serialization failure
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Transaction aborts the store signals when locks conflict.
///
/// These are the only faults the checkout retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientFault {
    /// The store picked this transaction as a deadlock victim
    Deadlock,
    /// A row lock was not granted within the lock-wait timeout
    LockWaitTimeout,
}

impl fmt::Display for TransientFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientFault::Deadlock => write!(f, "deadlock"),
            TransientFault::LockWaitTimeout => write!(f, "lock wait timeout"),
        }
    }
}

/// Domain layer error type
#[derive(Error, Debug)]
pub enum DomainError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Retryable lock conflict
    #[error("Transient store fault ({fault}): {message}")]
    Transient {
        fault: TransientFault,
        message: String,
    },

    /// Storage-level invariant rejected a write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Stored value could not be mapped onto a domain type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payment gateway rejected the request
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Prescription file storage error
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn transient(fault: TransientFault, message: impl Into<String>) -> Self {
        DomainError::Transient {
            fault,
            message: message.into(),
        }
    }

    /// Whether a fresh attempt of the whole transaction may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Transient { .. })
    }
}

/// Classifies lock conflicts so the retry wrapper can single them out.
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let number = db_err
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .map(|e| e.number());

            match number {
                Some(MYSQL_ER_LOCK_DEADLOCK) => {
                    return DomainError::transient(TransientFault::Deadlock, db_err.message());
                }
                Some(MYSQL_ER_LOCK_WAIT_TIMEOUT) => {
                    return DomainError::transient(
                        TransientFault::LockWaitTimeout,
                        db_err.message(),
                    );
                }
                _ => {}
            }

            if db_err.code().as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE) {
                return DomainError::transient(TransientFault::Deadlock, db_err.message());
            }
        }

        DomainError::Database(err)
    }
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
