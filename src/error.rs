use uuid::Uuid;

/// Coarse error category from §7 of the engine's error taxonomy. Callers that
/// want to branch on shape (retry? surface to user? log as fatal?) should
/// match on this rather than on individual [`EngineError`] variants, which
/// may grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    BusinessState,
    Inventory,
    Concurrency,
    External,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error("event {0} is not active")]
    EventInactive(Uuid),

    #[error("event {0} does not support seat selection")]
    SeatSelectionUnsupported(Uuid),

    #[error("seat {seat_id} is not available (status: {status})")]
    SeatNotAvailable { seat_id: Uuid, status: String },

    #[error("seat {0} not found")]
    SeatNotFound(Uuid),

    #[error("event {0} has insufficient capacity")]
    InsufficientCapacity(Uuid),

    #[error("optimistic concurrency conflict on event {0}")]
    StaleVersion(Uuid),

    #[error("timed out waiting for lock {0}")]
    LockTimeout(String),

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("booking {booking_id} is in state {current:?}, expected a non-terminal state")]
    InvalidBookingState { booking_id: Uuid, current: String },

    #[error("booking {0} has already expired")]
    BookingExpired(Uuid),

    #[error("event {0} cannot be deleted while confirmed bookings exist")]
    EventHasBookings(Uuid),

    #[error("event {0} is not sold out")]
    EventNotSoldOut(Uuid),

    #[error("user {user_id} already has an active waitlist entry for event {event_id}")]
    AlreadyOnWaitlist { user_id: Uuid, event_id: Uuid },

    #[error("waitlist entry {0} not found")]
    WaitlistEntryNotFound(Uuid),

    #[error("service unavailable, retry after {retry_after_secs}s")]
    ServiceUnavailable { retry_after_secs: u64 },

    #[error("concurrency retries exhausted, retry after {retry_after_secs}s")]
    ConcurrencyExhausted { retry_after_secs: u64 },

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error(transparent)]
    Db(#[from] diesel::result::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidQuantity(_) | EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::EventNotFound(_)
            | EngineError::SeatNotFound(_)
            | EngineError::BookingNotFound(_)
            | EngineError::WaitlistEntryNotFound(_) => ErrorKind::NotFound,
            EngineError::EventInactive(_)
            | EngineError::SeatSelectionUnsupported(_)
            | EngineError::InvalidBookingState { .. }
            | EngineError::BookingExpired(_)
            | EngineError::EventHasBookings(_)
            | EngineError::EventNotSoldOut(_)
            | EngineError::AlreadyOnWaitlist { .. } => ErrorKind::BusinessState,
            EngineError::SeatNotAvailable { .. } | EngineError::InsufficientCapacity(_) => {
                ErrorKind::Inventory
            }
            EngineError::StaleVersion(_)
            | EngineError::LockTimeout(_)
            | EngineError::ConcurrencyExhausted { .. } => ErrorKind::Concurrency,
            EngineError::ServiceUnavailable { .. } | EngineError::Pool(_) => ErrorKind::External,
            EngineError::Internal(_) => ErrorKind::Fatal,
            EngineError::Db(e) => db_error_kind(e),
        }
    }

    /// Whether `BookingEngine::Create`'s retry loop (§5) should retry this
    /// error rather than surface it immediately. `SeatNotAvailable` is a
    /// special case within `Inventory`: §4.4.1 only retries it when the seat
    /// is merely held by someone else (still exists, not yet `BOOKED`) —
    /// a seat already `BOOKED` is a definitive loss, not a transient race.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::SeatNotAvailable { status, .. } => status != "Booked",
            _ => matches!(self.kind(), ErrorKind::Concurrency | ErrorKind::External),
        }
    }
}

fn db_error_kind(e: &diesel::result::Error) -> ErrorKind {
    use diesel::result::{DatabaseErrorKind, Error};
    match e {
        Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => ErrorKind::Concurrency,
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => ErrorKind::Validation,
        Error::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::External,
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
