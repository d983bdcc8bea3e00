//! Hard caps on input sizes. Anything above these is rejected with
//! `EngineError::LimitExceeded` before it reaches the WAL.

pub const MAX_RESERVATIONS: usize = 100_000;
pub const MAX_ROOMS_PER_RESERVATION: usize = 64;
pub const MAX_ROOM_ID_LEN: usize = 32;
/// Applies to customer name, email and phone.
pub const MAX_FIELD_LEN: usize = 256;
/// Widest date range an availability grid or chart query may cover (inclusive days).
pub const MAX_QUERY_DAYS: i64 = 366;
/// Longest stay accepted on a single reservation.
pub const MAX_STAY_DAYS: i64 = 366;
