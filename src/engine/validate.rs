use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Turn a client draft into a reservation body, rejecting anything the
/// cleaning derivation could not work with.
pub(crate) fn validate_draft(
    draft: ReservationDraft,
    id: ReservationId,
) -> Result<Reservation, EngineError> {
    let customer_name = draft
        .customer_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(EngineError::Validation("customerName is required"))?;
    let email = draft.email.unwrap_or_default();
    let phone = draft.phone.unwrap_or_default();
    if customer_name.len() > MAX_FIELD_LEN || email.len() > MAX_FIELD_LEN || phone.len() > MAX_FIELD_LEN {
        return Err(EngineError::LimitExceeded("field too long"));
    }

    let rooms = draft
        .rooms
        .filter(|rooms| !rooms.is_empty())
        .ok_or(EngineError::Validation("at least one room is required"))?;
    if rooms.len() > MAX_ROOMS_PER_RESERVATION {
        return Err(EngineError::LimitExceeded("too many rooms on reservation"));
    }
    let rooms: Vec<String> = rooms.into_iter().map(|r| r.trim().to_string()).collect();
    if rooms.iter().any(|r| r.is_empty()) {
        return Err(EngineError::Validation("room identifiers must not be blank"));
    }
    if rooms.iter().any(|r| r.len() > MAX_ROOM_ID_LEN) {
        return Err(EngineError::LimitExceeded("room identifier too long"));
    }

    let check_in = draft
        .check_in
        .ok_or(EngineError::Validation("checkIn is required"))?;
    let check_out = draft
        .check_out
        .ok_or(EngineError::Validation("checkOut is required"))?;
    if check_out <= check_in {
        return Err(EngineError::Validation("checkOut must be after checkIn"));
    }
    if (check_out - check_in).num_days() > MAX_STAY_DAYS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }

    Ok(Reservation {
        id,
        customer_name,
        email,
        phone,
        rooms,
        check_in,
        check_out,
    })
}
