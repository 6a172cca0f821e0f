//! Pure legality checks for the domain machines.
//!
//! Every predicate here takes the records a handler has just read from its
//! snapshot plus the proposed arguments, and answers whether the transition
//! may proceed. None of them touch the ledger.

use lac_types::Points;

use crate::attendance::MonthlyEntries;
use crate::locker::{LockerData, LockerStatus};
use crate::point::Balance;
use crate::rental::{EquipmentData, RentalUser};
use crate::reservation::{ReservationUser, Room, RoomStatus};
use crate::supply::{DeliveryStatus, Item};

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

/// A day entry is written when it does not exist yet, or when the new value
/// is non-empty.
pub fn should_write_entry(month: Option<&MonthlyEntries>, day: &str, value: &str) -> bool {
    let exists = month.is_some_and(|m| m.daily_entries.contains_key(day));
    !exists || !value.is_empty()
}

// ---------------------------------------------------------------------------
// Balance ledger
// ---------------------------------------------------------------------------

pub fn can_debit(balance: &Balance, amount: Points) -> bool {
    amount <= balance.amount
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

pub fn holds_reservation(user: &ReservationUser) -> bool {
    !user.reserved_room_id.is_empty()
}

pub fn can_reserve(user: &ReservationUser, room: &Room) -> bool {
    !holds_reservation(user) && room.status_of_use == RoomStatus::NotUsed
}

/// Balance left after paying `fee`, if the unlock may go ahead.
///
/// The remainder must be strictly positive: a balance that exactly covers
/// the fee is refused.
pub fn balance_after_unlock(room: &Room, balance: i64, fee: i64) -> Option<i64> {
    if room.status_of_use != RoomStatus::Used {
        return None;
    }
    balance.checked_sub(fee).filter(|remaining| *remaining > 0)
}

// ---------------------------------------------------------------------------
// Locker
// ---------------------------------------------------------------------------

pub fn is_authorized(locker: &LockerData, user_id: &str) -> bool {
    locker.allowed_unlock_user_ids.iter().any(|id| id == user_id)
}

/// Re-asserting the current status is not a transition.
pub fn can_change_locker_status(locker: &LockerData, to: LockerStatus) -> bool {
    locker.locker_status != to
}

// ---------------------------------------------------------------------------
// Rental
// ---------------------------------------------------------------------------

pub fn is_rental_admin(user_id: &str, admin_user_id: &str) -> bool {
    user_id == admin_user_id
}

pub fn remaining_stock(equipment: &EquipmentData) -> usize {
    (equipment.total as usize).saturating_sub(equipment.borrower_list.len())
}

pub fn can_borrow(user: &RentalUser) -> bool {
    !user.is_borrowing
}

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

pub fn can_fulfil(item: &Item, quantity: u32) -> bool {
    quantity <= item.stock
}

/// `ordered -> {on_passage, delivered}`, `on_passage -> delivered`.
pub fn can_transition(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    use DeliveryStatus::*;
    matches!(
        (from, to),
        (Ordered, OnPassage) | (Ordered, Delivered) | (OnPassage, Delivered)
    )
}
