//! Ledger key derivation.
//!
//! Every record lives under a key derived from its domain identifier. Each
//! contract owns its own ledger namespace, so prefixes only need to be
//! distinct within one contract.

/// `{id}_{yyyy-mm}`: one attendance record per person and month.
pub fn monthly_attendance(id: &str, month: &str) -> String {
    format!("{id}_{month}")
}

/// `balance_{userId}`
pub fn balance(user_id: &str) -> String {
    format!("balance_{user_id}")
}

/// `transfer_bill_{userId}_{yyyymm}`: latest transfer leg per user and month.
pub fn transfer_bill(user_id: &str, year_month: &str) -> String {
    format!("transfer_bill_{user_id}_{year_month}")
}

/// Rooms are stored under their bare id.
pub fn room(room_id: &str) -> String {
    room_id.to_owned()
}

/// Reservation users are stored under their password.
pub fn reservation_user(password: &str) -> String {
    password.to_owned()
}

/// `locker_{lockerId}`
pub fn locker(locker_id: &str) -> String {
    format!("locker_{locker_id}")
}

/// `user_{userId}`: shared shape for locker and rental user records.
pub fn user(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// `equipment_{equipmentId}`
pub fn equipment(equipment_id: &str) -> String {
    format!("equipment_{equipment_id}")
}

/// `item_{itemId}`
pub fn item(item_id: &str) -> String {
    format!("item_{item_id}")
}

/// `delivery_{userId}_{itemId}_{stamp}`; the delivery id doubles as its key.
pub fn delivery(user_id: &str, item_id: &str, stamp: &str) -> String {
    format!("delivery_{user_id}_{item_id}_{stamp}")
}

/// `user_deliveries_{userId}`
pub fn user_deliveries(user_id: &str) -> String {
    format!("user_deliveries_{user_id}")
}
