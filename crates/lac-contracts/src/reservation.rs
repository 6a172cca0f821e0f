//! Room reservation toggle.
//!
//! A user reserves a free room, then pays a fixed fee to unlock it, which
//! releases the room. Users are keyed by their password; rooms by their
//! bare id. Both live in one key space, so every lookup classifies the
//! stored value first and a key holding one shape is never read as the
//! other.

use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{decode_record, keys, CodecError, InvokeResult, Record, Response, Status};

use crate::config::ReservationConfig;
use crate::contract::{expect_args, parse_arg, Command, Contract};
use crate::validators;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    #[serde(rename = "used")]
    Used,
    #[default]
    #[serde(rename = "notUsed")]
    NotUsed,
}

impl RoomStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Used => Self::NotUsed,
            Self::NotUsed => Self::Used,
        }
    }
}

/// A room. Decoding is strict: a user record never reads as a room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Room {
    pub id: String,
    pub status_of_use: RoomStatus,
}

impl Record for Room {
    fn presence_field(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationUser {
    pub id: String,
    pub password: String,
    pub balance: i64,
    /// Empty when the user holds no reservation.
    pub reserved_room_id: String,
}

impl Record for ReservationUser {
    fn presence_field(&self) -> &str {
        &self.id
    }
}

/// What a reservation key currently holds.
#[derive(Debug)]
enum Slot {
    Vacant,
    Room(Room),
    User(ReservationUser),
}

impl Slot {
    fn decode(bytes: Option<&[u8]>) -> Result<Self, CodecError> {
        if let Ok(room) = decode_record::<Room>(bytes) {
            return Ok(room.map_or(Self::Vacant, Self::Room));
        }
        Ok(decode_record::<ReservationUser>(bytes)?.map_or(Self::Vacant, Self::User))
    }

    fn load(ledger: &mut dyn LedgerAccessor, key: &str) -> InvokeResult<Self> {
        let bytes = ledger.get(key)?;
        Ok(Self::decode(bytes.as_deref())?)
    }
}

pub struct ReservationContract {
    config: ReservationConfig,
}

impl ReservationContract {
    pub fn new(config: ReservationConfig) -> Self {
        Self { config }
    }

    fn user_not_found(password: &str) -> Response {
        Response::error(Status::NotFound, format!("no user for key {password}"))
    }

    fn room_not_found(room_id: &str) -> Response {
        Response::error(Status::NotFound, format!("no room {room_id}"))
    }

    fn load_user(ledger: &mut dyn LedgerAccessor, password: &str) -> InvokeResult<Option<ReservationUser>> {
        match Slot::load(ledger, &keys::reservation_user(password))? {
            Slot::User(user) => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    fn load_room(ledger: &mut dyn LedgerAccessor, room_id: &str) -> InvokeResult<Option<Room>> {
        match Slot::load(ledger, &keys::room(room_id))? {
            Slot::Room(room) => Ok(Some(room)),
            _ => Ok(None),
        }
    }

    /// Create or reset a room. Refused when the key belongs to a user.
    pub fn put_room(&self, ledger: &mut dyn LedgerAccessor, room_id: &str) -> InvokeResult<Response> {
        let key = keys::room(room_id);
        if let Slot::User(_) = Slot::load(ledger, &key)? {
            return Ok(Response::error(Status::Conflict, format!("key {room_id} holds a user")));
        }

        let room = Room {
            id: room_id.to_owned(),
            status_of_use: RoomStatus::NotUsed,
        };
        ledger.put_record(&key, &room)?;
        Ok(Response::created().with("room", &room)?)
    }

    pub fn get_room(&self, ledger: &mut dyn LedgerAccessor, room_id: &str) -> InvokeResult<Response> {
        match Self::load_room(ledger, room_id)? {
            Some(room) => Ok(Response::ok().with("room", &room)?),
            None => Ok(Self::room_not_found(room_id)),
        }
    }

    /// Every room in the configured key range.
    pub fn get_all_rooms(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        let entries = ledger.range_scan(&self.config.room_range_start, &self.config.room_range_end)?;
        let mut rooms = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Slot::Room(room) = Slot::decode(Some(entry.value.as_slice()))? {
                rooms.push(room);
            }
        }

        if rooms.is_empty() {
            return Ok(Response::error(Status::NotFound, "no rooms"));
        }
        Ok(Response::ok().with("rooms", &rooms)?)
    }

    pub fn put_user(&self, ledger: &mut dyn LedgerAccessor, id: &str, password: &str) -> InvokeResult<Response> {
        let key = keys::reservation_user(password);
        if let Slot::Room(_) = Slot::load(ledger, &key)? {
            return Ok(Response::error(Status::Conflict, format!("key {password} holds a room")));
        }

        let user = ReservationUser {
            id: id.to_owned(),
            password: password.to_owned(),
            balance: self.config.initial_balance,
            reserved_room_id: String::new(),
        };
        ledger.put_record(&key, &user)?;
        Ok(Response::created().with("user", &user)?)
    }

    pub fn get_user(&self, ledger: &mut dyn LedgerAccessor, password: &str) -> InvokeResult<Response> {
        match Self::load_user(ledger, password)? {
            Some(user) => Ok(Response::ok().with("user", &user)?),
            None => Ok(Self::user_not_found(password)),
        }
    }

    pub fn update_reserved_room_id(
        &self,
        ledger: &mut dyn LedgerAccessor,
        password: &str,
        room_id: &str,
    ) -> InvokeResult<Response> {
        let Some(mut user) = Self::load_user(ledger, password)? else {
            return Ok(Self::user_not_found(password));
        };
        user.reserved_room_id = room_id.to_owned();
        ledger.put_record(&keys::reservation_user(password), &user)?;
        Ok(Response::ok().with("user", &user)?)
    }

    pub fn update_balance(
        &self,
        ledger: &mut dyn LedgerAccessor,
        password: &str,
        balance: &str,
    ) -> InvokeResult<Response> {
        let balance: i64 = parse_arg("balance", balance)?;
        if balance < 0 {
            return Ok(Response::error(Status::BadRequest, "balance must not be negative"));
        }

        let Some(mut user) = Self::load_user(ledger, password)? else {
            return Ok(Self::user_not_found(password));
        };
        user.balance = balance;
        ledger.put_record(&keys::reservation_user(password), &user)?;
        Ok(Response::ok().with("user", &user)?)
    }

    /// Mark the room used and hand its id to the user.
    pub fn reserve(&self, ledger: &mut dyn LedgerAccessor, password: &str, room_id: &str) -> InvokeResult<Response> {
        let Some(mut user) = Self::load_user(ledger, password)? else {
            return Ok(Self::user_not_found(password));
        };
        let Some(mut room) = Self::load_room(ledger, room_id)? else {
            return Ok(Self::room_not_found(room_id));
        };

        if !validators::can_reserve(&user, &room) {
            debug!(room = room_id, reserved = %user.reserved_room_id, "reservation refused");
            return Ok(Response::error(Status::Conflict, "room or user already reserved")
                .with("room", &room)?);
        }

        user.reserved_room_id = room.id.clone();
        room.status_of_use = room.status_of_use.toggled();
        ledger.put_record(&keys::reservation_user(password), &user)?;
        ledger.put_record(&keys::room(room_id), &room)?;

        Ok(Response::ok().with("room", &room)?.with("user", &user)?)
    }

    /// Charge the unlock fee and release both the room and the user's
    /// reservation slot.
    pub fn unlock(&self, ledger: &mut dyn LedgerAccessor, password: &str) -> InvokeResult<Response> {
        let user = Self::load_user(ledger, password)?.unwrap_or_default();
        if !validators::holds_reservation(&user) {
            return Ok(Response::error(Status::NotFound, "no reserved room").with("is_unlock", &false)?);
        }

        // A slot pointing at a missing room reads as an unused one and is refused below.
        let room = Self::load_room(ledger, &user.reserved_room_id)?.unwrap_or_default();
        let Some(remaining) = validators::balance_after_unlock(&room, user.balance, self.config.unlock_fee) else {
            debug!(room = %user.reserved_room_id, balance = user.balance, "unlock refused");
            return Ok(Response::error(Status::Conflict, "room not in use or balance too low")
                .with("is_unlock", &false)?);
        };

        let user = ReservationUser {
            balance: remaining,
            reserved_room_id: String::new(),
            ..user
        };
        let room = Room {
            status_of_use: room.status_of_use.toggled(),
            ..room
        };
        ledger.put_record(&keys::reservation_user(password), &user)?;
        ledger.put_record(&keys::room(&room.id), &room)?;

        Ok(Response::ok().with("is_unlock", &true)?)
    }
}

impl Default for ReservationContract {
    fn default() -> Self {
        Self::new(ReservationConfig::default())
    }
}

impl Contract for ReservationContract {
    fn name(&self) -> &'static str {
        "reservation"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("putRoom", 1, |c: &Self, ledger, args| {
                let [room_id] = expect_args::<1>("putRoom", args)?;
                c.put_room(ledger, room_id)
            }),
            Command::new("getRoom", 1, |c: &Self, ledger, args| {
                let [room_id] = expect_args::<1>("getRoom", args)?;
                c.get_room(ledger, room_id)
            }),
            Command::new("getAllRooms", 0, |c: &Self, ledger, args| {
                let [] = expect_args::<0>("getAllRooms", args)?;
                c.get_all_rooms(ledger)
            }),
            Command::new("putUser", 2, |c: &Self, ledger, args| {
                let [id, password] = expect_args::<2>("putUser", args)?;
                c.put_user(ledger, id, password)
            }),
            Command::new("getUser", 1, |c: &Self, ledger, args| {
                let [password] = expect_args::<1>("getUser", args)?;
                c.get_user(ledger, password)
            }),
            Command::new("updateReservedRoomId", 2, |c: &Self, ledger, args| {
                let [password, room_id] = expect_args::<2>("updateReservedRoomId", args)?;
                c.update_reserved_room_id(ledger, password, room_id)
            }),
            Command::new("updateBalance", 2, |c: &Self, ledger, args| {
                let [password, balance] = expect_args::<2>("updateBalance", args)?;
                c.update_balance(ledger, password, balance)
            }),
            Command::new("reserve", 2, |c: &Self, ledger, args| {
                let [password, room_id] = expect_args::<2>("reserve", args)?;
                c.reserve(ledger, password, room_id)
            }),
            Command::new("unlock", 1, |c: &Self, ledger, args| {
                let [password] = expect_args::<1>("unlock", args)?;
                c.unlock(ledger, password)
            }),
        ]
    }
}
