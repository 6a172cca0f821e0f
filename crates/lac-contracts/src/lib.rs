//! Domain state machines for the Ledger Application Core.
//!
//! Each machine is a [`Contract`]: a named table of fixed-arity
//! [`Command`]s whose handlers read records through a
//! [`LedgerAccessor`](lac_store::LedgerAccessor), check them with the pure
//! predicates in [`validators`], and write replacement records back.
//!
//! # Key Types
//!
//! - [`AttendanceContract`] -- monthly attendance log
//! - [`PointContract`] -- point balances, transfers, and issuance
//! - [`ReservationContract`] -- room reservation toggle with a paid unlock
//! - [`LockerContract`] -- allow-list gated smart lock
//! - [`RentalContract`] -- single-loan equipment rental
//! - [`SupplyContract`] -- item stock and forward-only deliveries
//! - [`ContractsConfig`] -- every tunable identifier, fee, and format
//!
//! # Design Rules
//!
//! 1. Business-rule rejections are returned as a [`Response`](lac_types::Response)
//!    with a non-success status and leave the write set empty.
//! 2. Unparsable arguments are hard errors, never domain results.
//! 3. Handlers take "now" only from the transaction timestamp.
//! 4. All preconditions are checked before the first write.

pub mod attendance;
pub mod config;
pub mod contract;
pub mod locker;
pub mod point;
pub mod rental;
pub mod reservation;
pub mod supply;
pub mod validators;

#[cfg(test)]
mod testing;

// Re-exports for convenience.
pub use attendance::{AttendanceContract, Entry, MonthlyEntries};
pub use config::{
    AttendanceConfig, ConfigError, ContractsConfig, LockerConfig, PointConfig, RentalConfig,
    ReservationConfig,
};
pub use contract::{expect_args, parse_arg, Command, Contract, Handler};
pub use locker::{LockerContract, LockerData, LockerStatus, LockerUser};
pub use point::{Balance, HistoryEntry, PointContract, TransferBill};
pub use rental::{EquipmentData, RentalContract, RentalUser};
pub use reservation::{ReservationContract, ReservationUser, Room, RoomStatus};
pub use supply::{Delivery, DeliveryStatus, Item, SupplyContract, UserDeliveries};
