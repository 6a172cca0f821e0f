//! Supply and delivery tracking.
//!
//! Buying an item takes it out of stock and opens a delivery, which then
//! only moves forward: `ordered -> on_passage -> delivered`, with
//! `ordered -> delivered` allowed as a shortcut.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{keys, InvokeResult, Record, Response, Status};

use crate::contract::{expect_args, parse_arg, Command, Contract};
use crate::validators;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub item_id: String,
    pub name: String,
    pub stock: u32,
}

impl Record for Item {
    fn presence_field(&self) -> &str {
        &self.item_id
    }
}

/// Delivery progress, ordered by how far along it is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Ordered,
    OnPassage,
    Delivered,
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(Self::Ordered),
            "on_passage" => Ok(Self::OnPassage),
            "delivered" => Ok(Self::Delivered),
            other => Err(format!("unknown delivery status {other:?}")),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ordered => "ordered",
            Self::OnPassage => "on_passage",
            Self::Delivered => "delivered",
        })
    }
}

/// A delivery. Its id is also its ledger key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub delivery_id: String,
    pub user_id: String,
    pub item_id: String,
    pub quantity: u32,
    pub status: DeliveryStatus,
}

impl Record for Delivery {
    fn presence_field(&self) -> &str {
        &self.delivery_id
    }
}

/// Ids of every delivery a user has opened, oldest first. Append-only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDeliveries {
    pub user_id: String,
    pub delivery_ids: Vec<String>,
}

impl Record for UserDeliveries {
    fn presence_field(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Default)]
pub struct SupplyContract;

impl SupplyContract {
    pub fn new() -> Self {
        Self
    }

    fn item_not_found(item_id: &str) -> Response {
        Response::error(Status::NotFound, format!("no item {item_id}"))
    }

    /// First free delivery id for this purchase.
    ///
    /// Ids carry the transaction time to the second; a repeat purchase in
    /// the same second gets a `_2`, `_3`, ... suffix.
    fn next_delivery_id(ledger: &mut dyn LedgerAccessor, user_id: &str, item_id: &str) -> InvokeResult<String> {
        let base = keys::delivery(user_id, item_id, &ledger.tx_timestamp().compact());
        if ledger.get(&base)?.is_none() {
            return Ok(base);
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}_{n}");
            if ledger.get(&candidate)?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    pub fn put_item(&self, ledger: &mut dyn LedgerAccessor, item_id: &str, name: &str, stock: &str) -> InvokeResult<Response> {
        let stock: u32 = parse_arg("stock", stock)?;
        let item = Item {
            item_id: item_id.to_owned(),
            name: name.to_owned(),
            stock,
        };
        ledger.put_record(&keys::item(item_id), &item)?;
        Ok(Response::created().with("item", &item)?)
    }

    pub fn get_item(&self, ledger: &mut dyn LedgerAccessor, item_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<Item>(&keys::item(item_id))? {
            Some(item) => Ok(Response::ok().with("item", &item)?),
            None => Ok(Self::item_not_found(item_id)),
        }
    }

    pub fn replenish_item(&self, ledger: &mut dyn LedgerAccessor, item_id: &str, quantity: &str) -> InvokeResult<Response> {
        let quantity: u32 = parse_arg("quantity", quantity)?;
        let key = keys::item(item_id);
        let Some(mut item) = ledger.get_record::<Item>(&key)? else {
            return Ok(Self::item_not_found(item_id));
        };
        let Some(stock) = item.stock.checked_add(quantity) else {
            return Ok(Response::error(Status::BadRequest, "stock overflow"));
        };
        item.stock = stock;
        ledger.put_record(&key, &item)?;
        Ok(Response::ok().with("item", &item)?)
    }

    /// Take `quantity` out of stock and open an `ordered` delivery for it.
    pub fn buy(&self, ledger: &mut dyn LedgerAccessor, user_id: &str, item_id: &str, quantity: &str) -> InvokeResult<Response> {
        let quantity: u32 = parse_arg("quantity", quantity)?;
        let item_key = keys::item(item_id);
        let Some(mut item) = ledger.get_record::<Item>(&item_key)? else {
            return Ok(Self::item_not_found(item_id));
        };
        if !validators::can_fulfil(&item, quantity) {
            return Ok(Response::error(
                Status::BadRequest,
                format!("only {} of {item_id} in stock", item.stock),
            ));
        }

        let delivery = Delivery {
            delivery_id: Self::next_delivery_id(ledger, user_id, item_id)?,
            user_id: user_id.to_owned(),
            item_id: item_id.to_owned(),
            quantity,
            status: DeliveryStatus::Ordered,
        };
        item.stock -= quantity;

        let list_key = keys::user_deliveries(user_id);
        let mut list = ledger
            .get_record::<UserDeliveries>(&list_key)?
            .unwrap_or_else(|| UserDeliveries {
                user_id: user_id.to_owned(),
                delivery_ids: Vec::new(),
            });
        list.delivery_ids.push(delivery.delivery_id.clone());

        ledger.put_record(&delivery.delivery_id, &delivery)?;
        ledger.put_record(&item_key, &item)?;
        ledger.put_record(&list_key, &list)?;

        debug!(delivery_id = %delivery.delivery_id, quantity, stock = item.stock, "purchase");
        Ok(Response::created().with("delivery", &delivery)?)
    }

    pub fn update_delivery_status(
        &self,
        ledger: &mut dyn LedgerAccessor,
        delivery_id: &str,
        status: &str,
    ) -> InvokeResult<Response> {
        let Some(mut delivery) = ledger.get_record::<Delivery>(delivery_id)? else {
            return Ok(Response::error(
                Status::NotFound,
                format!("no delivery {delivery_id}"),
            ));
        };
        let to = match status.parse::<DeliveryStatus>() {
            Ok(to) if validators::can_transition(delivery.status, to) => to,
            Ok(to) => {
                return Ok(Response::error(
                    Status::BadRequest,
                    format!("cannot move delivery from {} to {to}", delivery.status),
                ))
            }
            Err(reason) => return Ok(Response::error(Status::BadRequest, reason)),
        };

        delivery.status = to;
        ledger.put_record(delivery_id, &delivery)?;
        Ok(Response::ok().with("delivery", &delivery)?)
    }

    /// Every delivery the user has opened, in purchase order.
    pub fn get_user_all_deliveries(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        let Some(list) = ledger.get_record::<UserDeliveries>(&keys::user_deliveries(user_id))? else {
            return Ok(Response::error(
                Status::NotFound,
                format!("no deliveries for user {user_id}"),
            ));
        };

        let mut deliveries = Vec::with_capacity(list.delivery_ids.len());
        for id in &list.delivery_ids {
            if let Some(delivery) = ledger.get_record::<Delivery>(id)? {
                deliveries.push(delivery);
            }
        }
        Ok(Response::ok()
            .with("user_id", &user_id)?
            .with("deliveries", &deliveries)?)
    }
}

impl Contract for SupplyContract {
    fn name(&self) -> &'static str {
        "supply"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("putItem", 3, |c: &Self, ledger, args| {
                let [item_id, name, stock] = expect_args::<3>("putItem", args)?;
                c.put_item(ledger, item_id, name, stock)
            }),
            Command::new("getItem", 1, |c: &Self, ledger, args| {
                let [item_id] = expect_args::<1>("getItem", args)?;
                c.get_item(ledger, item_id)
            }),
            Command::new("replenishItem", 2, |c: &Self, ledger, args| {
                let [item_id, quantity] = expect_args::<2>("replenishItem", args)?;
                c.replenish_item(ledger, item_id, quantity)
            }),
            Command::new("buy", 3, |c: &Self, ledger, args| {
                let [user_id, item_id, quantity] = expect_args::<3>("buy", args)?;
                c.buy(ledger, user_id, item_id, quantity)
            }),
            Command::new("updateDeliveryStatus", 2, |c: &Self, ledger, args| {
                let [delivery_id, status] = expect_args::<2>("updateDeliveryStatus", args)?;
                c.update_delivery_status(ledger, delivery_id, status)
            }),
            Command::new("getUserAllDeliveries", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("getUserAllDeliveries", args)?;
                c.get_user_all_deliveries(ledger, user_id)
            }),
        ]
    }
}
