//! Equipment rental: an admin registers equipment, users borrow one item at
//! a time and return it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{keys, InvokeError, InvokeResult, Record, Response, Status};

use crate::config::RentalConfig;
use crate::contract::{expect_args, parse_arg, Command, Contract};
use crate::validators;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentData {
    pub equipment_id: String,
    pub equipment_name: String,
    pub total: u32,
    /// Current borrowers; never longer than `total`.
    pub borrower_list: Vec<String>,
}

impl Record for EquipmentData {
    fn presence_field(&self) -> &str {
        &self.equipment_id
    }
}

/// Loan state of one user. `is_borrowing` holds exactly when
/// `equipment_id` is non-empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalUser {
    pub user_id: String,
    pub return_date: String,
    pub is_borrowing: bool,
    pub equipment_id: String,
}

impl RentalUser {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            ..Self::default()
        }
    }
}

impl Record for RentalUser {
    fn presence_field(&self) -> &str {
        &self.user_id
    }
}

pub struct RentalContract {
    config: RentalConfig,
}

impl RentalContract {
    pub fn new(config: RentalConfig) -> Self {
        Self { config }
    }

    fn user_not_found(user_id: &str) -> Response {
        Response::error(Status::NotFound, format!("no user {user_id}"))
    }

    fn equipment_not_found(equipment_id: &str) -> Response {
        Response::error(Status::NotFound, format!("no equipment {equipment_id}"))
    }

    pub fn register_user_data(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        let key = keys::user(user_id);
        if ledger.get_record::<RentalUser>(&key)?.is_some() {
            return Ok(Response::error(
                Status::Conflict,
                format!("user {user_id} already registered"),
            ));
        }
        let user = RentalUser::new(user_id);
        ledger.put_record(&key, &user)?;
        Ok(Response::ok().with("user_data", &user)?)
    }

    pub fn get_user_data(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<RentalUser>(&keys::user(user_id))? {
            Some(user) => Ok(Response::ok().with("user_data", &user)?),
            None => Ok(Self::user_not_found(user_id)),
        }
    }

    pub fn get_equipment_data(&self, ledger: &mut dyn LedgerAccessor, equipment_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<EquipmentData>(&keys::equipment(equipment_id))? {
            Some(equipment) => Ok(Response::ok().with("equipment_data", &equipment)?),
            None => Ok(Self::equipment_not_found(equipment_id)),
        }
    }

    /// Register new equipment. Only the admin account may do this.
    pub fn register_equipment_data(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        equipment_id: &str,
        name: &str,
        total: &str,
    ) -> InvokeResult<Response> {
        let total: u32 = parse_arg("total", total)?;
        if !validators::is_rental_admin(user_id, &self.config.admin_user_id) {
            return Ok(Response::error(
                Status::NotAllowed,
                "only the admin may register equipment",
            ));
        }

        let key = keys::equipment(equipment_id);
        if ledger.get_record::<EquipmentData>(&key)?.is_some() {
            return Ok(Response::error(
                Status::Conflict,
                format!("equipment {equipment_id} already registered"),
            ));
        }

        let equipment = EquipmentData {
            equipment_id: equipment_id.to_owned(),
            equipment_name: name.to_owned(),
            total,
            borrower_list: Vec::new(),
        };
        ledger.put_record(&key, &equipment)?;
        Ok(Response::ok().with("equipment_data", &equipment)?)
    }

    pub fn borrow_equipment(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        equipment_id: &str,
        return_date: &str,
    ) -> InvokeResult<Response> {
        let user_key = keys::user(user_id);
        let Some(mut user) = ledger.get_record::<RentalUser>(&user_key)? else {
            return Ok(Self::user_not_found(user_id));
        };
        if !validators::can_borrow(&user) {
            return Ok(Response::error(
                Status::NotAllowed,
                format!("user {user_id} must return {} first", user.equipment_id),
            ));
        }

        let equipment_key = keys::equipment(equipment_id);
        let Some(mut equipment) = ledger.get_record::<EquipmentData>(&equipment_key)? else {
            return Ok(Self::equipment_not_found(equipment_id));
        };
        if validators::remaining_stock(&equipment) == 0 {
            return Ok(Response::error(
                Status::NotFound,
                format!("no {equipment_id} left in stock"),
            ));
        }

        let format = self.config.return_date_format.as_str();
        let date = NaiveDate::parse_from_str(return_date, format)
            .map_err(|e| InvokeError::invalid("returnDate", return_date, e))?;

        user.return_date = date.format(format).to_string();
        user.is_borrowing = true;
        user.equipment_id = equipment_id.to_owned();
        equipment.borrower_list.push(user_id.to_owned());

        ledger.put_record(&user_key, &user)?;
        ledger.put_record(&equipment_key, &equipment)?;

        debug!(user_id, equipment_id, due = %user.return_date, "equipment borrowed");
        Ok(Response::ok().with("equipment_data", &equipment)?)
    }

    pub fn return_equipment(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        let user_key = keys::user(user_id);
        let Some(user) = ledger.get_record::<RentalUser>(&user_key)? else {
            return Ok(Self::user_not_found(user_id));
        };
        if !user.is_borrowing {
            return Ok(Response::error(
                Status::NotAllowed,
                format!("user {user_id} is not borrowing anything"),
            ));
        }

        let equipment_key = keys::equipment(&user.equipment_id);
        let Some(mut equipment) = ledger.get_record::<EquipmentData>(&equipment_key)? else {
            return Ok(Self::equipment_not_found(&user.equipment_id));
        };
        if let Some(pos) = equipment.borrower_list.iter().position(|id| id == user_id) {
            equipment.borrower_list.remove(pos);
        }

        ledger.put_record(&user_key, &RentalUser::new(user_id))?;
        ledger.put_record(&equipment_key, &equipment)?;

        debug!(user_id, equipment_id = %equipment.equipment_id, "equipment returned");
        Ok(Response::ok().with("equipment_data", &equipment)?)
    }
}

impl Default for RentalContract {
    fn default() -> Self {
        Self::new(RentalConfig::default())
    }
}

impl Contract for RentalContract {
    fn name(&self) -> &'static str {
        "rental"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("registerUserData", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("registerUserData", args)?;
                c.register_user_data(ledger, user_id)
            }),
            Command::new("getUserData", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("getUserData", args)?;
                c.get_user_data(ledger, user_id)
            }),
            Command::new("getEquipmentData", 1, |c: &Self, ledger, args| {
                let [equipment_id] = expect_args::<1>("getEquipmentData", args)?;
                c.get_equipment_data(ledger, equipment_id)
            }),
            Command::new("registerEquipmentData", 4, |c: &Self, ledger, args| {
                let [user_id, equipment_id, name, total] = expect_args::<4>("registerEquipmentData", args)?;
                c.register_equipment_data(ledger, user_id, equipment_id, name, total)
            }),
            Command::new("borrowEquipment", 3, |c: &Self, ledger, args| {
                let [user_id, equipment_id, return_date] = expect_args::<3>("borrowEquipment", args)?;
                c.borrow_equipment(ledger, user_id, equipment_id, return_date)
            }),
            Command::new("returnEquipment", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("returnEquipment", args)?;
                c.return_equipment(ledger, user_id)
            }),
        ]
    }

    /// Create the admin user if it does not exist yet.
    fn bootstrap(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        let admin_id = self.config.admin_user_id.as_str();
        let key = keys::user(admin_id);
        let admin = match ledger.get_record::<RentalUser>(&key)? {
            Some(admin) => admin,
            None => {
                let admin = RentalUser::new(admin_id);
                ledger.put_record(&key, &admin)?;
                admin
            }
        };
        Ok(Response::ok().with("user_data", &admin)?)
    }
}
