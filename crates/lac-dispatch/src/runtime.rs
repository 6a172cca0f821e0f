use std::collections::BTreeMap;

use tracing::{debug, info};
use uuid::Uuid;

use lac_contracts::{
    AttendanceContract, Contract, ContractsConfig, LockerContract, PointContract, RentalContract,
    ReservationContract, SupplyContract,
};
use lac_store::{InMemoryLedger, TxContext, VersionedStore, WriteSet};
use lac_types::{InvokeError, InvokeResult, Response, TxTimestamp};

use crate::dispatcher::{CommandInfo, Dispatcher, Endpoint};

// ---------------------------------------------------------------------------
// Execution / Outcome
// ---------------------------------------------------------------------------

/// A handled invocation whose writes have not been committed yet.
#[derive(Debug)]
pub struct Execution {
    pub contract: &'static str,
    pub command: String,
    pub response: Response,
    pub write_set: WriteSet,
}

/// The result of an invocation after the commit decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    pub tx_id: String,
    /// Ledger height reached by the commit; `None` when nothing was written.
    pub committed_height: Option<u64>,
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        self.committed_height.is_some()
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

struct Channel {
    endpoint: Box<dyn Endpoint>,
    ledger: InMemoryLedger,
}

/// Hosts contracts, each over its own ledger, and decides what gets
/// committed.
///
/// Every invocation runs against a snapshot of its contract's ledger. Its
/// write set is committed only when the handler returns a success status;
/// hard errors and rejections leave the ledger untouched. Commit fails with
/// [`InvokeError::StaleRead`] when a key the invocation read has changed
/// since its snapshot.
#[derive(Default)]
pub struct Runtime {
    channels: BTreeMap<&'static str, Channel>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime hosting all six domain contracts over empty ledgers.
    pub fn from_config(config: &ContractsConfig) -> Self {
        let mut runtime = Self::new();
        runtime.register(AttendanceContract::new(config.attendance.clone()));
        runtime.register(PointContract::new(config.point.clone()));
        runtime.register(ReservationContract::new(config.reservation.clone()));
        runtime.register(LockerContract::new(config.locker.clone()));
        runtime.register(RentalContract::new(config.rental.clone()));
        runtime.register(SupplyContract::new());
        runtime
    }

    /// Host `contract` over an empty ledger, replacing any contract of the
    /// same name.
    pub fn register<C: Contract>(&mut self, contract: C) {
        self.register_with_ledger(contract, InMemoryLedger::new());
    }

    pub fn register_with_ledger<C: Contract>(&mut self, contract: C, ledger: InMemoryLedger) {
        let endpoint = Dispatcher::new(contract);
        let name = Endpoint::name(&endpoint);
        self.channels.insert(
            name,
            Channel {
                endpoint: Box::new(endpoint),
                ledger,
            },
        );
    }

    fn channel(&self, contract: &str) -> InvokeResult<&Channel> {
        self.channels
            .get(contract)
            .ok_or_else(|| InvokeError::UnknownContract(contract.to_owned()))
    }

    pub fn contract_names(&self) -> Vec<&'static str> {
        self.channels.keys().copied().collect()
    }

    pub fn commands(&self, contract: &str) -> InvokeResult<Vec<CommandInfo>> {
        Ok(self.channel(contract)?.endpoint.commands())
    }

    pub fn ledger(&self, contract: &str) -> InvokeResult<&InMemoryLedger> {
        Ok(&self.channel(contract)?.ledger)
    }

    /// Swap in a different ledger for `contract`, returning the old one.
    pub fn replace_ledger(&mut self, contract: &str, ledger: InMemoryLedger) -> InvokeResult<InMemoryLedger> {
        let channel = self
            .channels
            .get_mut(contract)
            .ok_or_else(|| InvokeError::UnknownContract(contract.to_owned()))?;
        Ok(std::mem::replace(&mut channel.ledger, ledger))
    }

    /// Run a command against the current snapshot without committing.
    pub fn execute(&self, contract: &str, command: &str, args: &[String], at: TxTimestamp) -> InvokeResult<Execution> {
        let channel = self.channel(contract)?;
        let mut ctx = TxContext::new(&channel.ledger, Uuid::now_v7().to_string(), at);
        let response = channel.endpoint.dispatch(&mut ctx, command, args)?;
        Ok(Execution {
            contract: channel.endpoint.name(),
            command: command.to_owned(),
            response,
            write_set: ctx.into_write_set(),
        })
    }

    /// Apply an execution's writes if its response is a success.
    pub fn commit(&self, execution: Execution) -> InvokeResult<Outcome> {
        let Execution {
            contract,
            command,
            response,
            write_set,
        } = execution;
        let tx_id = write_set.tx_id.clone();

        if !response.is_success() || write_set.is_empty() {
            debug!(
                contract,
                command = %command,
                tx_id = %tx_id,
                status = response.status.code(),
                writes = write_set.writes.len(),
                "write set discarded"
            );
            return Ok(Outcome {
                response,
                tx_id,
                committed_height: None,
            });
        }

        let writes = write_set.writes.len();
        let height = self.channel(contract)?.ledger.apply(write_set)?;
        info!(contract, command = %command, tx_id = %tx_id, writes, height, "committed");
        Ok(Outcome {
            response,
            tx_id,
            committed_height: Some(height),
        })
    }

    /// Execute and commit in one step. `at` defaults to the wall clock.
    pub fn invoke(
        &self,
        contract: &str,
        command: &str,
        args: &[String],
        at: Option<TxTimestamp>,
    ) -> InvokeResult<Outcome> {
        let execution = self.execute(contract, command, args, at.unwrap_or_else(TxTimestamp::now))?;
        self.commit(execution)
    }

    /// Execute and discard the write set.
    pub fn query(
        &self,
        contract: &str,
        command: &str,
        args: &[String],
        at: Option<TxTimestamp>,
    ) -> InvokeResult<Response> {
        let execution = self.execute(contract, command, args, at.unwrap_or_else(TxTimestamp::now))?;
        debug!(contract, command, tx_id = %execution.write_set.tx_id, "query");
        Ok(execution.response)
    }

    /// Run the contract's idempotent setup and commit what it writes.
    pub fn init(&self, contract: &str, at: Option<TxTimestamp>) -> InvokeResult<Outcome> {
        let channel = self.channel(contract)?;
        let at = at.unwrap_or_else(TxTimestamp::now);
        let mut ctx = TxContext::new(&channel.ledger, Uuid::now_v7().to_string(), at);
        let response = channel.endpoint.bootstrap(&mut ctx)?;
        self.commit(Execution {
            contract: channel.endpoint.name(),
            command: "init".to_owned(),
            response,
            write_set: ctx.into_write_set(),
        })
    }

    /// Bootstrap every hosted contract.
    pub fn init_all(&self, at: Option<TxTimestamp>) -> InvokeResult<Vec<Outcome>> {
        self.contract_names()
            .into_iter()
            .map(|name| self.init(name, at))
            .collect()
    }

    /// Current height of `contract`'s ledger.
    pub fn height(&self, contract: &str) -> InvokeResult<u64> {
        Ok(self.channel(contract)?.ledger.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lac_contracts::{
        Balance, Delivery, EquipmentData, ReservationConfig, ReservationUser, Room, RoomStatus,
    };
    use lac_types::Status;
    use proptest::prelude::*;

    /// 2018-07-01 20:32:11 UTC
    const T0: i64 = 1_530_477_131;

    fn at(offset: i64) -> Option<TxTimestamp> {
        Some(TxTimestamp::from_unix(T0 + offset))
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn runtime() -> Runtime {
        let runtime = Runtime::from_config(&ContractsConfig::default());
        runtime.init_all(at(0)).unwrap();
        runtime
    }

    fn invoke(rt: &Runtime, contract: &str, command: &str, values: &[&str]) -> Outcome {
        rt.invoke(contract, command, &args(values), at(1)).unwrap()
    }

    fn status(rt: &Runtime, contract: &str, command: &str, values: &[&str]) -> Status {
        invoke(rt, contract, command, values).response.status
    }

    // -----------------------------------------------------------------------
    // Registration and routing
    // -----------------------------------------------------------------------

    #[test]
    fn hosts_all_contracts() {
        let rt = runtime();
        assert_eq!(
            rt.contract_names(),
            vec!["attendance", "locker", "point", "rental", "reservation", "supply"]
        );
        let commands = rt.commands("reservation").unwrap();
        assert!(commands.iter().any(|c| c.name == "getAllRooms" && c.arity == 0));
    }

    #[test]
    fn unknown_contract() {
        let rt = runtime();
        assert_eq!(
            rt.invoke("bank", "transfer", &[], None),
            Err(InvokeError::UnknownContract("bank".into()))
        );
        assert!(matches!(rt.commands("bank"), Err(InvokeError::UnknownContract(_))));
    }

    #[test]
    fn hard_errors_commit_nothing() {
        let rt = runtime();
        let height = rt.height("point").unwrap();
        assert!(matches!(
            rt.invoke("point", "transfer", &args(&["admin", "u1"]), at(1)),
            Err(InvokeError::BadArgumentCount { expected: 3, actual: 2, .. })
        ));
        assert!(matches!(
            rt.invoke("point", "mint", &args(&["1"]), at(1)),
            Err(InvokeError::UnknownCommand(_))
        ));
        assert_eq!(rt.height("point").unwrap(), height);
    }

    // -----------------------------------------------------------------------
    // Commit decisions
    // -----------------------------------------------------------------------

    #[test]
    fn success_commits_and_rejection_does_not() {
        let rt = runtime();
        let outcome = invoke(&rt, "supply", "putItem", &["itemX", "Widget", "3"]);
        assert_eq!(outcome.response.status, Status::Created);
        assert!(outcome.is_committed());
        let height = rt.height("supply").unwrap();

        let outcome = invoke(&rt, "supply", "buy", &["u1", "itemX", "5"]);
        assert_eq!(outcome.response.status, Status::BadRequest);
        assert!(!outcome.is_committed());
        assert_eq!(rt.height("supply").unwrap(), height);
    }

    #[test]
    fn query_never_commits() {
        let rt = runtime();
        let height = rt.height("supply").unwrap();
        let resp = rt
            .query("supply", "putItem", &args(&["itemX", "Widget", "3"]), at(1))
            .unwrap();
        assert_eq!(resp.status, Status::Created);
        assert_eq!(rt.height("supply").unwrap(), height);
        assert_eq!(status(&rt, "supply", "getItem", &["itemX"]), Status::NotFound);
    }

    #[test]
    fn init_is_idempotent() {
        let rt = runtime();
        let heights: Vec<u64> = rt.contract_names().iter().map(|c| rt.height(c).unwrap()).collect();
        let outcomes = rt.init_all(at(5)).unwrap();
        assert!(outcomes.iter().all(|o| !o.is_committed()));
        let after: Vec<u64> = rt.contract_names().iter().map(|c| rt.height(c).unwrap()).collect();
        assert_eq!(heights, after);
    }

    #[test]
    fn stale_snapshot_rejected_at_commit() {
        let rt = runtime();
        invoke(&rt, "point", "issueNewPoint", &["100"]);

        let transfer = args(&["admin", "u1", "60"]);
        let first = rt.execute("point", "transfer", &transfer, TxTimestamp::from_unix(T0 + 2)).unwrap();
        let second = rt.execute("point", "transfer", &transfer, TxTimestamp::from_unix(T0 + 2)).unwrap();
        assert!(first.response.is_success());
        assert!(second.response.is_success());

        assert!(rt.commit(first).unwrap().is_committed());
        assert!(matches!(rt.commit(second), Err(InvokeError::StaleRead { .. })));

        let resp = rt.query("point", "getBalance", &args(&["admin"]), None).unwrap();
        let admin: Balance = resp.field("balance").unwrap().unwrap();
        assert_eq!(admin.amount.to_string(), "40");
    }

    #[test]
    fn contracts_do_not_share_keys() {
        let rt = runtime();
        invoke(&rt, "rental", "registerUserData", &["u1"]);
        assert_eq!(status(&rt, "rental", "getUserData", &["u1"]), Status::Ok);
        assert_eq!(status(&rt, "locker", "getUserData", &["u1"]), Status::NotFound);
        assert!(rt.ledger("rental").unwrap().latest("user_u1").is_some());
        assert!(rt.ledger("locker").unwrap().latest("user_u1").is_none());
    }

    #[test]
    fn replaced_ledger_is_used() {
        let mut rt = runtime();
        invoke(&rt, "supply", "putItem", &["itemX", "Widget", "3"]);
        let old = rt.replace_ledger("supply", InMemoryLedger::new()).unwrap();
        assert!(old.latest("item_itemX").is_some());
        assert_eq!(status(&rt, "supply", "getItem", &["itemX"]), Status::NotFound);
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    fn user(rt: &Runtime, password: &str) -> ReservationUser {
        let resp = rt.query("reservation", "getUser", &args(&[password]), None).unwrap();
        resp.field("user").unwrap().unwrap()
    }

    fn room(rt: &Runtime, id: &str) -> Room {
        let resp = rt.query("reservation", "getRoom", &args(&[id]), None).unwrap();
        resp.field("room").unwrap().unwrap()
    }

    #[test]
    fn reservation_walkthrough() {
        let rt = runtime();
        assert_eq!(status(&rt, "reservation", "putUser", &["u1", "pw1"]), Status::Created);
        let u = user(&rt, "pw1");
        assert_eq!(u.balance, 300);
        assert_eq!(u.reserved_room_id, "");

        invoke(&rt, "reservation", "putRoom", &["r1"]);
        assert_eq!(room(&rt, "r1").status_of_use, RoomStatus::NotUsed);

        assert_eq!(status(&rt, "reservation", "reserve", &["pw1", "r1"]), Status::Ok);
        assert_eq!(room(&rt, "r1").status_of_use, RoomStatus::Used);
        assert_eq!(user(&rt, "pw1").reserved_room_id, "r1");
        assert_eq!(status(&rt, "reservation", "reserve", &["pw1", "r1"]), Status::Conflict);

        invoke(&rt, "reservation", "updateBalance", &["pw1", "5"]);
        let outcome = invoke(&rt, "reservation", "unlock", &["pw1"]);
        assert_eq!(outcome.response.status, Status::Conflict);
        assert_eq!(outcome.response.field::<bool>("is_unlock").unwrap(), Some(false));
        assert!(!outcome.is_committed());
        assert_eq!(user(&rt, "pw1").balance, 5);
        assert_eq!(room(&rt, "r1").status_of_use, RoomStatus::Used);
    }

    #[test]
    fn configured_initial_balance() {
        let config = ContractsConfig {
            reservation: ReservationConfig {
                initial_balance: 0,
                ..ReservationConfig::default()
            },
            ..ContractsConfig::default()
        };
        let rt = Runtime::from_config(&config);
        invoke(&rt, "reservation", "putUser", &["u1", "pw1"]);
        assert_eq!(user(&rt, "pw1").balance, 0);
    }

    #[test]
    fn delivery_cannot_move_backwards() {
        let rt = runtime();
        invoke(&rt, "supply", "putItem", &["itemX", "Widget", "3"]);
        let resp = invoke(&rt, "supply", "buy", &["u1", "itemX", "1"]).response;
        let delivery: Delivery = resp.field("delivery").unwrap().unwrap();
        let id = delivery.delivery_id.as_str();

        assert_eq!(status(&rt, "supply", "updateDeliveryStatus", &[id, "delivered"]), Status::Ok);
        assert_eq!(status(&rt, "supply", "updateDeliveryStatus", &[id, "on_passage"]), Status::BadRequest);
    }

    #[test]
    fn rental_stock_exhaustion() {
        let rt = runtime();
        assert_eq!(
            status(&rt, "rental", "registerEquipmentData", &["0001_admin", "e1", "Camera", "1"]),
            Status::Ok
        );
        invoke(&rt, "rental", "registerUserData", &["u1"]);
        invoke(&rt, "rental", "registerUserData", &["u2"]);
        assert_eq!(status(&rt, "rental", "borrowEquipment", &["u1", "e1", "2018/08/01"]), Status::Ok);
        assert_eq!(status(&rt, "rental", "borrowEquipment", &["u2", "e1", "2018/08/01"]), Status::NotFound);

        let resp = rt.query("rental", "getEquipmentData", &args(&["e1"]), None).unwrap();
        let equipment: EquipmentData = resp.field("equipment_data").unwrap().unwrap();
        assert_eq!(equipment.borrower_list, vec!["u1".to_string()]);
    }

    #[test]
    fn history_carries_commit_times() {
        let rt = runtime();
        rt.invoke("point", "issueNewPoint", &args(&["10"]), at(60)).unwrap();
        rt.invoke("point", "issueNewPoint", &args(&["5"]), at(120)).unwrap();
        let resp = rt.query("point", "getHistory", &args(&["admin", "201807"]), None).unwrap();
        let history: Vec<serde_json::Value> = resp.field("history").unwrap().unwrap();
        let times: Vec<&str> = history.iter().filter_map(|h| h["created_at"].as_str()).collect();
        assert_eq!(times, vec!["2018-07-01 20:33:11 UTC", "2018-07-01 20:34:11 UTC"]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn reservation_command() -> impl Strategy<Value = (&'static str, Vec<String>)> {
        let password = prop::sample::select(vec!["pw1", "pw2"]);
        let room = prop::sample::select(vec!["r1", "r2"]);
        prop_oneof![
            (password.clone(), room.clone()).prop_map(|(p, r)| ("reserve", vec![p.to_string(), r.to_string()])),
            password.clone().prop_map(|p| ("unlock", vec![p.to_string()])),
            (password, -5i64..40).prop_map(|(p, b)| ("updateBalance", vec![p.to_string(), b.to_string()])),
            room.prop_map(|r| ("putRoom", vec![r.to_string()])),
        ]
    }

    proptest! {
        #[test]
        fn height_moves_only_on_success(commands in proptest::collection::vec(reservation_command(), 1..30)) {
            let rt = runtime();
            rt.invoke("reservation", "putUser", &args(&["u1", "pw1"]), at(1)).unwrap();
            rt.invoke("reservation", "putUser", &args(&["u2", "pw2"]), at(1)).unwrap();

            for (command, command_args) in commands {
                let before = rt.height("reservation").unwrap();
                let outcome = rt.invoke("reservation", command, &command_args, at(2)).unwrap();
                let after = rt.height("reservation").unwrap();
                if outcome.response.is_success() {
                    prop_assert_eq!(after, before + 1, "{} {:?}", command, command_args);
                } else {
                    prop_assert_eq!(after, before, "{} {:?}", command, command_args);
                }
            }
        }
    }
}
