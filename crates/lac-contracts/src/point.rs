//! Point balance ledger: transfers between users and issuance to the admin
//! account.
//!
//! Every transfer writes two balances and two transfer legs. The legs live
//! under a per-user, per-month key that each new leg overwrites, so the
//! month's full trail is recovered from the key's history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{decode, keys, InvokeError, InvokeResult, Points, Record, Response, Status};

use crate::config::PointConfig;
use crate::contract::{expect_args, Command, Contract};
use crate::validators;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub user_id: String,
    /// Spendable points.
    pub amount: Points,
    /// Everything ever received. Never decreases.
    pub total: Points,
}

impl Balance {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            amount: Points::ZERO,
            total: Points::ZERO,
        }
    }

    /// Add `points` to both the spendable amount and the running total.
    pub fn credited(&self, points: Points) -> Option<Self> {
        Some(Self {
            user_id: self.user_id.clone(),
            amount: self.amount.checked_add(points)?,
            total: self.total.checked_add(points)?,
        })
    }

    /// Take `points` off the spendable amount; the total is untouched.
    pub fn debited(&self, points: Points) -> Option<Self> {
        Some(Self {
            user_id: self.user_id.clone(),
            amount: self.amount.checked_sub(points)?,
            total: self.total,
        })
    }
}

impl Record for Balance {
    fn presence_field(&self) -> &str {
        &self.user_id
    }
}

/// One leg of a transfer, as seen from the user whose key it is stored under.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferBill {
    pub to_user_id: String,
    pub from_user_id: String,
    /// Positive on the receiving leg, negative on the paying leg.
    #[serde(rename = "price")]
    pub delta: Decimal,
}

impl Record for TransferBill {
    fn presence_field(&self) -> &str {
        &self.to_user_id
    }
}

/// A transfer leg with the commit time of the transaction that wrote it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub bill: TransferBill,
    pub created_at: String,
}

pub struct PointContract {
    config: PointConfig,
}

impl PointContract {
    pub fn new(config: PointConfig) -> Self {
        Self { config }
    }

    fn period(&self, ledger: &dyn LedgerAccessor) -> InvokeResult<String> {
        let fmt = self.config.history_month_format.as_str();
        ledger
            .tx_timestamp()
            .format(fmt)
            .ok_or_else(|| InvokeError::invalid("history_month_format", fmt, "malformed chrono format"))
    }

    pub fn get_balance(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<Balance>(&keys::balance(user_id))? {
            Some(balance) => Ok(Response::ok().with("balance", &balance)?),
            None => Ok(Response::error(
                Status::NotFound,
                format!("no balance for user {user_id}"),
            )),
        }
    }

    /// Every transfer leg ever written for the user in `year_month`, oldest
    /// first.
    pub fn get_history(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        year_month: &str,
    ) -> InvokeResult<Response> {
        let key = keys::transfer_bill(user_id, year_month);
        let mut history = Vec::new();
        for modification in ledger.history_of(&key)? {
            history.push(HistoryEntry {
                bill: decode(&modification.value)?,
                created_at: modification.timestamp.display_utc(),
            });
        }

        if history.is_empty() {
            return Ok(Response::error(
                Status::NotFound,
                format!("no transfers for user {user_id} in {year_month}"),
            ));
        }
        Ok(Response::ok().with("history", &history)?)
    }

    pub fn transfer(
        &self,
        ledger: &mut dyn LedgerAccessor,
        from_user_id: &str,
        to_user_id: &str,
        amount: &str,
    ) -> InvokeResult<Response> {
        let amount = match Points::parse(amount) {
            Ok(amount) => amount,
            Err(e) => return Ok(Response::error(Status::BadRequest, e.to_string())),
        };

        let Some(sender) = ledger.get_record::<Balance>(&keys::balance(from_user_id))? else {
            return Ok(Response::error(
                Status::NotFound,
                format!("no balance for sender {from_user_id}"),
            ));
        };
        if !validators::can_debit(&sender, amount) {
            return Ok(Response::error(Status::BadRequest, "insufficient balance"));
        }
        let Some(debited) = sender.debited(amount) else {
            return Ok(Response::error(Status::BadRequest, "insufficient balance"));
        };

        // A self-transfer credits the already-debited balance so the two
        // legs net to zero on a single record.
        let self_transfer = from_user_id == to_user_id;
        let receiver = if self_transfer {
            debited.clone()
        } else {
            ledger
                .get_record::<Balance>(&keys::balance(to_user_id))?
                .unwrap_or_else(|| Balance::empty(to_user_id))
        };
        let Some(credited) = receiver.credited(amount) else {
            return Ok(Response::error(Status::BadRequest, "receiver balance overflow"));
        };

        let period = self.period(ledger)?;
        let debit_leg = TransferBill {
            to_user_id: to_user_id.to_owned(),
            from_user_id: from_user_id.to_owned(),
            delta: amount.debit(),
        };
        let credit_leg = TransferBill {
            delta: amount.credit(),
            ..debit_leg.clone()
        };

        ledger.put_record(&keys::balance(to_user_id), &credited)?;
        ledger.put_record(&keys::transfer_bill(from_user_id, &period), &debit_leg)?;
        if !self_transfer {
            ledger.put_record(&keys::balance(from_user_id), &debited)?;
        }
        ledger.put_record(&keys::transfer_bill(to_user_id, &period), &credit_leg)?;

        debug!(from = from_user_id, to = to_user_id, amount = %amount, "transfer");
        let from_balance = if self_transfer { &credited } else { &debited };
        Ok(Response::ok()
            .with("from_user_balance", from_balance)?
            .with("to_user_balance", &credited)?)
    }

    /// Mint `amount` new points into the admin account.
    pub fn issue_new_point(&self, ledger: &mut dyn LedgerAccessor, amount: &str) -> InvokeResult<Response> {
        let amount = match Points::parse(amount) {
            Ok(amount) => amount,
            Err(e) => return Ok(Response::error(Status::BadRequest, e.to_string())),
        };

        let admin_id = self.config.admin_user_id.as_str();
        let admin = ledger
            .get_record::<Balance>(&keys::balance(admin_id))?
            .unwrap_or_else(|| Balance::empty(admin_id));
        let Some(admin) = admin.credited(amount) else {
            return Ok(Response::error(Status::BadRequest, "admin balance overflow"));
        };

        let period = self.period(ledger)?;
        let leg = TransferBill {
            to_user_id: admin_id.to_owned(),
            from_user_id: admin_id.to_owned(),
            delta: amount.credit(),
        };
        ledger.put_record(&keys::balance(admin_id), &admin)?;
        ledger.put_record(&keys::transfer_bill(admin_id, &period), &leg)?;

        debug!(amount = %amount, total = %admin.total, "issued points");
        Ok(Response::ok().with("admin_balance", &admin)?)
    }
}

impl Default for PointContract {
    fn default() -> Self {
        Self::new(PointConfig::default())
    }
}

impl Contract for PointContract {
    fn name(&self) -> &'static str {
        "point"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("getBalance", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("getBalance", args)?;
                c.get_balance(ledger, user_id)
            }),
            Command::new("getHistory", 2, |c: &Self, ledger, args| {
                let [user_id, year_month] = expect_args::<2>("getHistory", args)?;
                c.get_history(ledger, user_id, year_month)
            }),
            Command::new("transfer", 3, |c: &Self, ledger, args| {
                let [from, to, amount] = expect_args::<3>("transfer", args)?;
                c.transfer(ledger, from, to, amount)
            }),
            Command::new("issueNewPoint", 1, |c: &Self, ledger, args| {
                let [amount] = expect_args::<1>("issueNewPoint", args)?;
                c.issue_new_point(ledger, amount)
            }),
        ]
    }

    /// Create the admin balance if it does not exist yet.
    fn bootstrap(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        let admin_id = self.config.admin_user_id.as_str();
        let key = keys::balance(admin_id);
        let admin = match ledger.get_record::<Balance>(&key)? {
            Some(admin) => admin,
            None => {
                let admin = Balance::empty(admin_id);
                ledger.put_record(&key, &admin)?;
                admin
            }
        };
        Ok(Response::ok().with("admin_balance", &admin)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use lac_types::InvokeError;
    use proptest::prelude::*;

    fn harness() -> Harness<PointContract> {
        let mut h = Harness::new(PointContract::default());
        h.bootstrap();
        h
    }

    fn balance(h: &mut Harness<PointContract>, user: &str) -> Option<Balance> {
        h.record(&keys::balance(user))
    }

    fn points(s: &str) -> Points {
        Points::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Bootstrap and issuance
    // -----------------------------------------------------------------------

    #[test]
    fn bootstrap_is_idempotent() {
        let mut h = harness();
        h.ok("issueNewPoint", &["50"]);
        let resp = h.bootstrap();
        let admin: Balance = resp.field("admin_balance").unwrap().unwrap();
        assert_eq!(admin.amount, points("50"));
    }

    #[test]
    fn issue_credits_admin_and_records_leg() {
        let mut h = harness();
        h.ok("issueNewPoint", &["1000.5"]);
        let admin = balance(&mut h, "admin").unwrap();
        assert_eq!(admin.amount, points("1000.5"));
        assert_eq!(admin.total, points("1000.5"));

        let resp = h.ok("getHistory", &["admin", "201807"]);
        let history: Vec<HistoryEntry> = resp.field("history").unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bill.from_user_id, "admin");
        assert_eq!(history[0].bill.to_user_id, "admin");
        assert_eq!(history[0].bill.delta, points("1000.5").credit());
    }

    #[test]
    fn issue_without_bootstrap_creates_admin() {
        let mut h = Harness::new(PointContract::default());
        h.ok("issueNewPoint", &["10"]);
        assert_eq!(balance(&mut h, "admin").unwrap().amount, points("10"));
    }

    #[test]
    fn issue_rejects_negative_and_garbage() {
        let mut h = harness();
        let height = h.height();
        assert_eq!(h.run("issueNewPoint", &["-5"]).unwrap().status, Status::BadRequest);
        assert_eq!(h.run("issueNewPoint", &["five"]).unwrap().status, Status::BadRequest);
        assert_eq!(h.height(), height);
    }

    #[test]
    fn malformed_month_format_aborts() {
        let mut h = Harness::new(PointContract::new(PointConfig {
            history_month_format: "%Y%Q".into(),
            ..PointConfig::default()
        }));
        h.bootstrap();
        let height = h.height();

        let err = h.run("issueNewPoint", &["5"]).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArgument { name: "history_month_format", .. }));
        assert_eq!(h.height(), height);
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    #[test]
    fn transfer_moves_points() {
        let mut h = harness();
        h.ok("issueNewPoint", &["300"]);
        let resp = h.ok("transfer", &["admin", "1725", "120.25"]);

        let from: Balance = resp.field("from_user_balance").unwrap().unwrap();
        let to: Balance = resp.field("to_user_balance").unwrap().unwrap();
        assert_eq!(from.amount, points("179.75"));
        assert_eq!(from.total, points("300"));
        assert_eq!(to.amount, points("120.25"));
        assert_eq!(to.total, points("120.25"));

        assert_eq!(balance(&mut h, "1725").unwrap(), to);
        assert_eq!(balance(&mut h, "admin").unwrap(), from);
    }

    #[test]
    fn transfer_writes_both_legs() {
        let mut h = harness();
        h.ok("issueNewPoint", &["300"]);
        h.ok("transfer", &["admin", "1725", "100"]);

        let debit: TransferBill = h.record(&keys::transfer_bill("admin", "201807")).unwrap();
        let credit: TransferBill = h.record(&keys::transfer_bill("1725", "201807")).unwrap();
        assert_eq!(debit.delta, points("100").debit());
        assert_eq!(credit.delta, points("100").credit());
        assert_eq!(credit.from_user_id, "admin");
        assert_eq!(credit.to_user_id, "1725");
    }

    #[test]
    fn transfer_from_unknown_sender_not_found() {
        let mut h = harness();
        let resp = h.run("transfer", &["ghost", "1725", "1"]).unwrap();
        assert_eq!(resp.status, Status::NotFound);
    }

    #[test]
    fn overdraft_rejected_without_writes() {
        let mut h = harness();
        h.ok("issueNewPoint", &["10"]);
        let height = h.height();
        let resp = h.run("transfer", &["admin", "1725", "10.01"]).unwrap();
        assert_eq!(resp.status, Status::BadRequest);
        assert_eq!(h.height(), height);
        assert!(balance(&mut h, "1725").is_none());
    }

    #[test]
    fn whole_balance_may_be_spent() {
        let mut h = harness();
        h.ok("issueNewPoint", &["10"]);
        h.ok("transfer", &["admin", "1725", "10"]);
        assert_eq!(balance(&mut h, "admin").unwrap().amount, Points::ZERO);
    }

    #[test]
    fn unparsable_amount_is_bad_request() {
        let mut h = harness();
        h.ok("issueNewPoint", &["10"]);
        for bad in ["", "abc", "-1"] {
            let resp = h.run("transfer", &["admin", "1725", bad]).unwrap();
            assert_eq!(resp.status, Status::BadRequest, "amount {bad:?}");
        }
    }

    #[test]
    fn self_transfer_nets_to_zero() {
        let mut h = harness();
        h.ok("issueNewPoint", &["10"]);
        h.ok("transfer", &["admin", "admin", "4"]);

        let admin = balance(&mut h, "admin").unwrap();
        assert_eq!(admin.amount, points("10"));
        assert_eq!(admin.total, points("14"));
        let leg: TransferBill = h.record(&keys::transfer_bill("admin", "201807")).unwrap();
        assert_eq!(leg.delta, points("4").credit());
    }

    #[test]
    fn history_lists_every_leg_of_the_month() {
        let mut h = harness();
        h.ok("issueNewPoint", &["100"]);
        h.ok("transfer", &["admin", "1725", "10"]);
        h.ok("transfer", &["admin", "1725", "20"]);

        let resp = h.ok("getHistory", &["1725", "201807"]);
        let history: Vec<HistoryEntry> = resp.field("history").unwrap().unwrap();
        let deltas: Vec<Decimal> = history.iter().map(|e| e.bill.delta).collect();
        assert_eq!(deltas, vec![points("10").credit(), points("20").credit()]);
        assert!(history[0].created_at.ends_with(" UTC"));
        assert!(history[0].created_at < history[1].created_at);
    }

    #[test]
    fn empty_history_not_found() {
        let mut h = harness();
        let resp = h.run("getHistory", &["1725", "201807"]).unwrap();
        assert_eq!(resp.status, Status::NotFound);
    }

    #[test]
    fn get_balance_absent_and_present() {
        let mut h = harness();
        assert_eq!(h.run("getBalance", &["1725"]).unwrap().status, Status::NotFound);
        let resp = h.ok("getBalance", &["admin"]);
        let admin: Balance = resp.field("balance").unwrap().unwrap();
        assert_eq!(admin.user_id, "admin");
    }

    #[test]
    fn wrong_arity_is_hard_error() {
        let mut h = harness();
        let err = h.run("transfer", &["admin", "1725"]).unwrap_err();
        assert!(matches!(err, InvokeError::BadArgumentCount { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn amounts_serialize_as_decimal_strings() {
        let balance = Balance {
            user_id: "1725".into(),
            amount: points("2000.5"),
            total: points("2500"),
        };
        let json = serde_json::to_value(&balance).unwrap();
        assert_eq!(json["amount"], "2000.5");
        assert_eq!(json["total"], "2500");
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug)]
    enum Op {
        Issue(u32),
        Transfer(usize, usize, u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..500).prop_map(Op::Issue),
            (0usize..4, 0usize..4, 0u32..400).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
        ]
    }

    const USERS: [&str; 4] = ["admin", "u1", "u2", "u3"];

    proptest! {
        #[test]
        fn transfers_conserve_points(ops in proptest::collection::vec(op(), 1..25)) {
            let mut h = harness();
            let mut issued = Points::ZERO;

            for op in ops {
                match op {
                    Op::Issue(n) => {
                        h.ok("issueNewPoint", &[n.to_string().as_str()]);
                        issued = issued.checked_add(Points::from(n)).unwrap();
                    }
                    Op::Transfer(f, t, a) => {
                        h.run("transfer", &[USERS[f], USERS[t], a.to_string().as_str()]).unwrap();
                    }
                }

                let mut sum = Points::ZERO;
                for user in USERS {
                    if let Some(b) = balance(&mut h, user) {
                        prop_assert!(b.amount >= Points::ZERO);
                        prop_assert!(b.total >= b.amount);
                        sum = sum.checked_add(b.amount).unwrap();
                    }
                }
                prop_assert_eq!(sum, issued);
            }
        }

        #[test]
        fn totals_never_decrease(amounts in proptest::collection::vec(1u32..100, 1..10)) {
            let mut h = harness();
            h.ok("issueNewPoint", &["100000"]);
            let mut last = Points::ZERO;
            for a in amounts {
                let a = a.to_string();
                h.ok("transfer", &["admin", "u1", a.as_str()]);
                h.run("transfer", &["u1", "u2", a.as_str()]).unwrap();
                let total = balance(&mut h, "u1").unwrap().total;
                prop_assert!(total >= last);
                last = total;
            }
        }
    }
}
