//! Test harness: runs a contract's commands against an in-memory ledger,
//! committing the write set of every successful invocation.

use lac_store::{InMemoryLedger, RecordAccess, TxContext, VersionedStore};
use lac_types::{InvokeResult, Record, Response, TxTimestamp};

use crate::contract::Contract;

/// 2018-07-01 20:32:11 UTC
pub const EPOCH: i64 = 1_530_477_131;

pub struct Harness<C: Contract> {
    pub contract: C,
    pub ledger: InMemoryLedger,
    clock: i64,
    /// Seconds the clock advances per invocation.
    pub step: i64,
}

impl<C: Contract> Harness<C> {
    pub fn new(contract: C) -> Self {
        Self {
            contract,
            ledger: InMemoryLedger::new(),
            clock: EPOCH,
            step: 1,
        }
    }

    fn tick(&mut self) -> (String, TxTimestamp) {
        self.clock += self.step;
        (format!("tx-{}", self.clock), TxTimestamp::from_unix(self.clock))
    }

    /// Run one command, committing on a success status.
    pub fn run(&mut self, command: &str, args: &[&str]) -> InvokeResult<Response> {
        let table = self.contract.commands();
        let cmd = table
            .iter()
            .find(|c| c.name == command)
            .unwrap_or_else(|| panic!("no command {command}"));
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();

        let (tx_id, ts) = self.tick();
        let mut ctx = TxContext::new(&self.ledger, tx_id, ts);
        let response = (cmd.handler)(&self.contract, &mut ctx, &args)?;
        if response.is_success() {
            self.ledger.apply(ctx.into_write_set())?;
        }
        Ok(response)
    }

    /// Run a command that must succeed.
    pub fn ok(&mut self, command: &str, args: &[&str]) -> Response {
        let response = self.run(command, args).unwrap();
        assert!(response.is_success(), "{command} {args:?} rejected: {response:?}");
        response
    }

    pub fn bootstrap(&mut self) -> Response {
        let (tx_id, ts) = self.tick();
        let mut ctx = TxContext::new(&self.ledger, tx_id, ts);
        let response = self.contract.bootstrap(&mut ctx).unwrap();
        self.ledger.apply(ctx.into_write_set()).unwrap();
        response
    }

    /// Decode the latest committed record under `key`.
    pub fn record<T: Record>(&mut self, key: &str) -> Option<T> {
        let (tx_id, ts) = self.tick();
        let mut ctx = TxContext::new(&self.ledger, tx_id, ts);
        ctx.get_record(key).unwrap()
    }

    pub fn height(&self) -> u64 {
        self.ledger.height()
    }
}
