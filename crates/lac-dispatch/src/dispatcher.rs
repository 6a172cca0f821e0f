use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use lac_contracts::{Command, Contract};
use lac_store::LedgerAccessor;
use lac_types::{InvokeError, InvokeResult, Response};

// ---------------------------------------------------------------------------
// CommandInfo
// ---------------------------------------------------------------------------

/// Name and arity of one registered command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: &'static str,
    pub arity: usize,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes a command name to one handler of a contract.
///
/// The name table is built once from [`Contract::commands`] and never
/// changes afterwards. Unknown names and wrong argument counts are rejected
/// before any handler runs.
pub struct Dispatcher<C: Contract> {
    contract: C,
    table: HashMap<&'static str, Command<C>>,
}

impl<C: Contract> Dispatcher<C> {
    pub fn new(contract: C) -> Self {
        let mut table = HashMap::new();
        for command in contract.commands() {
            if table.insert(command.name, command).is_some() {
                warn!(contract = contract.name(), command = command.name, "duplicate command; later entry wins");
            }
        }
        Self { contract, table }
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Registered commands, sorted by name.
    pub fn commands(&self) -> Vec<CommandInfo> {
        let mut commands: Vec<CommandInfo> = self
            .table
            .values()
            .map(|c| CommandInfo {
                name: c.name,
                arity: c.arity,
            })
            .collect();
        commands.sort_by_key(|c| c.name);
        commands
    }

    fn route(&self, command: &str, args: &[String]) -> InvokeResult<&Command<C>> {
        let entry = self
            .table
            .get(command)
            .ok_or_else(|| InvokeError::UnknownCommand(command.to_owned()))?;
        if args.len() != entry.arity {
            return Err(InvokeError::BadArgumentCount {
                command: command.to_owned(),
                expected: entry.arity,
                actual: args.len(),
            });
        }
        Ok(entry)
    }

    /// Run `command` against `ledger`.
    pub fn dispatch(&self, ledger: &mut dyn LedgerAccessor, command: &str, args: &[String]) -> InvokeResult<Response> {
        let contract = self.contract.name();
        debug!(contract, command, args = args.len(), "dispatch");

        let result = self
            .route(command, args)
            .and_then(|entry| (entry.handler)(&self.contract, ledger, args));
        match &result {
            Ok(response) => debug!(contract, command, status = response.status.code(), "handled"),
            Err(err) => warn!(contract, command, error = %err, "invocation aborted"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Object-safe view of a [`Dispatcher`], so contracts of different types
/// can sit side by side in one runtime.
pub trait Endpoint: Send + Sync {
    fn name(&self) -> &'static str;

    fn commands(&self) -> Vec<CommandInfo>;

    fn dispatch(&self, ledger: &mut dyn LedgerAccessor, command: &str, args: &[String]) -> InvokeResult<Response>;

    /// Run the contract's idempotent setup.
    fn bootstrap(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response>;
}

impl<C: Contract> Endpoint for Dispatcher<C> {
    fn name(&self) -> &'static str {
        self.contract.name()
    }

    fn commands(&self) -> Vec<CommandInfo> {
        Dispatcher::commands(self)
    }

    fn dispatch(&self, ledger: &mut dyn LedgerAccessor, command: &str, args: &[String]) -> InvokeResult<Response> {
        Dispatcher::dispatch(self, ledger, command, args)
    }

    fn bootstrap(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        debug!(contract = self.contract.name(), "bootstrap");
        self.contract.bootstrap(ledger)
    }
}
