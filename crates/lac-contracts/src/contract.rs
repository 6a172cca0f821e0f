use std::str::FromStr;

use lac_store::LedgerAccessor;
use lac_types::{InvokeError, InvokeResult, Response};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Signature of a command handler.
///
/// Handlers receive exactly the arguments the dispatcher has already
/// counted against [`Command::arity`].
pub type Handler<C> = fn(&C, &mut dyn LedgerAccessor, &[String]) -> InvokeResult<Response>;

/// One named operation of a contract with its fixed arity.
pub struct Command<C> {
    pub name: &'static str,
    pub arity: usize,
    pub handler: Handler<C>,
}

impl<C> Command<C> {
    pub const fn new(name: &'static str, arity: usize, handler: Handler<C>) -> Self {
        Self {
            name,
            arity,
            handler,
        }
    }
}

impl<C> Clone for Command<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Command<C> {}

impl<C> std::fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Contract trait
// ---------------------------------------------------------------------------

/// A domain machine: a named set of commands over its own ledger namespace.
pub trait Contract: Send + Sync + 'static {
    /// Name the contract is addressed by (`"point"`, `"rental"`, ...).
    fn name(&self) -> &'static str;

    /// The command table. Names must be unique.
    fn commands(&self) -> Vec<Command<Self>>
    where
        Self: Sized;

    /// Idempotent setup run once when the contract is installed.
    ///
    /// Creates whatever privileged records the contract needs; running it
    /// again on an initialised ledger changes nothing.
    fn bootstrap(&self, _ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        Ok(Response::ok())
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Borrow exactly `N` arguments, failing with `BadArgumentCount` otherwise.
pub fn expect_args<'a, const N: usize>(command: &str, args: &'a [String]) -> InvokeResult<[&'a str; N]> {
    if args.len() != N {
        return Err(InvokeError::BadArgumentCount {
            command: command.to_owned(),
            expected: N,
            actual: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

/// Parse an argument, turning failure into a hard `InvalidArgument` error.
pub fn parse_arg<T>(name: &'static str, value: &str) -> InvokeResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| InvokeError::invalid(name, value, e))
}
