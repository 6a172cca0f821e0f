//! Command dispatch and commit runtime for the Ledger Application Core.
//!
//! A [`Dispatcher`] turns `(command name, string arguments)` into exactly
//! one handler call of a contract. The [`Runtime`] hosts several contracts,
//! runs each invocation against a snapshot of that contract's ledger, and
//! commits the resulting write set only when the response is a success.
//!
//! # Key Types
//!
//! - [`Dispatcher`] -- immutable name → handler table with arity checks
//! - [`Endpoint`] -- object-safe dispatcher so mixed contracts share one runtime
//! - [`Runtime`] -- per-contract ledgers, execute / commit / query / init
//! - [`Execution`] -- a handled invocation whose write set is still pending
//! - [`Outcome`] -- response plus the commit decision
//!
//! # Quick Start
//!
//! ```rust
//! use lac_contracts::ContractsConfig;
//! use lac_dispatch::Runtime;
//!
//! let runtime = Runtime::from_config(&ContractsConfig::default());
//! runtime.init_all(None).unwrap();
//!
//! let args = vec!["itemX".to_string(), "Widget".to_string(), "3".to_string()];
//! let outcome = runtime.invoke("supply", "putItem", &args, None).unwrap();
//! assert!(outcome.is_committed());
//! ```

pub mod dispatcher;
pub mod runtime;

// Re-exports for convenience.
pub use dispatcher::{CommandInfo, Dispatcher, Endpoint};
pub use runtime::{Execution, Outcome, Runtime};
