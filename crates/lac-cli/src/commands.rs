use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use lac_contracts::ContractsConfig;
use lac_dispatch::{Outcome, Runtime};
use lac_store::InMemoryLedger;
use lac_types::{Response, TxTimestamp};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let mut runtime = Runtime::from_config(&config);
    let at = cli.at.map(TxTimestamp::from_unix);

    match cli.command {
        Command::Invoke(args) => cmd_invoke(&mut runtime, &cli.state, args, at, &cli.format),
        Command::Query(args) => cmd_query(&mut runtime, &cli.state, args, at, &cli.format),
        Command::Init(args) => cmd_init(&mut runtime, &cli.state, args, at, &cli.format),
        Command::Commands(args) => cmd_commands(&runtime, args, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ContractsConfig> {
    let Some(path) = path else {
        return Ok(ContractsConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    ContractsConfig::from_toml(&text).with_context(|| format!("loading config {}", path.display()))
}

fn ledger_path(state: &Path, contract: &str) -> PathBuf {
    state.join(format!("{contract}.json"))
}

/// Load `contract`'s ledger from the state directory into the runtime.
fn open(runtime: &mut Runtime, state: &Path, contract: &str) -> anyhow::Result<()> {
    runtime.commands(contract)?;
    let path = ledger_path(state, contract);
    let ledger = InMemoryLedger::load(&path).with_context(|| format!("loading ledger {}", path.display()))?;
    debug!(contract, path = %path.display(), keys = ledger.key_count(), "ledger loaded");
    runtime.replace_ledger(contract, ledger)?;
    Ok(())
}

fn save(runtime: &Runtime, state: &Path, contract: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(state).with_context(|| format!("creating {}", state.display()))?;
    let path = ledger_path(state, contract);
    runtime
        .ledger(contract)?
        .save(&path)
        .with_context(|| format!("saving ledger {}", path.display()))?;
    Ok(())
}

fn cmd_invoke(
    runtime: &mut Runtime,
    state: &Path,
    args: InvokeArgs,
    at: Option<TxTimestamp>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    open(runtime, state, &args.contract)?;
    let outcome = runtime.invoke(&args.contract, &args.command, &args.args, at)?;
    if outcome.is_committed() {
        save(runtime, state, &args.contract)?;
    }
    print_outcome(&outcome, format)
}

fn cmd_query(
    runtime: &mut Runtime,
    state: &Path,
    args: InvokeArgs,
    at: Option<TxTimestamp>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    open(runtime, state, &args.contract)?;
    let response = runtime.query(&args.contract, &args.command, &args.args, at)?;
    print_response(&response, format)
}

fn cmd_init(
    runtime: &mut Runtime,
    state: &Path,
    args: InitArgs,
    at: Option<TxTimestamp>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let contracts: Vec<String> = match args.contract {
        Some(contract) => vec![contract],
        None => runtime.contract_names().into_iter().map(String::from).collect(),
    };
    for contract in &contracts {
        open(runtime, state, contract)?;
        let outcome = runtime.init(contract, at)?;
        if outcome.is_committed() {
            save(runtime, state, contract)?;
        }
        if matches!(format, OutputFormat::Text) {
            println!("{}", contract.bold());
        }
        print_outcome(&outcome, format)?;
    }
    Ok(())
}

fn cmd_commands(runtime: &Runtime, args: CommandsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let Some(contract) = args.contract else {
        let names = runtime.contract_names();
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
            OutputFormat::Text => names.iter().for_each(|name| println!("{name}")),
        }
        return Ok(());
    };

    let commands = runtime.commands(&contract)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&commands)?),
        OutputFormat::Text => {
            for command in &commands {
                println!("  {:<24} {}", command.name.cyan(), format!("{} args", command.arity).dimmed());
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome, format: &OutputFormat) -> anyhow::Result<()> {
    print_response(&outcome.response, format)?;
    if matches!(format, OutputFormat::Text) {
        match outcome.committed_height {
            Some(height) => println!("  {} height {}", "committed".green(), height.to_string().bold()),
            None => println!("  {}", "nothing committed".dimmed()),
        }
    }
    Ok(())
}

fn print_response(response: &Response, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
        OutputFormat::Text => {
            if response.is_success() {
                println!("{} {}", "✓".green().bold(), response.status.to_string().green());
            } else {
                println!("{} {}", "✗".red().bold(), response.status.to_string().red());
            }
            if let Some(message) = &response.message {
                println!("  {message}");
            }
            for (field, value) in &response.payload {
                println!("  {}: {}", field.bold(), serde_json::to_string_pretty(value)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use lac_contracts::{Item, ReservationUser};
    use lac_types::{Record, Status};

    fn run(state: &Path, argv: &[&str]) -> anyhow::Result<()> {
        let mut full = vec!["lac", "--state"];
        let state = state.to_str().unwrap();
        full.push(state);
        full.extend_from_slice(argv);
        run_command(Cli::try_parse_from(full).unwrap())
    }

    fn reopen(state: &Path, contract: &str) -> Runtime {
        let mut runtime = Runtime::from_config(&ContractsConfig::default());
        open(&mut runtime, state, contract).unwrap();
        runtime
    }

    fn decoded<T: Record>(runtime: &Runtime, contract: &str, key: &str) -> Option<T> {
        let bytes = runtime.ledger(contract).unwrap().latest(key)?;
        lac_types::decode_record(Some(bytes.as_slice())).unwrap()
    }

    #[test]
    fn invoke_persists_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["invoke", "supply", "putItem", "itemX", "Widget", "3"]).unwrap();
        assert!(dir.path().join("supply.json").exists());

        run(dir.path(), &["invoke", "supply", "replenishItem", "itemX", "2"]).unwrap();
        let runtime = reopen(dir.path(), "supply");
        let item: Item = decoded(&runtime, "supply", "item_itemX").unwrap();
        assert_eq!(item.stock, 5);
    }

    #[test]
    fn rejected_invoke_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["invoke", "supply", "buy", "u1", "itemX", "1"]).unwrap();
        assert!(!dir.path().join("supply.json").exists());
    }

    #[test]
    fn query_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["query", "supply", "putItem", "itemX", "Widget", "3"]).unwrap();
        assert!(!dir.path().join("supply.json").exists());
    }

    #[test]
    fn hard_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), &["invoke", "supply", "putItem", "itemX"]).is_err());
        assert!(run(dir.path(), &["invoke", "bank", "open"]).is_err());
        assert!(run(dir.path(), &["commands", "bank"]).is_err());
    }

    #[test]
    fn init_bootstraps_every_contract() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["--format", "json", "init"]).unwrap();
        for contract in ["point", "locker", "rental"] {
            assert!(dir.path().join(format!("{contract}.json")).exists(), "{contract}");
        }
        assert!(!dir.path().join("supply.json").exists());
    }

    #[test]
    fn config_file_applies() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("lac.toml");
        std::fs::write(&config, "[reservation]\ninitial_balance = 0\n").unwrap();
        let state = dir.path().join("state");
        run(
            &state,
            &["--config", config.to_str().unwrap(), "invoke", "reservation", "putUser", "u1", "pw1"],
        )
        .unwrap();

        let runtime = reopen(&state, "reservation");
        let user: ReservationUser = decoded(&runtime, "reservation", "pw1").unwrap();
        assert_eq!(user.balance, 0);
    }

    #[test]
    fn invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("lac.toml");
        std::fs::write(&config, "[reservation]\nunlock_fee = -1\n").unwrap();
        assert!(run(dir.path(), &["--config", config.to_str().unwrap(), "commands"]).is_err());
    }

    #[test]
    fn fixed_transaction_time() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["--at", "1530477131", "invoke", "supply", "putItem", "itemX", "Widget", "3"]).unwrap();
        run(dir.path(), &["--at", "1530477131", "invoke", "supply", "buy", "u1", "itemX", "1"]).unwrap();
        let runtime = reopen(dir.path(), "supply");
        let key = "delivery_u1_itemX_20180701203211";
        assert!(runtime.ledger("supply").unwrap().latest(key).is_some());

        let resp = runtime.query("supply", "getUserAllDeliveries", &["u1".to_string()], None).unwrap();
        assert_eq!(resp.status, Status::Ok);
    }
}
