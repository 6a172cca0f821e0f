use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lac",
    about = "Ledger Application Core: run domain commands against a local ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding one ledger file per contract
    #[arg(long, global = true, default_value = ".lac")]
    pub state: PathBuf,

    /// TOML file with contract settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Transaction time in UNIX seconds instead of the current time
    #[arg(long, global = true)]
    pub at: Option<i64>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a command and commit its writes on success
    Invoke(InvokeArgs),
    /// Run a command without committing anything
    Query(InvokeArgs),
    /// Run contract setup (all contracts when none is named)
    Init(InitArgs),
    /// List contracts or the commands of one contract
    Commands(CommandsArgs),
}

#[derive(Args)]
pub struct InvokeArgs {
    pub contract: String,
    pub command: String,
    /// Command arguments, passed through as strings
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct InitArgs {
    pub contract: Option<String>,
}

#[derive(Args)]
pub struct CommandsArgs {
    pub contract: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_invoke() {
        let cli = Cli::try_parse_from(["lac", "invoke", "point", "transfer", "a", "b", "10"]).unwrap();
        if let Command::Invoke(args) = cli.command {
            assert_eq!(args.contract, "point");
            assert_eq!(args.command, "transfer");
            assert_eq!(args.args, vec!["a", "b", "10"]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_invoke_without_args() {
        let cli = Cli::try_parse_from(["lac", "invoke", "reservation", "getAllRooms"]).unwrap();
        if let Command::Invoke(args) = cli.command {
            assert!(args.args.is_empty());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_negative_argument() {
        let cli = Cli::try_parse_from(["lac", "invoke", "reservation", "updateBalance", "pw1", "-5"]).unwrap();
        if let Command::Invoke(args) = cli.command {
            assert_eq!(args.args, vec!["pw1", "-5"]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_query() {
        let cli = Cli::try_parse_from(["lac", "query", "supply", "getItem", "itemX"]).unwrap();
        assert!(matches!(cli.command, Command::Query(_)));
    }

    #[test]
    fn parse_init_all() {
        let cli = Cli::try_parse_from(["lac", "init"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.contract.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_commands_for_contract() {
        let cli = Cli::try_parse_from(["lac", "commands", "rental"]).unwrap();
        if let Command::Commands(args) = cli.command {
            assert_eq!(args.contract, Some("rental".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "lac", "--state", "/tmp/lac", "--config", "lac.toml", "--at", "1530477131", "-v", "init",
        ])
        .unwrap();
        assert_eq!(cli.state, PathBuf::from("/tmp/lac"));
        assert_eq!(cli.config, Some(PathBuf::from("lac.toml")));
        assert_eq!(cli.at, Some(1_530_477_131));
        assert!(cli.verbose);
    }

    #[test]
    fn default_state_dir() {
        let cli = Cli::try_parse_from(["lac", "commands"]).unwrap();
        assert_eq!(cli.state, PathBuf::from(".lac"));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["lac", "--format", "json", "commands"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
