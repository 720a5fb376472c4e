//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use profile_fragments::output::OutputConfig;

use crate::commands;

/// Profile Fragments - Load a shell profile split into independent fragments
#[derive(Parser, Debug)]
#[command(name = "profile-fragments")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Log everything this tool does at debug level
    #[arg(
        long,
        global = true,
        env = "PROFILE_FRAGMENTS_DEBUG",
        value_parser = FalseyValueParser::new(),
        action = ArgAction::SetTrue
    )]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print shell code that loads the fragment store
    Init(commands::init::InitArgs),

    /// Show the fragments a startup would load, in order
    Plan(commands::plan::PlanArgs),

    /// Run every planned fragment in a child shell and report the results
    Load(commands::load::LoadArgs),

    /// Show which fragment provides a command
    Which(commands::which::WhichArgs),

    /// Manage the persistent fragment cache
    Cache(commands::cache::CacheArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level, self.debug)?;
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Init(args) => commands::init::execute(args),
            Commands::Plan(args) => commands::plan::execute(args, &output),
            Commands::Load(args) => commands::load::execute(args, &output),
            Commands::Which(args) => commands::which::execute(args, &output),
            Commands::Cache(args) => commands::cache::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Route `log` records to stderr so shell code on stdout stays clean.
fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", level))?;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .format_timestamp(None);
    if debug {
        builder.filter_module("profile_fragments", LevelFilter::Debug);
    }
    // A logger may already be installed when running under tests
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "profile-fragments",
            "plan",
            "--dir",
            "/tmp/fragments",
            "--log-level",
            "debug",
            "--color",
            "never",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.color, "never");
        assert!(matches!(cli.command, Commands::Plan(_)));
    }

    #[test]
    fn test_parser_flag_is_case_insensitive() {
        let cli = Cli::try_parse_from(["profile-fragments", "plan", "--parser", "AST"]).unwrap();
        match cli.command {
            Commands::Plan(args) => assert_eq!(args.store.parser, commands::ParserArg::Ast),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_loaded_list_is_not_read_from_environment() {
        std::env::set_var("PROFILE_FRAGMENTS_LOADED", "env:git");
        let cli = Cli::try_parse_from(["profile-fragments", "init"]);
        std::env::remove_var("PROFILE_FRAGMENTS_LOADED");
        match cli.unwrap().command {
            Commands::Init(args) => assert!(args.loaded.is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_which_loaded_accepts_empty_list() {
        let cli = Cli::try_parse_from([
            "profile-fragments",
            "which",
            "--load",
            "--loaded=",
            "gst",
        ])
        .unwrap();
        match cli.command {
            Commands::Which(args) => {
                assert!(args.load);
                assert!(args.loaded.iter().all(String::is_empty));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_log_level() {
        assert!(init_logging("chatty", false).is_err());
        assert!(init_logging("info", true).is_ok());
    }
}
