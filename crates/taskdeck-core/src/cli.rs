use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: terminal client for a shared task board",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "server")]
    pub server: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// A parsed command invocation: the command token (abbreviations
/// expanded) and everything after it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(rest))]
    pub fn parse(rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        if tokens.is_empty() {
            debug!("no explicit command, defaulting to board");
            return Ok(Self {
                command: "board".to_string(),
                command_args: vec![],
            });
        }

        let first = tokens.remove(0);
        let command = crate::commands::expand_command_abbrev(
            &first,
            &crate::commands::known_command_names(),
        )
        .map(ToString::to_string)
        .unwrap_or(first);

        debug!(command = %command, args = ?tokens, "parsed invocation");

        Ok(Self {
            command,
            command_args: tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::Invocation;

    fn tokens(parts: &[&str]) -> Vec<OsString> {
        parts.iter().map(OsString::from).collect()
    }

    #[test]
    fn empty_invocation_defaults_to_board() {
        let inv = Invocation::parse(vec![]).expect("parse");
        assert_eq!(inv.command, "board");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn abbreviations_expand_to_full_commands() {
        let inv = Invocation::parse(tokens(&["bo", "starred"])).expect("parse");
        assert_eq!(inv.command, "board");
        assert_eq!(inv.command_args, vec!["starred".to_string()]);

        let inv = Invocation::parse(tokens(&["del", "4"])).expect("parse");
        assert_eq!(inv.command, "delete");
    }

    #[test]
    fn unknown_token_is_kept_for_dispatch_to_reject() {
        let inv = Invocation::parse(tokens(&["frobnicate"])).expect("parse");
        assert_eq!(inv.command, "frobnicate");
    }
}
