//! CLI argument definitions for the Weft binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use weft_core::WeftConfig;
use weft_engine::InteractionType;

/// Weft - apply prompt patterns to text through a language model.
#[derive(Parser, Debug)]
#[command(name = "weft", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Directory of pattern sub-directories (overrides the config file).
    #[arg(short = 'p', long = "patterns-dir")]
    pub patterns_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the pattern catalog by category.
    Patterns,

    /// Apply one pattern and print every display page.
    Run {
        #[arg(short = 'P', long = "pattern")]
        pattern: String,

        /// Input file; stdin when omitted.
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        /// Chunk the input and batch process every chunk.
        #[arg(long = "all")]
        all: bool,
    },

    /// Suggest a pattern for the input.
    Suggest {
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        #[arg(long = "interaction", default_value = "chat", value_parser = parse_interaction)]
        interaction: InteractionType,
    },

    /// Interactive session: action tokens are read from stdin, one per line.
    Session {
        /// Input file. Required, since stdin carries the action tokens.
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'u', long = "user", default_value = "local")]
        user: String,

        /// Where downloads are written.
        #[arg(short = 'o', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,
    },
}

impl CliArgs {
    /// Priority: --config flag > WEFT_CONFIG env var > ~/.weft/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        match &self.config {
            Some(p) => p.clone(),
            None => WeftConfig::default_path(),
        }
    }

    /// Priority: --patterns-dir flag > config file value. `None` means the
    /// built-in catalog.
    pub fn resolve_patterns_dir(&self, config: &WeftConfig) -> Option<PathBuf> {
        if let Some(p) = &self.patterns_dir {
            return Some(p.clone());
        }
        let configured = config.general.patterns_dir.trim();
        if configured.is_empty() {
            None
        } else {
            Some(expand_home(configured))
        }
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &WeftConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }
}

fn parse_interaction(s: &str) -> Result<InteractionType, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "chat" => Ok(InteractionType::Chat),
        "command" => Ok(InteractionType::Command),
        "transcript" => Ok(InteractionType::Transcript),
        "document" => Ok(InteractionType::Document),
        other => Err(format!("unknown interaction type: {}", other)),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = CliArgs::try_parse_from(["weft", "run", "--pattern", "summarize", "--all"]).unwrap();
        match args.command {
            Command::Run { pattern, input, all } => {
                assert_eq!(pattern, "summarize");
                assert!(input.is_none());
                assert!(all);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_interaction() {
        let args = CliArgs::try_parse_from(["weft", "suggest", "--interaction", "transcript"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Suggest {
                interaction: InteractionType::Transcript,
                ..
            }
        ));
        assert!(CliArgs::try_parse_from(["weft", "suggest", "--interaction", "song"]).is_err());
    }

    #[test]
    fn test_patterns_dir_priority() {
        let mut config = WeftConfig::default();
        let args = CliArgs::try_parse_from(["weft", "patterns"]).unwrap();
        assert_eq!(args.resolve_patterns_dir(&config), None);

        config.general.patterns_dir = "/srv/patterns".to_string();
        assert_eq!(args.resolve_patterns_dir(&config), Some(PathBuf::from("/srv/patterns")));

        let args = CliArgs::try_parse_from(["weft", "-p", "/tmp/p", "patterns"]).unwrap();
        assert_eq!(args.resolve_patterns_dir(&config), Some(PathBuf::from("/tmp/p")));
    }

    #[test]
    fn test_log_level_priority() {
        let config = WeftConfig::default();
        let args = CliArgs::try_parse_from(["weft", "patterns"]).unwrap();
        assert_eq!(args.resolve_log_level(&config), "info");
        let args = CliArgs::try_parse_from(["weft", "-l", "debug", "patterns"]).unwrap();
        assert_eq!(args.resolve_log_level(&config), "debug");
    }

    #[test]
    fn test_session_defaults() {
        let args = CliArgs::try_parse_from(["weft", "session", "-i", "notes.txt"]).unwrap();
        match args.command {
            Command::Session {
                input,
                user,
                out_dir,
            } => {
                assert_eq!(input, PathBuf::from("notes.txt"));
                assert_eq!(user, "local");
                assert_eq!(out_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_session_requires_input_file() {
        let err = CliArgs::try_parse_from(["weft", "session", "-u", "42"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
