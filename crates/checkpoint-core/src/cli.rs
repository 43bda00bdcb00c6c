use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

/// When to colorize `list` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "always" => Ok(ColorMode::Always),
            "never" => Ok(ColorMode::Never),
            other => Err(format!("invalid color mode: {other} (expected auto, always, never)")),
        }
    }
}

/// The five verbs the engine understands, each with the exact argc the
/// original CLI enforced (clap's own parser now does that arity check).
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a new named snapshot of a tracked file.
    Create {
        source_path: PathBuf,
        checkpoint_name: String,
    },
    /// Walk one step toward the parent of the current checkpoint.
    Back { source_path: PathBuf },
    /// Jump the current checkpoint to an existing name anywhere in the tree.
    Swapto {
        source_path: PathBuf,
        checkpoint_name: String,
    },
    /// Forget a tracked file and its entire history.
    Delete { source_path: PathBuf },
    /// Print every tracked file and its checkpoint history.
    List,
}

#[derive(Debug, Parser)]
#[command(name = "cpt", about = "A per-directory file-checkpointing tool")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Override the default working directory (`./.cpt_`).
    #[arg(long, global = true)]
    pub repo_dir: Option<PathBuf>,

    /// Suppress the human-readable summary line on success.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Print a timing/size summary after the command completes.
    #[arg(long, global = true)]
    pub stats: bool,

    /// Colorize `list` output.
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorMode,
}

pub fn parse_args() -> Args {
    Args::parse()
}

/// Runtime configuration resolved once from [`Args`], so command handlers
/// never read `Args`/`std::env` directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub working_dir: PathBuf,
    pub quiet: bool,
    pub stats: bool,
    pub use_colors: bool,
}

impl Config {
    pub fn resolve(args: &Args) -> Self {
        let working_dir = args
            .repo_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./.cpt_"));

        let use_colors = match args.color {
            ColorMode::Auto => atty::is(atty::Stream::Stdout),
            ColorMode::Always => true,
            ColorMode::Never => false,
        };

        Config {
            working_dir,
            quiet: args.quiet,
            stats: args.stats,
            use_colors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mode_from_str_accepts_known_values() {
        assert_eq!(ColorMode::from_str("auto").unwrap(), ColorMode::Auto);
        assert_eq!(ColorMode::from_str("ALWAYS").unwrap(), ColorMode::Always);
        assert_eq!(ColorMode::from_str("never").unwrap(), ColorMode::Never);
        assert!(ColorMode::from_str("rainbow").is_err());
    }

    #[test]
    fn config_defaults_working_dir() {
        let args = Args {
            command: Command::List,
            repo_dir: None,
            quiet: false,
            stats: false,
            color: ColorMode::Never,
        };
        let cfg = Config::resolve(&args);
        assert_eq!(cfg.working_dir, PathBuf::from("./.cpt_"));
        assert!(!cfg.use_colors);
    }
}
