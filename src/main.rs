use std::time::Instant;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use checkpoint_core::{Command, Config};
use checkpoint_engine::{
    ensure_working_dir, fs_ops, log_path, read_log, write_log, CheckpointLog, RepoLock,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let program_start = Instant::now();
    let args = checkpoint_core::parse_args();
    let config = Config::resolve(&args);

    if let Err(err) = run(&args.command, &config, program_start) {
        eprintln!("cpt: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn run(command: &Command, config: &Config, program_start: Instant) -> Result<()> {
    let _span = tracing::info_span!("command", verb = command_label(command)).entered();
    tracing::info!(working_dir = %config.working_dir.display(), "dispatching command");

    ensure_working_dir(&config.working_dir).context("setting up working directory")?;
    let lock = RepoLock::acquire(&config.working_dir).context("acquiring repository lock")?;
    tracing::debug!("repository lock acquired");

    let log_file = log_path(&config.working_dir);
    let load_start = Instant::now();
    let mut log = read_log(&log_file).context("reading checkpoint log")?;
    let load_elapsed = load_start.elapsed();
    tracing::trace!(?load_elapsed, "checkpoint log loaded");

    let mutate_start = Instant::now();
    let mutated = dispatch(command, config, &mut log)?;
    let mutate_elapsed = mutate_start.elapsed();

    let save_start = Instant::now();
    if mutated {
        write_log(&log_file, &log).context("writing checkpoint log")?;
        tracing::debug!("checkpoint log rewritten");
    }
    let save_elapsed = save_start.elapsed();

    drop(lock);

    if config.stats {
        print_debug_summary(
            command,
            load_elapsed,
            mutate_elapsed,
            save_elapsed,
            &log_file,
            program_start.elapsed(),
        );
    }

    Ok(())
}

/// Runs one of the five verbs against the loaded log, returning whether the
/// log needs to be rewritten (every verb but a no-op `back`-at-root or
/// `list` mutates).
fn dispatch(command: &Command, config: &Config, log: &mut CheckpointLog) -> Result<bool> {
    match command {
        Command::Create {
            source_path,
            checkpoint_name,
        } => {
            let working_dir = config.working_dir.clone();
            let source_path_str = source_path.display().to_string();
            log.create(&source_path_str, checkpoint_name, |src, name| {
                fs_ops::snapshot(std::path::Path::new(src), &working_dir, name)
            })?;
            if !config.quiet {
                println!("created checkpoint '{checkpoint_name}' for '{source_path_str}'");
            }
            Ok(true)
        }
        Command::Back { source_path } => {
            let working_dir = config.working_dir.clone();
            let source_path_str = source_path.display().to_string();
            match log.back(&source_path_str, |src, name| {
                fs_ops::restore_from_checkpoint(std::path::Path::new(src), &working_dir, name)
            }) {
                Ok(()) => {
                    if !config.quiet {
                        println!("'{source_path_str}' moved back one checkpoint");
                    }
                    Ok(true)
                }
                Err(checkpoint_core::CheckpointError::Consistency(msg))
                    if msg.contains("already at its root checkpoint") =>
                {
                    if !config.quiet {
                        println!("'{source_path_str}' is already at its root checkpoint");
                    }
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Swapto {
            source_path,
            checkpoint_name,
        } => {
            let working_dir = config.working_dir.clone();
            let source_path_str = source_path.display().to_string();
            log.swapto(&source_path_str, checkpoint_name, |src, name| {
                fs_ops::restore_from_checkpoint(std::path::Path::new(src), &working_dir, name)
            })?;
            if !config.quiet {
                println!("'{source_path_str}' switched to checkpoint '{checkpoint_name}'");
            }
            Ok(true)
        }
        Command::Delete { source_path } => {
            let source_path_str = source_path.display().to_string();
            log.delete(&source_path_str, |_name| Ok(()))?;
            tracing::warn!(
                source_path = %source_path_str,
                "snapshot files for this path's checkpoints were left on disk"
            );
            if !config.quiet {
                println!("'{source_path_str}' and its checkpoint history were deleted");
            }
            Ok(true)
        }
        Command::List => {
            let listing = log.format_listing(config.use_colors);
            if listing.is_empty() {
                if !config.quiet {
                    println!("no saved checkpoints");
                }
            } else if !config.quiet {
                print!("{listing}");
            }
            Ok(false)
        }
    }
}

fn print_debug_summary(
    command: &Command,
    load_time: std::time::Duration,
    mutate_time: std::time::Duration,
    save_time: std::time::Duration,
    log_path: &std::path::Path,
    total_time: std::time::Duration,
) {
    eprintln!("\n{}", "=".repeat(70));
    eprintln!("{:^70}", "CHECKPOINT DEBUG INFO");
    eprintln!("{}", "=".repeat(70));

    eprintln!("\n{:<24} {}", "Command:", command_label(command));
    eprintln!("{:<24} {}", "Log Load Time:", format_duration(load_time));
    eprintln!("{:<24} {}", "Mutation Time:", format_duration(mutate_time));
    eprintln!("{:<24} {}", "Log Save Time:", format_duration(save_time));
    eprintln!("{:<24} {}", "Total Time:", format_duration(total_time));
    eprintln!("\n{:<24} {}", "Log File:", log_path.display());
    eprintln!("{}", "=".repeat(70));
    eprintln!();
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Create { .. } => "create",
        Command::Back { .. } => "back",
        Command::Swapto { .. } => "swapto",
        Command::Delete { .. } => "delete",
        Command::List => "list",
    }
}

/// Format a duration in both milliseconds and microseconds.
fn format_duration(duration: std::time::Duration) -> String {
    let ms = duration.as_secs_f64() * 1000.0;
    let us = duration.as_secs_f64() * 1_000_000.0;
    format!("{ms:.3} ms | {us:.3} us")
}
