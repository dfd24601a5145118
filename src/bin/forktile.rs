use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use forktile::common::config::{Config, DEFAULT_CONFIG, config_file};
use forktile::common::log;
use forktile::replay::{self, Replay, Step};
use tracing::warn;

#[derive(Parser)]
#[command(version, about = "Binary-tree auto-tiling engine")]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a script of host events to the tiler and print what it asks the
    /// host to do.
    Replay {
        script: PathBuf,

        /// Print the steps and the final forest as JSON.
        #[arg(long)]
        json: bool,

        /// Draw every tree after the last step.
        #[arg(long)]
        dump_tree: bool,
    },
    /// Check the configuration file and report every issue found.
    ValidateConfig,
    /// Print the default configuration.
    DefaultConfig,
}

fn main() {
    let opt = Cli::parse();
    log::init_logging(if opt.verbose { "debug" } else { "info" });

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let result = match opt.command {
        Commands::Replay { script, json, dump_tree } => {
            run_replay(&config_path, &script, json, dump_tree)
        }
        Commands::ValidateConfig => validate_config(&config_path),
        Commands::DefaultConfig => {
            print!("{DEFAULT_CONFIG}");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::read_or_default(path)?;
    for issue in config.validate() {
        warn!("{}: {issue}", path.display());
    }
    Ok(config)
}

fn validate_config(path: &Path) -> anyhow::Result<()> {
    let config = Config::read(path)?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
        return Ok(());
    }
    eprintln!("Config validation failed:");
    for issue in &issues {
        eprintln!("  - {issue}");
    }
    anyhow::bail!("{} issue(s) in {}", issues.len(), path.display())
}

fn run_replay(
    config_path: &Path,
    script: &Path,
    json: bool,
    dump_tree: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (replay, steps) = replay::replay(script, config.tiling())?;

    if json {
        let out = serde_json::json!({
            "windows": replay.windows(),
            "steps": steps,
            "forest": replay.tiler().forest().snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_steps(&replay, &steps);
    }

    if dump_tree {
        let forest = replay.tiler().forest();
        for (key, _) in forest.toplevels() {
            if let Some(tree) = forest.draw_tree(key) {
                println!("monitor {} workspace {}", key.monitor, key.workspace);
                print!("{tree}");
            }
        }
    }
    Ok(())
}

fn print_steps(replay: &Replay, steps: &[Step]) {
    for step in steps {
        if step.requests.is_empty() {
            continue;
        }
        println!("line {}:", step.line);
        for request in &step.requests {
            println!("  {}", replay.describe(request));
        }
    }
}
