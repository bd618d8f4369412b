use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::EngineConfig;
use log::info;
use replay_protocol::{ReplayScript, write_jsonl_commit_line};

#[derive(Parser)]
#[command(author, version, about = "Headless garment texture painting")]
struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a replay script and write the resulting maps as PNG.
    Replay {
        /// JSON replay script.
        script: PathBuf,
        /// Composite texture output.
        #[arg(long, short = 'o', default_value = "composite.png")]
        out: PathBuf,
        /// Normal map output.
        #[arg(long)]
        normal_map: Option<PathBuf>,
        /// Displacement field output, 8-bit grayscale.
        #[arg(long)]
        displacement: Option<PathBuf>,
        /// Engine configuration JSON replacing the script's own.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write one JSON line per committed operation.
        #[arg(long)]
        commit_log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match Arguments::parse().command {
        Command::Replay {
            script,
            out,
            normal_map,
            displacement,
            config,
            commit_log,
        } => {
            let config = config.as_deref().map(load_config).transpose()?;
            let script = ReplayScript::load(&script)
                .with_context(|| format!("load replay script {}", script.display()))?;
            let mut outcome = script.run(config).context("replay script")?;

            write_file(&out, &outcome.engine.export_composite_png()?)?;
            if let Some(path) = normal_map {
                write_file(&path, &outcome.engine.export_normal_map_png()?)?;
            }
            if let Some(path) = displacement {
                write_file(&path, &outcome.engine.export_displacement_png()?)?;
            }
            if let Some(path) = commit_log {
                let file =
                    File::create(&path).with_context(|| format!("create {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                for line in &outcome.commits {
                    write_jsonl_commit_line(&mut writer, line)?;
                }
                writer.flush()?;
                info!("wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    EngineConfig::from_json(&text).with_context(|| format!("parse config {}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}
