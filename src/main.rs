// glitch-render - command line front-end for glitch projects

use clap::{Parser, Subcommand, ValueEnum};
use glitch_history::audio::export::{BitDepth, ExportSettings, import_wav};
use glitch_history::config::{EngineConfig, default_config_path, load_config};
use glitch_history::effect::{EffectParams, ParamValue};
use glitch_history::project::{Project, ProjectLoadOptions, ProjectManager};
use glitch_history::timeline::{ClipId, ClipRegion};
use glitch_history::{DeleteMode, Error, Operation, RecordId, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "glitch-render")]
#[command(about = "Inspect, edit and render glitch projects")]
struct Cli {
    /// Engine configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project from a WAV file
    Import {
        input: PathBuf,
        project: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print project metadata and the operation log
    Info { project: PathBuf },

    /// Render the project to a WAV file
    Render {
        project: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Bits::Float32)]
        bits: Bits,
    },

    /// Append an effect record over a clip region
    Effect {
        project: PathBuf,
        effect: String,
        #[arg(long)]
        clip: u64,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Defaults to the rest of the clip
        #[arg(long)]
        length: Option<usize>,
        /// Effect parameter as key=value, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Enable or disable a content record
    Toggle { project: PathBuf, record: u64 },

    /// Delete a record; structural records need --cascade
    Delete {
        project: PathBuf,
        record: u64,
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Bits {
    #[value(name = "16")]
    Int16,
    #[value(name = "24")]
    Int24,
    #[value(name = "32f")]
    Float32,
}

impl From<Bits> for BitDepth {
    fn from(bits: Bits) -> Self {
        match bits {
            Bits::Int16 => BitDepth::Int16,
            Bits::Int24 => BitDepth::Int24,
            Bits::Float32 => BitDepth::Float32,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.or_else(default_config_path) {
        Some(path) => load_config(&path),
        None => EngineConfig::default(),
    };
    let manager = ProjectManager::new(config);

    match cli.command {
        Commands::Import {
            input,
            project,
            name,
        } => {
            let base = import_wav(&input)?;
            let name = name.unwrap_or_else(|| file_stem(&input));
            let mut created = manager.create_new_project(name, base);
            manager.save_project(&mut created, &project)?;
            println!("Created {}", project.display());
        }
        Commands::Info { project } => {
            let project = open(&manager, &project)?;
            print_info(&project)?;
        }
        Commands::Render {
            project,
            output,
            bits,
        } => {
            let project = open(&manager, &project)?;
            let settings = ExportSettings {
                bit_depth: bits.into(),
            };
            manager.export_project_audio(&project, &output, &settings)?;
            println!("Rendered {}", output.display());
        }
        Commands::Effect {
            project: path,
            effect,
            clip,
            offset,
            length,
            params,
        } => {
            let mut project = open(&manager, &path)?;
            let graph = project.history.current_graph()?;
            let target = graph.require(ClipId(clip)).map_err(|e| Error::Usage(e.to_string()))?;
            let length = length.unwrap_or_else(|| target.len().saturating_sub(offset));
            let region = ClipRegion::new(ClipId(clip), offset, length);

            let params = parse_params(&params)?;
            let id = project
                .history
                .append(Operation::effect(effect, params, region))?;
            manager.save_project(&mut project, &path)?;
            println!("Appended record {}", id);
        }
        Commands::Toggle {
            project: path,
            record,
        } => {
            let mut project = open(&manager, &path)?;
            let enabled = project.history.toggle(RecordId(record))?;
            manager.save_project(&mut project, &path)?;
            println!(
                "Record {} {}",
                RecordId(record),
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Commands::Delete {
            project: path,
            record,
            cascade,
        } => {
            let mut project = open(&manager, &path)?;
            let mode = if cascade {
                DeleteMode::ConfirmedCascade
            } else {
                DeleteMode::Single
            };
            let removed = project.history.delete(RecordId(record), mode)?;
            manager.save_project(&mut project, &path)?;
            println!("Removed {} record(s)", removed.len());
        }
    }

    Ok(())
}

fn open(manager: &ProjectManager, path: &Path) -> Result<Project> {
    Ok(manager.load_project(path, &ProjectLoadOptions::default())?)
}

fn print_info(project: &Project) -> Result<()> {
    let metadata = &project.metadata;
    println!("{} (v{})", metadata.name, metadata.version);
    println!(
        "  {} Hz, {} channel(s), modified {}",
        metadata.sample_rate,
        metadata.channels,
        metadata.modified.format("%Y-%m-%d %H:%M:%S")
    );

    let graph = project.history.current_graph()?;
    println!("  {} clip(s)", graph.len());
    for clip in graph.clips() {
        println!("    {:>4}  {:<24} {} samples", clip.id.0, clip.name, clip.len());
    }

    let orphaned = project.history.orphaned_records()?;
    println!("  {} record(s)", project.history.log().len());
    for entry in project.history.entries() {
        let mut flags = String::new();
        if !entry.enabled {
            flags.push_str(" [off]");
        }
        if entry.frozen {
            flags.push_str(" [frozen]");
        }
        if orphaned.contains(&entry.id) {
            flags.push_str(" [orphaned]");
        }
        println!(
            "    {:>4}  {:<12} {}{}",
            entry.id.0,
            entry.kind.label(),
            entry.name,
            flags
        );
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<EffectParams> {
    let mut params = EffectParams::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::Usage(format!("Expected key=value, got '{}'", pair)));
        };
        let value = if let Ok(number) = value.parse::<f64>() {
            ParamValue::from(number)
        } else if let Ok(flag) = value.parse::<bool>() {
            ParamValue::from(flag)
        } else {
            ParamValue::from(value)
        };
        params.set(key.trim(), value);
    }
    Ok(params)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
