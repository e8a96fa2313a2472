#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use strata_plugins::{FsLoader, Pipeline, Registry};
use strata_store::ResMap;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stratactl", version, about = "Strata CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Yaml)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Yaml, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load resources, run generators then transformers, print the result
    Build {
        /// Resource files (multi-document YAML)
        #[arg(required = true)]
        resources: Vec<PathBuf>,
        /// Generator configurations (multi-document YAML)
        #[arg(long = "generators")]
        generators: Option<PathBuf>,
        /// Transformer configurations (multi-document YAML)
        #[arg(long = "transformers")]
        transformers: Option<PathBuf>,
        /// Directory generator file sources are resolved against
        #[arg(long = "root", env = "STRATA_ROOT", default_value = ".")]
        root: PathBuf,
    },
    /// Print the canonical id of every resource
    Ids {
        #[arg(required = true)]
        resources: Vec<PathBuf>,
    },
}

fn init_tracing() {
    let env = std::env::var("STRATA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_resources(paths: &[PathBuf]) -> Result<ResMap> {
    let mut m = ResMap::new();
    for path in paths {
        let part = ResMap::from_yaml_bytes(&read(path)?).with_context(|| format!("decoding {}", path.display()))?;
        info!(path = %path.display(), count = part.len(), "loaded resources");
        m.append_all(part).with_context(|| format!("adding resources from {}", path.display()))?;
    }
    Ok(m)
}

fn read_optional(path: Option<&Path>) -> Result<Vec<u8>> {
    path.map_or_else(|| Ok(Vec::new()), read)
}

fn print(m: &ResMap, output: Output) -> Result<()> {
    match output {
        Output::Yaml => print!("{}", m.to_yaml()?),
        Output::Json => {
            let docs: Vec<_> = m.iter().map(|r| r.value()).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { resources, generators, transformers, root } => {
            let mut m = load_resources(&resources)?;
            let generators = read_optional(generators.as_deref())?;
            let transformers = read_optional(transformers.as_deref())?;
            let mut pipeline = Pipeline::from_yaml(&Registry::builtin(), Arc::new(FsLoader::new(root)), &generators, &transformers)
                .context("building pipeline")?;
            info!(stages = pipeline.len(), "build invoked");
            pipeline.run(&mut m).context("running pipeline")?;
            print(&m, cli.output)?;
        }
        Commands::Ids { resources } => {
            let m = load_resources(&resources)?;
            match cli.output {
                Output::Yaml => {
                    for id in m.ids() {
                        println!("{id}");
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&m.ids())?),
            }
        }
    }
    Ok(())
}
