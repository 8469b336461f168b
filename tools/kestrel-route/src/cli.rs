//! Command line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{KestrelConfig, SpeedProfile};
use crate::facade::{AtomicGeneration, DataFacade, FileGeneration, GenerationSignal, ReloadingFacade, ServerPaths};
use crate::plugins::{QueryEngine, Reply, ReplyStatus, RouteParameters, MAX_ZOOM};
use crate::prepare::{PrepareContext, PreparePaths};
use crate::server;

#[derive(Parser)]
#[command(name = "kestrel-route")]
#[command(about = "Contraction-hierarchy road routing", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a query dataset from `<base>.import` (and `<base>.restrictions`)
    Prepare {
        /// Dataset base path, outputs are written next to it
        base: PathBuf,

        /// TOML file with [profile] and [contractor] tables
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Worker threads for contraction (0 = all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Insert every candidate shortcut (slow, for verification)
        #[arg(long)]
        no_witness_search: bool,

        /// Timestamp to publish instead of the current time
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Serve queries over HTTP
    Serve {
        base: PathBuf,

        /// TOML file with a [server] table
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        bind: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Text file with the dataset version; bump it after re-preparing
        #[arg(long)]
        version_file: Option<PathBuf>,

        #[arg(long)]
        query_timeout_ms: Option<u64>,
    },

    /// Closest segment end point to a coordinate
    Locate {
        base: PathBuf,
        /// lat,lon
        #[arg(long)]
        loc: String,
        #[arg(short, long, default_value_t = MAX_ZOOM)]
        zoom: u32,
    },

    /// Snap a coordinate onto the k closest segments
    Nearest {
        base: PathBuf,
        #[arg(long)]
        loc: String,
        #[arg(short, default_value_t = 1)]
        k: usize,
        #[arg(short, long, default_value_t = MAX_ZOOM)]
        zoom: u32,
    },

    /// Route through two or more coordinates
    Route {
        base: PathBuf,
        /// lat,lon;lat,lon[;...]
        #[arg(long)]
        loc: String,
        #[arg(short, long, default_value_t = MAX_ZOOM)]
        zoom: u32,
        #[arg(long)]
        no_geometry: bool,
    },

    /// Print what a prepared dataset contains
    Inspect { base: PathBuf },
}

/// Engine over `<base>.*` for a single command line query
fn open_engine(base: &Path, signal: Box<dyn GenerationSignal>, query_timeout: Duration) -> Result<QueryEngine> {
    let facade = ReloadingFacade::new(ServerPaths::from_base(base), signal)
        .with_context(|| format!("loading dataset {}", base.display()))?;
    Ok(QueryEngine::new(facade, query_timeout))
}

fn one_shot(base: &Path, params: RouteParameters) -> Result<()> {
    let engine = open_engine(base, Box::new(AtomicGeneration::new(0)), Duration::from_secs(30))?;
    print_reply(engine.run_query(params))
}

fn print_reply(reply: Reply) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&reply.body)?);
    match reply.status {
        ReplyStatus::Ok => Ok(()),
        ReplyStatus::BadRequest => anyhow::bail!("bad request"),
        ReplyStatus::InternalError => anyhow::bail!("query failed"),
    }
}

fn parse_locations(loc: &str) -> Result<Vec<kestrel_common::FixedPointCoordinate>> {
    RouteParameters::parse_locations(loc).with_context(|| format!("parsing --loc {loc:?}"))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare {
                base,
                profile,
                threads,
                no_witness_search,
                timestamp,
            } => {
                let mut config = match &profile {
                    Some(path) => KestrelConfig::load(path)?,
                    None => KestrelConfig::default(),
                };
                if let Some(threads) = threads {
                    config.contractor.threads = threads;
                }
                if no_witness_search {
                    config.contractor.witness_search = false;
                }
                let speed = SpeedProfile::from_config(&config.profile)?;

                let paths = PreparePaths::from_base(&base);
                let mut context = PrepareContext::load(paths, speed, config.contractor)
                    .with_context(|| format!("loading {}.import", base.display()))?;
                if let Some(timestamp) = timestamp {
                    context = context.with_timestamp(timestamp);
                }
                let summary = context.run().context("preparation failed")?;

                println!("edge-based nodes:  {}", summary.edge_based_nodes);
                println!("edge-based edges:  {}", summary.edge_based_edges);
                println!("shortcuts:         {}", summary.shortcuts);
                println!("query edges:       {}", summary.query_edges);
                println!("checksum:          {:#010x}", summary.checksum);
                for stage in &summary.stages {
                    println!("  {:<28} {:>8.2?}", stage.stage, stage.elapsed);
                }
                println!("total:             {:.2?}", summary.total);
                Ok(())
            }
            Commands::Serve {
                base,
                config,
                bind,
                port,
                version_file,
                query_timeout_ms,
            } => {
                let mut server_config = match &config {
                    Some(path) => KestrelConfig::load(path)?.server,
                    None => Default::default(),
                };
                if let Some(bind) = bind {
                    server_config.bind = bind;
                }
                if let Some(port) = port {
                    server_config.port = port;
                }
                if version_file.is_some() {
                    server_config.version_file = version_file;
                }
                if let Some(ms) = query_timeout_ms {
                    server_config.query_timeout_ms = ms;
                }

                let signal: Box<dyn GenerationSignal> = match &server_config.version_file {
                    Some(path) => Box::new(FileGeneration::new(path)),
                    None => Box::new(AtomicGeneration::new(0)),
                };
                let timeout = Duration::from_millis(server_config.query_timeout_ms);
                let engine = Arc::new(open_engine(&base, signal, timeout)?);

                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(server::serve(engine, &server_config))
            }
            Commands::Locate { base, loc, zoom } => {
                let mut params = RouteParameters::new("locate").with_coordinates(parse_locations(&loc)?);
                params.zoom_level = zoom;
                one_shot(&base, params)
            }
            Commands::Nearest { base, loc, k, zoom } => {
                let mut params = RouteParameters::new("nearest").with_coordinates(parse_locations(&loc)?);
                params.number_of_results = k;
                params.zoom_level = zoom;
                one_shot(&base, params)
            }
            Commands::Route {
                base,
                loc,
                zoom,
                no_geometry,
            } => {
                let mut params = RouteParameters::new("viaroute").with_coordinates(parse_locations(&loc)?);
                params.zoom_level = zoom;
                params.geometry = !no_geometry;
                one_shot(&base, params)
            }
            Commands::Inspect { base } => {
                let engine = open_engine(&base, Box::new(AtomicGeneration::new(0)), Duration::from_secs(30))?;
                let generation = engine.facade().snapshot();
                println!("dataset:      {}", base.display());
                println!("timestamp:    {}", generation.timestamp());
                println!("checksum:     {:#010x}", generation.check_sum());
                println!("graph nodes:  {}", generation.number_of_nodes());
                println!("graph edges:  {}", generation.number_of_edges());
                Ok(())
            }
        }
    }
}
