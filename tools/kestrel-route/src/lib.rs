//! kestrel-route: road routing on contraction hierarchies over an
//! edge-expanded graph
//!
//! `prepare` turns an import file into a query dataset; `facade` loads it,
//! `search` answers shortest-path queries and `plugins` shape the replies
//! served by `server`.

pub mod cli;
pub mod config;
pub mod contractor;
pub mod ebg;
pub mod facade;
pub mod formats;
pub mod geo;
pub mod plugins;
pub mod prepare;
pub mod rtree;
pub mod search;
pub mod server;
pub mod static_graph;

pub use config::{ContractorConfig, KestrelConfig, ServerConfig, SpeedProfile};
pub use facade::{DataFacade, Generation, ReloadingFacade, ServerPaths};
pub use plugins::{QueryEngine, Reply, RouteParameters};
pub use prepare::{PrepareContext, PreparePaths, PrepareSummary};
