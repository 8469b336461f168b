//! Request plugins and the engine that dispatches to them
//!
//! A plugin answers one service name (`viaroute`, `nearest`, ...) against
//! whatever generation of the dataset was current when the request arrived.

mod hello;
mod locate;
mod nearest;
mod timestamp;
mod viaroute;

pub use hello::HelloWorldPlugin;
pub use locate::LocatePlugin;
pub use nearest::NearestPlugin;
pub use timestamp::TimestampPlugin;
pub use viaroute::ViaRoutePlugin;

use kestrel_common::{Error, FixedPointCoordinate, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::facade::{DataFacade, ReloadingFacade};

/// Zoom at which geometry is returned unsimplified
pub const MAX_ZOOM: u32 = 18;

/// Parsed request
#[derive(Debug, Clone, PartialEq)]
pub struct RouteParameters {
    pub service: String,
    pub coordinates: Vec<FixedPointCoordinate>,
    pub zoom_level: u32,
    /// `k` of the nearest service
    pub number_of_results: usize,
    /// Whether route replies carry their geometry
    pub geometry: bool,
    /// Spatial lookups give up after this instant
    pub deadline: Option<Instant>,
}

impl RouteParameters {
    pub fn new<S: Into<String>>(service: S) -> Self {
        Self {
            service: service.into(),
            coordinates: Vec::new(),
            zoom_level: MAX_ZOOM,
            number_of_results: 1,
            geometry: true,
            deadline: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Vec<FixedPointCoordinate>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Parse `lat,lon;lat,lon;...` in degrees
    pub fn parse_locations(text: &str) -> Result<Vec<FixedPointCoordinate>> {
        text.split(';')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                let (lat, lon) = part
                    .split_once(',')
                    .ok_or_else(|| Error::InvalidCoordinate(format!("expected lat,lon in {part:?}")))?;
                let lat: f64 = lat
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidCoordinate(format!("latitude {lat:?}")))?;
                let lon: f64 = lon
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidCoordinate(format!("longitude {lon:?}")))?;
                let coordinate = FixedPointCoordinate::from_degrees(lat, lon);
                if !lat.is_finite() || !lon.is_finite() || !coordinate.is_valid() {
                    return Err(Error::InvalidCoordinate(format!("{lat},{lon} is out of range")));
                }
                Ok(coordinate)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    BadRequest,
    InternalError,
}

/// Status plus JSON body; the body's own `status` field carries the
/// routing outcome (0 found, 207 nothing found, 400 bad request)
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            body,
        }
    }

    /// Well-formed request without a result
    pub fn no_match(message: &str) -> Self {
        Self::ok(json!({ "status": 207, "status_message": message }))
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: ReplyStatus::BadRequest,
            body: json!({ "status": 400, "status_message": message }),
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            status: ReplyStatus::InternalError,
            body: json!({ "status": 500, "status_message": message }),
        }
    }

    /// Map a query-time failure to a reply
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidCoordinate(reason) => Self::bad_request(reason),
            Error::DeadlineExceeded => Self::internal_error("query timed out"),
            other => {
                warn!(error = %other, "query failed");
                Self::internal_error("internal error")
            }
        }
    }

    /// Body `status` field, if present
    pub fn body_status(&self) -> Option<i64> {
        self.body.get("status").and_then(Value::as_i64)
    }
}

pub(crate) fn coordinate_json(c: FixedPointCoordinate) -> Value {
    json!([c.lat_degrees(), c.lon_degrees()])
}

/// First coordinate of the request, or the reply to send instead
pub(crate) fn first_coordinate(params: &RouteParameters) -> std::result::Result<FixedPointCoordinate, Reply> {
    match params.coordinates.first() {
        Some(&c) if c.is_valid() => Ok(c),
        Some(c) => Err(Reply::bad_request(&format!("invalid coordinate {c}"))),
        None => Err(Reply::bad_request("no coordinate given")),
    }
}

pub trait Plugin: Send + Sync {
    /// Service name the plugin answers
    fn descriptor(&self) -> &str;
    fn handle_request(&self, facade: &dyn DataFacade, params: &RouteParameters) -> Reply;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in service
    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(HelloWorldPlugin));
        registry.register(Box::new(LocatePlugin));
        registry.register(Box::new(NearestPlugin));
        registry.register(Box::new(TimestampPlugin));
        registry.register(Box::new(ViaRoutePlugin));
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        let descriptor = plugin.descriptor().to_string();
        if self.plugins.insert(descriptor.clone(), plugin).is_some() {
            info!(%descriptor, "plugin replaced");
        } else {
            debug!(%descriptor, "plugin registered");
        }
    }

    pub fn descriptors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn run_query(&self, facade: &dyn DataFacade, params: &RouteParameters) -> Reply {
        match self.plugins.get(&params.service) {
            Some(plugin) => plugin.handle_request(facade, params),
            None => Reply::bad_request(&format!("unknown service {:?}", params.service)),
        }
    }
}

/// Registry plus a reloadable dataset
pub struct QueryEngine {
    registry: PluginRegistry,
    facade: ReloadingFacade,
    query_timeout: Duration,
}

impl QueryEngine {
    pub fn new(facade: ReloadingFacade, query_timeout: Duration) -> Self {
        Self::with_registry(PluginRegistry::with_default_plugins(), facade, query_timeout)
    }

    pub fn with_registry(registry: PluginRegistry, facade: ReloadingFacade, query_timeout: Duration) -> Self {
        Self {
            registry,
            facade,
            query_timeout,
        }
    }

    pub fn facade(&self) -> &ReloadingFacade {
        &self.facade
    }

    /// Reload if the dataset moved, then answer on the current generation
    pub fn run_query(&self, mut params: RouteParameters) -> Reply {
        if let Err(e) = self.facade.check_and_reload() {
            warn!(error = %e, "dataset reload failed, serving previous generation");
        }
        if params.deadline.is_none() {
            params.deadline = Some(Instant::now() + self.query_timeout);
        }
        let generation = self.facade.snapshot();
        self.registry.run_query(generation.as_ref(), &params)
    }
}
