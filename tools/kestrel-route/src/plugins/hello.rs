use serde_json::json;

use super::{coordinate_json, Plugin, Reply, RouteParameters};
use crate::facade::DataFacade;

/// Echoes the parsed request; handy for checking URL parsing
pub struct HelloWorldPlugin;

impl Plugin for HelloWorldPlugin {
    fn descriptor(&self) -> &str {
        "hello"
    }

    fn handle_request(&self, _facade: &dyn DataFacade, params: &RouteParameters) -> Reply {
        let coordinates: Vec<_> = params.coordinates.iter().map(|&c| coordinate_json(c)).collect();
        Reply::ok(json!({
            "status": 0,
            "title": "Hello World",
            "service": params.service,
            "zoom_level": params.zoom_level,
            "number_of_results": params.number_of_results,
            "geometry": params.geometry,
            "coordinates": coordinates,
        }))
    }
}
