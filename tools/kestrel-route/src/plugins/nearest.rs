use serde_json::{json, Value};

use super::{coordinate_json, first_coordinate, Plugin, Reply, RouteParameters};
use crate::facade::DataFacade;

/// Snapped positions on the `k` closest segments
pub struct NearestPlugin;

impl Plugin for NearestPlugin {
    fn descriptor(&self) -> &str {
        "nearest"
    }

    fn handle_request(&self, facade: &dyn DataFacade, params: &RouteParameters) -> Reply {
        let point = match first_coordinate(params) {
            Ok(point) => point,
            Err(reply) => return reply,
        };
        let k = params.number_of_results.max(1);
        let phantoms = match facade.incremental_find_phantom_node_for_coordinate(
            point,
            params.zoom_level,
            k,
            params.deadline,
        ) {
            Ok(phantoms) => phantoms,
            Err(e) => return Reply::from_error(&e),
        };
        let Some(closest) = phantoms.first() else {
            return Reply::no_match("no segment near coordinate");
        };

        let results: Vec<Value> = phantoms
            .iter()
            .map(|p| {
                json!({
                    "mapped_coordinate": coordinate_json(p.location),
                    "name": facade.name_for_id(p.name_id),
                    "distance": p.distance,
                })
            })
            .collect();
        Reply::ok(json!({
            "status": 0,
            "mapped_coordinate": coordinate_json(closest.location),
            "name": facade.name_for_id(closest.name_id),
            "results": results,
        }))
    }
}
