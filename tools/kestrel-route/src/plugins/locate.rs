use serde_json::json;

use super::{coordinate_json, first_coordinate, Plugin, Reply, RouteParameters};
use crate::facade::DataFacade;

/// Closest segment end point to the first coordinate
pub struct LocatePlugin;

impl Plugin for LocatePlugin {
    fn descriptor(&self) -> &str {
        "locate"
    }

    fn handle_request(&self, facade: &dyn DataFacade, params: &RouteParameters) -> Reply {
        let point = match first_coordinate(params) {
            Ok(point) => point,
            Err(reply) => return reply,
        };
        match facade.locate_closest_end_point_for_coordinate(point, params.zoom_level, params.deadline) {
            Ok(Some(location)) => Reply::ok(json!({
                "status": 0,
                "mapped_coordinate": coordinate_json(location),
            })),
            Ok(None) => Reply::no_match("no end point near coordinate"),
            Err(e) => Reply::from_error(&e),
        }
    }
}
