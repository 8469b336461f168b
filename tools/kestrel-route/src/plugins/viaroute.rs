use geo::{Coord, LineString, Simplify};
use kestrel_common::{EdgeWeight, FixedPointCoordinate};
use serde_json::{json, Value};
use tracing::debug;

use super::{coordinate_json, Plugin, Reply, RouteParameters, MAX_ZOOM};
use crate::ebg::TurnInstruction;
use crate::facade::DataFacade;
use crate::geo::haversine_distance;
use crate::rtree::PhantomNode;
use crate::search::shortest_path;

/// Route through every coordinate in order
pub struct ViaRoutePlugin;

/// Douglas-Peucker tolerance in degrees: about one 256px tile pixel at `zoom`
fn simplification_tolerance(zoom: u32) -> f64 {
    360.0 / (256.0 * f64::from(1u32 << zoom.min(MAX_ZOOM)))
}

fn simplify(line: &[FixedPointCoordinate], zoom: u32) -> Vec<FixedPointCoordinate> {
    if zoom >= MAX_ZOOM || line.len() < 3 {
        return line.to_vec();
    }
    let line: LineString<f64> = line
        .iter()
        .map(|c| Coord {
            x: c.lon_degrees(),
            y: c.lat_degrees(),
        })
        .collect();
    line.simplify(&simplification_tolerance(zoom))
        .coords()
        .map(|c| FixedPointCoordinate::from_degrees(c.y, c.x))
        .collect()
}

fn path_length(line: &[FixedPointCoordinate]) -> f64 {
    line.windows(2).map(|w| haversine_distance(w[0], w[1])).sum()
}

fn instruction(facade: &dyn DataFacade, turn: TurnInstruction, name_id: u32) -> Value {
    json!([turn as u8, name_id, facade.name_for_id(name_id)])
}

impl Plugin for ViaRoutePlugin {
    fn descriptor(&self) -> &str {
        "viaroute"
    }

    fn handle_request(&self, facade: &dyn DataFacade, params: &RouteParameters) -> Reply {
        if params.coordinates.len() < 2 {
            return Reply::bad_request("viaroute needs at least two coordinates");
        }
        if let Some(c) = params.coordinates.iter().find(|c| !c.is_valid()) {
            return Reply::bad_request(&format!("invalid coordinate {c}"));
        }

        let mut phantoms: Vec<PhantomNode> = Vec::with_capacity(params.coordinates.len());
        for &c in &params.coordinates {
            match facade.find_phantom_node_for_coordinate(c, params.zoom_level, params.deadline) {
                Ok(Some(phantom)) => phantoms.push(phantom),
                Ok(None) => return Reply::no_match("Cannot find route between points"),
                Err(e) => return Reply::from_error(&e),
            }
        }

        let mut weight: EdgeWeight = 0;
        let mut geometry: Vec<FixedPointCoordinate> = Vec::new();
        let mut instructions: Vec<Value> = Vec::new();
        let legs = phantoms.len() - 1;
        for (leg, pair) in phantoms.windows(2).enumerate() {
            let route = match shortest_path(facade, &pair[0], &pair[1]) {
                Ok(Some(route)) => route,
                Ok(None) => {
                    debug!(leg, "no route for leg");
                    return Reply::no_match("Cannot find route between points");
                }
                Err(e) => return Reply::from_error(&e),
            };
            weight = weight.saturating_add(route.weight);

            let leg_geometry = route.geometry(facade);
            let skip = usize::from(!geometry.is_empty());
            geometry.extend(leg_geometry.into_iter().skip(skip));

            for &turn in route.segments() {
                instructions.push(instruction(
                    facade,
                    facade.turn_instruction_for_edge_id(turn),
                    facade.name_index_from_edge_id(turn),
                ));
            }
            let arrival = if leg + 1 == legs {
                TurnInstruction::ReachedYourDestination
            } else {
                TurnInstruction::ReachViaPoint
            };
            instructions.push(instruction(facade, arrival, pair[1].name_id));
        }

        let distance = path_length(&geometry);
        let mut body = json!({
            "status": 0,
            "status_message": "Found route between points",
            "route_summary": {
                "total_time": f64::from(weight) / 10.0,
                "total_distance": distance.round(),
                "start_point": facade.name_for_id(phantoms[0].name_id),
                "end_point": facade.name_for_id(phantoms[legs].name_id),
            },
            "route_instructions": instructions,
            "via_points": phantoms.iter().map(|p| coordinate_json(p.location)).collect::<Vec<_>>(),
            "hint_data": { "checksum": facade.check_sum() },
        });
        if params.geometry {
            let simplified: Vec<Value> = simplify(&geometry, params.zoom_level)
                .into_iter()
                .map(coordinate_json)
                .collect();
            body["route_geometry"] = Value::Array(simplified);
        }
        Reply::ok(body)
    }
}
