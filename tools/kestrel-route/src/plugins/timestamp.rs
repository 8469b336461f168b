use serde_json::json;

use super::{Plugin, Reply, RouteParameters};
use crate::facade::DataFacade;

pub struct TimestampPlugin;

impl Plugin for TimestampPlugin {
    fn descriptor(&self) -> &str {
        "timestamp"
    }

    fn handle_request(&self, facade: &dyn DataFacade, _params: &RouteParameters) -> Reply {
        Reply::ok(json!({
            "status": 0,
            "timestamp": facade.timestamp(),
        }))
    }
}
