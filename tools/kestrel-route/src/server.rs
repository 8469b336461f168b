//! HTTP front-end: `GET /{service}?loc=lat,lon;lat,lon&z=..&k=..&geometry=..`

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::plugins::{QueryEngine, Reply, ReplyStatus, RouteParameters, MAX_ZOOM};

/// Raw query string
#[derive(Debug, Default, Deserialize)]
pub struct QueryString {
    pub loc: Option<String>,
    pub z: Option<u32>,
    pub k: Option<usize>,
    pub geometry: Option<bool>,
}

impl QueryString {
    pub fn into_parameters(self, service: String) -> kestrel_common::Result<RouteParameters> {
        let mut params = RouteParameters::new(service);
        if let Some(loc) = &self.loc {
            params.coordinates = RouteParameters::parse_locations(loc)?;
        }
        params.zoom_level = self.z.unwrap_or(MAX_ZOOM).min(MAX_ZOOM);
        params.number_of_results = self.k.unwrap_or(1);
        params.geometry = self.geometry.unwrap_or(true);
        Ok(params)
    }
}

fn into_response(reply: Reply) -> Response {
    let status = match reply.status {
        ReplyStatus::Ok => StatusCode::OK,
        ReplyStatus::BadRequest => StatusCode::BAD_REQUEST,
        ReplyStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(reply.body)).into_response()
}

async fn handle_service(
    State(engine): State<Arc<QueryEngine>>,
    Path(service): Path<String>,
    Query(query): Query<QueryString>,
) -> Response {
    let params = match query.into_parameters(service) {
        Ok(params) => params,
        Err(e) => return into_response(Reply::from_error(&e)),
    };
    // searches and page reads block
    match tokio::task::spawn_blocking(move || engine.run_query(params)).await {
        Ok(reply) => into_response(reply),
        Err(e) => {
            error!(error = %e, "query task failed");
            into_response(Reply::internal_error("query task failed"))
        }
    }
}

pub fn build_router(engine: Arc<QueryEngine>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/{service}", get(handle_service))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(cors),
        )
        .with_state(engine)
}

pub async fn serve(engine: Arc<QueryEngine>, config: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "query server listening");

    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("query server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_common::FixedPointCoordinate;

    #[test]
    fn test_query_string_defaults() {
        let params = QueryString::default().into_parameters("hello".into()).unwrap();
        assert_eq!(params, RouteParameters::new("hello"));
    }

    #[test]
    fn test_query_string_values() {
        let query = QueryString {
            loc: Some("52.5,13.4;52.6,13.5".into()),
            z: Some(25),
            k: Some(3),
            geometry: Some(false),
        };
        let params = query.into_parameters("nearest".into()).unwrap();
        assert_eq!(params.coordinates[1], FixedPointCoordinate::new(52_600_000, 13_500_000));
        assert_eq!(params.zoom_level, MAX_ZOOM);
        assert_eq!(params.number_of_results, 3);
        assert!(!params.geometry);
    }

    #[test]
    fn test_bad_location_maps_to_400() {
        let query = QueryString {
            loc: Some("north,east".into()),
            ..QueryString::default()
        };
        let err = query.into_parameters("locate".into()).unwrap_err();
        let response = into_response(Reply::from_error(&err));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
