// ============================================================
// Layer 2 — Serve Use Case
// ============================================================
// Exposes the prediction service over HTTP:
//
//   GET /predict?inchi=..&property_token=..
//     200  {"inchi": .., "property_token": .., "positive_prediction": ..}
//     422  {"error": ..}   unresolvable molecule / bad token
//     500  {"error": ..}   store or cache failure
//
// The handler moves the blocking inference work onto the blocking
// pool; the prediction service itself serializes model access.
// Ctrl-C drains in-flight requests before the listener closes.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::application::predict_use_case::PredictService;
use crate::domain::errors::PredictError;

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub inchi:          String,
    pub property_token: usize,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub inchi:               String,
    pub property_token:      usize,
    pub positive_prediction: f64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run_server(addr: SocketAddr, service: Arc<PredictService>) -> Result<()> {
    let router = Router::new()
        .route("/predict", get(predict_handler))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving predictions on http://{addr}/predict");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received, draining connections");
        })
        .await?;

    Ok(())
}

async fn predict_handler(
    State(service): State<Arc<PredictService>>,
    Query(params):  Query<PredictParams>,
) -> Response {
    tracing::info!(
        "Predicting property {} for inchi '{}'",
        params.property_token, params.inchi
    );

    let inchi = params.inchi.clone();
    let property_token = params.property_token;
    let result =
        tokio::task::spawn_blocking(move || service.predict(&params.inchi, params.property_token))
            .await;

    match result {
        Ok(Ok(value)) => Json(PredictResponse {
            inchi,
            property_token,
            positive_prediction: value,
        })
        .into_response(),
        Ok(Err(e)) => {
            let status = match &e {
                PredictError::Conversion(_) | PredictError::Vocabulary(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PredictError::Cache(_) | PredictError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            tracing::warn!("Prediction failed for '{inchi}': {e}");
            (status, Json(ErrorBody { error: e.to_string() })).into_response()
        }
        Err(join_err) => {
            tracing::error!("Prediction task panicked: {join_err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody { error: "internal prediction failure".to_string() }),
            )
                .into_response()
        }
    }
}
