//! HTTP status API for the relay.
//!
//! Read-only endpoints exposing the relay identity and the latest status of
//! every chain adapter.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::get,
	Router,
};
use relay_config::ApiConfig;
use relay_core::RelayEngine;
use relay_types::{ChainId, ChainStatus};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
	pub relay: Arc<RelayEngine>,
}

pub fn router(relay: Arc<RelayEngine>) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/chains", get(handle_list_chains))
				.route("/chains/{id}", get(handle_get_chain)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { relay })
}

pub async fn start_server(
	api_config: ApiConfig,
	relay: Arc<RelayEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(relay);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Relay API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "ok",
		"relay": state.relay.config().relay.id,
	}))
}

async fn handle_list_chains(State(state): State<AppState>) -> Json<Vec<ChainStatus>> {
	Json(state.relay.statuses().await)
}

async fn handle_get_chain(Path(id): Path<u8>, State(state): State<AppState>) -> Response {
	match state.relay.status(ChainId(id)).await {
		Some(status) => Json(status).into_response(),
		None => (
			StatusCode::NOT_FOUND,
			Json(json!({ "error": format!("Unknown chain {}", id) })),
		)
			.into_response(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use relay_config::Config;
	use relay_types::PollerState;
	use tower::ServiceExt;

	const CONFIG: &str = r#"
[relay]
id = "relay-api"

[storage]
primary = "memory"
[storage.implementations.memory]

[chains.btg]
id = 4
type = "utxo"
endpoint = "http://127.0.0.1:8332"
[chains.btg.opts]
rpc_user = "user"
rpc_password = "pass"
watch_addresses = ["addr1"]
[chains.btg.opts.destination]
chain_id = 1
resource_id = "0x0000000000000000000000000000000000000000000000000000000000000001"
recipient = "0xabcd"
"#;

	fn app() -> Router {
		let config: Config = CONFIG.parse().unwrap();
		let relay = crate::factory_registry::build_relay_from_config(config).unwrap();
		router(Arc::new(relay))
	}

	async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
		let response = app
			.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
			.await
			.unwrap();
		let status = response.status();
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, serde_json::from_slice(&body).unwrap())
	}

	#[tokio::test]
	async fn test_health() {
		let (status, body) = get_json(app(), "/health").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "ok", "relay": "relay-api" }));
	}

	#[tokio::test]
	async fn test_list_chains() {
		let (status, body) = get_json(app(), "/api/chains").await;
		assert_eq!(status, StatusCode::OK);

		let chains: Vec<ChainStatus> = serde_json::from_value(body).unwrap();
		assert_eq!(chains.len(), 1);
		assert_eq!(chains[0].chain_id, ChainId(4));
		assert_eq!(chains[0].name, "btg");
		assert_eq!(chains[0].state, PollerState::Idle);
	}

	#[tokio::test]
	async fn test_get_chain() {
		let (status, body) = get_json(app(), "/api/chains/4").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["name"], "btg");
	}

	#[tokio::test]
	async fn test_unknown_chain_is_not_found() {
		let (status, body) = get_json(app(), "/api/chains/9").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "Unknown chain 9");
	}
}
