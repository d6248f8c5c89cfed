//! HTTP surface: `POST /api/chat` and `GET /health`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, info, error, warn};
use serde_json::{json, Value};

use crate::config::{ProviderConfig, ServerConfig};
use crate::error::GatewayFailure;
use crate::gateway::Gateway;
use crate::request::{parse_body, ErrorBody, RequestShape};

/// Where each request gets its provider configuration from
#[derive(Debug, Clone)]
pub enum ConfigSource
{   /// Re-read the process environment on every request
    Environment
  , /// A fixed value, for embedding and tests
    Fixed(Arc<ProviderConfig>)
}

impl ConfigSource
{   pub fn load(&self) -> Result<ProviderConfig, crate::error::Error>
    {   match self
        {   ConfigSource::Environment => ProviderConfig::from_env()
          , ConfigSource::Fixed(config) => Ok(config.as_ref().clone())
        }
    }
}

/// Shared handler state. Read-only across requests.
#[derive(Debug, Clone)]
pub struct AppState
{   pub gateway: Arc<Gateway>
  , pub config: ConfigSource
}

impl AppState
{   pub fn new(gateway: Gateway, config: ConfigSource) -> Self
    {   AppState
        {   gateway: Arc::new(gateway)
          , config
        }
    }
}

impl IntoResponse for GatewayFailure
{   fn into_response(self) -> Response
    {   let status = StatusCode::from_u16(self.kind.status())
          .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

pub fn router(state: AppState) -> Router
{   Router::new()
      .route("/health", get(health_handler))
      .route("/api/chat", post(chat_handler))
      .with_state(state)
}

/// Bind and serve until the listener fails
pub async fn serve(
  server: &ServerConfig
, state: AppState
) -> Result<(), crate::error::Error>
{   let listener = tokio::net::TcpListener::bind(&server.bind_addr)
      .await
      .map_err(|e| {
        error!("Failed to bind {}: {}", server.bind_addr, e);
        crate::error::Error::HttpError(e.to_string())
      })?;
    info!("daychat listening on http://{}", server.bind_addr);
    axum::serve(listener, router(state))
      .await
      .map_err(|e| crate::error::Error::HttpError(e.to_string()))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value>
{   let provider = state.config
      .load()
      .and_then(|c| c.select_provider())
      .map(|p| p.name())
      .unwrap_or("unconfigured");
    Json(json!({
      "status": "ok",
      "version": env!("CARGO_PKG_VERSION"),
      "provider": provider
    }))
}

async fn chat_handler(
  State(state): State<AppState>
, body: Bytes
) -> Response
{   let value: Value = match serde_json::from_slice(&body)
    {   Ok(v) => v
      , Err(e) => {
          warn!("Unreadable chat body: {}", e);
          return GatewayFailure::invalid_messages()
            .with_details(format!("body is not JSON: {}", e))
            .into_response();
        }
    };

    let (shape, request) = match parse_body(&value)
    {   Ok(parsed) => parsed
      , Err(failure) => {
          warn!("Rejected chat request: {}", failure);
          return failure.into_response();
        }
    };
    debug!(
      "Chat API called: shape={:?}, history={}, model={:?}",
      shape, request.history.len(), request.model
    );

    let config = match state.config.load()
    {   Ok(c) => c
      , Err(e) => {
          error!("Configuration unreadable: {}", e);
          return config_failure(e).into_response();
        }
    };

    // a panic inside the gateway surfaces as a JoinError here
    let gateway = Arc::clone(&state.gateway);
    let outcome = tokio::spawn(async move {
      gateway.handle(&config, request).await
    }).await;

    match outcome
    {   Ok(Ok(reply)) => match shape
        {   RequestShape::Conversation => {
              Json(reply.into_conversation_reply()).into_response()
            }
          , RequestShape::SingleTurn => {
              Json(reply.into_single_turn_reply()).into_response()
            }
        }
      , Ok(Err(failure)) => {
          error!("Chat request failed: {}", failure);
          failure.into_response()
        }
      , Err(join_error) => {
          error!("Chat handler crashed: {}", join_error);
          GatewayFailure::internal(join_error.to_string()).into_response()
        }
    }
}

/// Failure reported when the per-request configuration cannot be loaded
fn config_failure(e: crate::error::Error) -> GatewayFailure
{   let base = match e
    {   crate::error::Error::MissingApiKey(_) => GatewayFailure::missing_api_key()
      , _ => GatewayFailure::invalid_configuration()
    };
    base.with_details(e.to_string())
}
