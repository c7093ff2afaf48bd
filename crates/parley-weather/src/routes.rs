//! Router construction and the single request handler.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use parley_rs::tools::weather::WeatherClient;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

/// Shared application state passed to the handler via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub weather: Arc<WeatherClient>,
}

/// One tool invocation from an execute request.
#[derive(Deserialize, Debug)]
struct ToolInvocation {
    name: String,
    #[serde(default)]
    parameters: ToolParameters,
}

#[derive(Deserialize, Debug, Default)]
struct ToolParameters {
    #[serde(default)]
    location: String,
}

/// Build the axum router: one `POST /` endpoint behind a permissive CORS
/// layer.
pub fn build_router(weather: Arc<WeatherClient>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle))
        .layer(cors)
        .with_state(AppState { weather })
}

/// POST / — dispatch on the `type` field.
///
/// The body is taken as a raw `Value` rather than a typed enum so that an
/// unknown or missing `type` produces the in-band error object instead of
/// an axum 4xx.
pub async fn handle(State(app): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    match body.get("type").and_then(Value::as_str) {
        Some("schema") => Json(schema_response()),
        Some("execute") => Json(execute(&app, &body).await),
        other => {
            warn!("rejected request with type {other:?}");
            Json(json!({"error": "Invalid request type"}))
        }
    }
}

/// The tool schema advertised to clients.
pub fn schema_response() -> Value {
    json!({
        "schema": {
            "type": "object",
            "properties": {
                "tools": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "enum": ["get-alerts", "get-forecast"],
                            },
                            "parameters": {
                                "type": "object",
                                "properties": {"location": {"type": "string"}},
                                "required": ["location"],
                            },
                        },
                        "required": ["name", "parameters"],
                    },
                }
            },
            "required": ["tools"],
        }
    })
}

/// Run every requested tool in order and collect per-item results. An
/// unknown tool name yields an error entry for that item only; the batch
/// always succeeds.
async fn execute(app: &AppState, body: &Value) -> Value {
    let tools: Vec<ToolInvocation> = match body.get("tools") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(tools) => tools,
            Err(e) => return json!({"error": format!("Invalid tools array: {e}")}),
        },
        None => Vec::new(),
    };

    let mut results = Vec::with_capacity(tools.len());
    for tool in tools {
        debug!("executing {} for '{}'", tool.name, tool.parameters.location);
        match tool.name.as_str() {
            "get-forecast" => {
                let report = app.weather.resolve(&tool.parameters.location).await;
                results.push(json!({"name": tool.name, "result": report.forecast_json()}));
            }
            "get-alerts" => {
                let report = app.weather.resolve(&tool.parameters.location).await;
                results.push(json!({"name": tool.name, "result": report.alerts}));
            }
            _ => {
                results.push(json!({"name": tool.name, "error": "Unknown tool"}));
            }
        }
    }

    json!({"results": results})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState {
            weather: Arc::new(WeatherClient::new().unwrap()),
        }
    }

    #[tokio::test]
    async fn schema_request_returns_tool_schema() {
        let Json(body) = handle(State(state()), Json(json!({"type": "schema"}))).await;
        let names = &body["schema"]["properties"]["tools"]["items"]["properties"]["name"]["enum"];
        assert_eq!(*names, json!(["get-alerts", "get-forecast"]));
        assert_eq!(body["schema"]["required"], json!(["tools"]));
    }

    #[tokio::test]
    async fn unknown_type_gets_in_band_error() {
        let Json(body) = handle(State(state()), Json(json!({"type": "bogus"}))).await;
        assert_eq!(body, json!({"error": "Invalid request type"}));
    }

    #[tokio::test]
    async fn missing_type_gets_in_band_error() {
        let Json(body) = handle(State(state()), Json(json!({"hello": "world"}))).await;
        assert_eq!(body, json!({"error": "Invalid request type"}));
    }

    #[tokio::test]
    async fn unknown_tool_gets_per_item_error() {
        let request = json!({
            "type": "execute",
            "tools": [{"name": "get-stock-price", "parameters": {"location": ""}}],
        });
        let Json(body) = handle(State(state()), Json(request)).await;
        assert_eq!(
            body,
            json!({"results": [{"name": "get-stock-price", "error": "Unknown tool"}]})
        );
    }

    #[tokio::test]
    async fn execute_without_tools_returns_empty_results() {
        let Json(body) = handle(State(state()), Json(json!({"type": "execute"}))).await;
        assert_eq!(body, json!({"results": []}));
    }

    #[test]
    fn invocation_parameters_default_when_missing() {
        let tool: ToolInvocation = serde_json::from_value(json!({"name": "get-alerts"})).unwrap();
        assert_eq!(tool.name, "get-alerts");
        assert_eq!(tool.parameters.location, "");
    }
}
