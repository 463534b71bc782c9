//! CLI flags, tracing setup, router wiring, and HTTP handlers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use docsmith_core::Pipeline;
use docsmith_index::IndexClient;
use docsmith_model::ModelClient;
use docsmith_shared::{
    DocsmithError, ProcessRequest, load_config, load_config_from, validate_api_key,
    validate_endpoints,
};
use docsmith_storage::PageStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Docsmith — generate and maintain documentation pages from PRDs.
#[derive(Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Serve the PRD-to-documentation pipeline over HTTP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file path (defaults to ~/.docsmith/docsmith.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bind address, overriding the config file.
    #[arg(long)]
    pub bind: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsmith=info",
        1 => "docsmith=debug",
        _ => "docsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Load config, wire up the pipeline, and serve until shutdown.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    validate_endpoints(&config)?;
    validate_api_key(&config)?;

    // Presence was just validated; read the key once for the client.
    let api_key = std::env::var(&config.model.api_key_env)?;

    let store = PageStore::open(std::path::Path::new(&config.storage.db_path)).await?;
    let index = IndexClient::new(&config.index)?;
    let model = ModelClient::new(&config.model, api_key)?;
    let pipeline = Arc::new(Pipeline::new(store, index, model));

    let bind_addr = cli.bind.as_deref().unwrap_or(&config.server.bind);
    let bind: SocketAddr = bind_addr
        .parse()
        .map_err(|e| eyre!("invalid bind address '{bind_addr}': {e}"))?;

    serve(bind, pipeline).await
}

/// Serve the router on `bind` until a shutdown signal.
async fn serve(bind: SocketAddr, pipeline: Arc<Pipeline>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "docsmith listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Routing table: JSON API under `/api`, stored pages at the root.
fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/process-docs", post(process_docs))
        .route("/pages", get(list_pages));

    Router::new()
        .nest("/api", api_routes)
        .route("/pages/{page_id}", get(serve_page))
        .layer(cors)
        .with_state(pipeline)
}

/// Resolves on ctrl-c or SIGTERM, whichever lands first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run the full pipeline for one PRD submission.
async fn process_docs(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<ProcessRequest>,
) -> Response {
    if request.prd.trim().is_empty() {
        return envelope_error(
            StatusCode::BAD_REQUEST,
            "Missing required fields: PRD is required",
        );
    }

    match pipeline.process(&request.prd, &request.images).await {
        Ok(outcome) => {
            let body = serde_json::json!({
                "success": true,
                "message": "Docs processed successfully",
                "data": {
                    "pageId": outcome.page_id,
                    "documentId": outcome.document_id,
                    "workflow": outcome.workflow.as_str(),
                    "pageTitle": outcome.page_title,
                },
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, "process-docs failed");
            envelope_error(error_status(&e), &e.to_string())
        }
    }
}

/// Page listing projection, newest first.
async fn list_pages(State(pipeline): State<Arc<Pipeline>>) -> Response {
    match pipeline.store().list_pages().await {
        Ok(pages) => {
            Json(serde_json::json!({ "success": true, "data": pages })).into_response()
        }
        Err(e) => {
            error!(error = %e, "page listing failed");
            envelope_error(error_status(&e), &e.to_string())
        }
    }
}

/// Serve the stored HTML document for a page id.
async fn serve_page(
    State(pipeline): State<Arc<Pipeline>>,
    Path(page_id): Path<String>,
) -> Response {
    match pipeline.store().find_page(&page_id).await {
        Ok(Some(page)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            page.html_code,
        )
            .into_response(),
        Ok(None) => {
            let err = DocsmithError::not_found(format!("page {page_id}"));
            envelope_error(error_status(&err), "Page not found")
        }
        Err(e) => {
            error!(error = %e, page_id, "page lookup failed");
            envelope_error(error_status(&e), &e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

fn envelope_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "message": message })),
    )
        .into_response()
}

/// Map pipeline errors onto HTTP statuses. Anything without a clear client
/// cause is a 500.
fn error_status(err: &DocsmithError) -> StatusCode {
    match err {
        DocsmithError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        DocsmithError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsmith_shared::{IndexConfig, ModelConfig, PageDetails};
    use uuid::Uuid;

    /// Serve the real router on an ephemeral port. Collaborator endpoints
    /// point at a closed port; no test here may reach them.
    async fn spawn_server() -> (String, Arc<Pipeline>) {
        let tmp = std::env::temp_dir().join(format!("ds_server_{}.db", Uuid::now_v7()));
        let store = PageStore::open(&tmp).await.expect("open test db");

        let index = IndexClient::new(&IndexConfig {
            endpoint: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        })
        .expect("index client");

        let model = ModelClient::new(
            &ModelConfig {
                endpoint: "http://127.0.0.1:9".into(),
                model: "test/model-1".into(),
                max_tokens: 512,
                api_key_env: "MODEL_API_KEY".into(),
                timeout_secs: 1,
            },
            "test-key",
        )
        .expect("model client");

        let pipeline = Arc::new(Pipeline::new(store, index, model));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let app = router(Arc::clone(&pipeline));
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        (format!("http://{addr}"), pipeline)
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let (base, _pipeline) = spawn_server().await;

        let response = reqwest::get(format!("{base}/api/health"))
            .await
            .expect("request");
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.expect("json body");
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_empty_prd_rejected_with_envelope() {
        let (base, _pipeline) = spawn_server().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/process-docs"))
            .json(&serde_json::json!({ "prd": "   " }))
            .send()
            .await
            .expect("request");

        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.expect("json body");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Missing required fields: PRD is required");
    }

    #[tokio::test]
    async fn test_stored_page_served_as_html() {
        let (base, pipeline) = spawn_server().await;

        let page = pipeline
            .store()
            .create_page(
                &PageDetails {
                    page_title: Some("Served".into()),
                    description: None,
                },
                "<h1>Served</h1>",
            )
            .await
            .expect("seed page");

        let response = reqwest::get(format!("{base}/pages/{}", page.id))
            .await
            .expect("request");
        assert_eq!(response.status(), 200);

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .expect("content type")
            .to_str()
            .expect("ascii header");
        assert!(content_type.starts_with("text/html"));
        assert_eq!(response.text().await.expect("body"), "<h1>Served</h1>");
    }

    #[tokio::test]
    async fn test_unknown_page_is_404_envelope() {
        let (base, _pipeline) = spawn_server().await;

        let response = reqwest::get(format!("{base}/pages/no-such-page"))
            .await
            .expect("request");
        assert_eq!(response.status(), 404);

        let body: serde_json::Value = response.json().await.expect("json body");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Page not found");
    }

    #[tokio::test]
    async fn test_listing_returns_summaries() {
        let (base, pipeline) = spawn_server().await;

        pipeline
            .store()
            .create_page(
                &PageDetails {
                    page_title: Some("Only Page".into()),
                    description: None,
                },
                "<p>x</p>",
            )
            .await
            .expect("seed page");

        let body: serde_json::Value = reqwest::get(format!("{base}/api/pages"))
            .await
            .expect("request")
            .json()
            .await
            .expect("json body");

        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["page_title"], "Only Page");
    }
}
