use crate::controller::{health_check_controller, mcp_controller};
use crate::middleware::{logging::log_request, recovery::handle_panic};
use crate::stream::handler::sse_handler;
use axum::{
    http::Method,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service::AppState;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

pub fn define_routes(app_state: AppState) -> Router {
    let router = Router::new().merge(health_routes()).merge(mcp_routes());
    with_middleware(router).with_state(app_state)
}

// Outermost first: CORS, request logging, panic recovery.
fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(log_request))
        .layer(cors_layer())
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .route("/ready", get(health_check_controller::ready))
}

fn mcp_routes() -> Router<AppState> {
    Router::new()
        .route("/mcp/stream", get(sse_handler))
        .route("/mcp/publish", post(mcp_controller::publish))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
