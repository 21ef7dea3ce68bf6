//! HTTP surface: the generation endpoint, smoke tests and the embedded web form.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use cookiepress_api_types::{GENERATE_PATH, HEALTH_PATH, HELLO_PATH};

use crate::{
    application::generate::GenerateService, config::ResponseTransport, infra::assets,
};

mod generate;
mod health;
mod middleware;

pub use middleware::REQUEST_ID_HEADER;

#[derive(Clone)]
pub struct HttpState {
    pub generate: Arc<GenerateService>,
    pub transport: ResponseTransport,
}

impl HttpState {
    pub fn new(generate: Arc<GenerateService>, transport: ResponseTransport) -> Self {
        Self {
            generate,
            transport,
        }
    }
}

pub fn build_router(state: HttpState, max_request_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route(GENERATE_PATH, post(generate::generate))
        .route(HELLO_PATH, get(health::hello))
        .layer(DefaultBodyLimit::max(max_request_bytes));

    let static_routes = Router::new()
        .route("/", get(assets::serve_index))
        .route(HEALTH_PATH, get(health::health))
        .route("/static/{*path}", get(assets::serve_static));

    api_routes
        .merge(static_routes)
        .with_state(state)
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}
