// pdfxml - PDF to XML conversion service driven by a generative text model

pub mod config;
pub mod db;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod routes;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
