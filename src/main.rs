// define modules in crate
mod auth;
mod config;
mod cqrs;
mod domain;
mod dtos;
mod repositories;
mod routes;
mod state;

use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use cqrs::{
    CreateProductCommandHandler, CreateUserCommandHandler, GetUserQueryHandler,
    ListProductsQueryHandler,
};
use dotenv::dotenv;
use mongodb::{bson::doc, Client};
use repositories::{MongoDbProductRepository, MongoDbUserRepository};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{event, Level};

use crate::auth::TokenService;
use crate::config::Config;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .json()
        .init();

    let client = Client::with_uri_str(&config.mongodb_uri)
        .await
        .expect("failed to create MongoDB client");
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .expect("failed to ping MongoDB deployment");
    event!(Level::INFO, "connected to MongoDB");

    let database = client.database(&config.mongodb_db);
    let user_repository = Arc::new(MongoDbUserRepository::new(&database));
    let product_repository = Arc::new(MongoDbProductRepository::new(&database));

    let state = Arc::new(AppState {
        create_user_command_handler: Arc::new(CreateUserCommandHandler::new(
            user_repository.clone(),
        )),
        get_user_query_handler: Arc::new(GetUserQueryHandler::new(user_repository.clone())),
        create_product_command_handler: Arc::new(CreateProductCommandHandler::new(
            product_repository.clone(),
        )),
        list_products_query_handler: Arc::new(ListProductsQueryHandler::new(product_repository)),
        user_repository,
        token_service: Arc::new(TokenService::new(config.access_token_secret)),
    });

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind listener");
    event!(Level::INFO, port = config.port, "server listening");

    axum::serve(
        listener,
        routes::build_router(state)
            .route("/metrics", get(|| async move { metrics_handle.render() }))
            .layer(prometheus_layer)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            ),
    )
    .await
    .expect("server failed");
}
