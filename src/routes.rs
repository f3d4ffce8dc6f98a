use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::{event, Level};

use crate::auth;
use crate::cqrs::{
    CommandHandler, CreateProductCommand, CreateUserCommand, GetUserQuery, ListProductsQuery,
    QueryHandler,
};
use crate::dtos::{ApiError, CreateUserResponse, TokenRequest, TokenResponse};
use crate::repositories::{ProductRepository, UserRepository};
use crate::state::AppState;

pub async fn index() -> &'static str {
    "vistaMart is running"
}

pub async fn create_user<U, P>(
    State(state): State<Arc<AppState<U, P>>>,
    Json(command): Json<CreateUserCommand>,
) -> (StatusCode, Json<Value>)
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    match state.create_user_command_handler.handle(&command).await {
        Ok(response @ CreateUserResponse::AlreadyExists(_)) => {
            (StatusCode::OK, Json(json!(response)))
        }
        Ok(response) => (StatusCode::CREATED, Json(json!(response))),
        Err(e) => {
            event!(Level::ERROR, error = %e, "failed to register user");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!(ApiError { error: e })),
            )
        }
    }
}

pub async fn get_user<U, P>(
    Path(email): Path<String>,
    State(state): State<Arc<AppState<U, P>>>,
) -> (StatusCode, Json<Value>)
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    let query = GetUserQuery { email };
    match state.get_user_query_handler.handle(&query).await {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(e) => {
            event!(Level::ERROR, error = %e, "failed to look up user");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!(ApiError { error: e })),
            )
        }
    }
}

pub async fn add_product<U, P>(
    State(state): State<Arc<AppState<U, P>>>,
    Json(command): Json<CreateProductCommand>,
) -> (StatusCode, Json<Value>)
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    match state.create_product_command_handler.handle(&command).await {
        Ok(response) => (StatusCode::CREATED, Json(json!(response))),
        Err(e) => {
            event!(Level::ERROR, error = %e, "failed to add product");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!(ApiError { error: e })),
            )
        }
    }
}

pub async fn all_products<U, P>(
    Query(query): Query<ListProductsQuery>,
    State(state): State<Arc<AppState<U, P>>>,
) -> (StatusCode, Json<Value>)
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    match state.list_products_query_handler.handle(&query).await {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(e) => {
            event!(Level::ERROR, error = %e, "failed to fetch products");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!(ApiError {
                    error: String::from("Failed to fetch products")
                })),
            )
        }
    }
}

pub async fn issue_token<U, P>(
    State(state): State<Arc<AppState<U, P>>>,
    Json(request): Json<TokenRequest>,
) -> (StatusCode, Json<Value>)
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    match state.token_service.sign(&request.email) {
        Ok(token) => (StatusCode::OK, Json(json!(TokenResponse { token }))),
        Err(e) => {
            event!(Level::ERROR, error = %e, "failed to issue token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!(ApiError { error: e })),
            )
        }
    }
}

pub fn build_router<U, P>(state: Arc<AppState<U, P>>) -> Router
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/users", post(create_user::<U, P>))
        .route("/user/{email}", get(get_user::<U, P>))
        .route(
            "/add-products",
            post(add_product::<U, P>)
                .route_layer(from_fn_with_state(
                    state.clone(),
                    auth::verify_seller::<U, P>,
                ))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    auth::verify_token::<U, P>,
                )),
        )
        .route("/all-products", get(all_products::<U, P>))
        .route("/authentication", post(issue_token::<U, P>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    use crate::auth::{Claims, TokenService};
    use crate::cqrs::{
        CreateProductCommandHandler, CreateUserCommandHandler, GetUserQueryHandler,
        ListProductsQueryHandler,
    };
    use crate::domain::Product;
    use crate::repositories::{
        InMemoryProductRepository, InMemoryUserRepository, ProductRepository,
    };

    const SECRET: &str = "router-test-secret";

    fn test_app() -> (Router, Arc<InMemoryProductRepository>) {
        let user_repository = Arc::new(InMemoryUserRepository::new());
        let product_repository = Arc::new(InMemoryProductRepository::new());
        let state = Arc::new(AppState {
            create_user_command_handler: Arc::new(CreateUserCommandHandler::new(
                user_repository.clone(),
            )),
            get_user_query_handler: Arc::new(GetUserQueryHandler::new(user_repository.clone())),
            create_product_command_handler: Arc::new(CreateProductCommandHandler::new(
                product_repository.clone(),
            )),
            list_products_query_handler: Arc::new(ListProductsQueryHandler::new(
                product_repository.clone(),
            )),
            user_repository,
            token_service: Arc::new(TokenService::new(String::from(SECRET))),
        });
        (build_router(state), product_repository)
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(router: &Router, email: &str, role: &str) {
        let (status, _) = send(
            router,
            "POST",
            "/users",
            None,
            Some(json!({ "email": email, "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn token_for(router: &Router, email: &str) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/authentication",
            None,
            Some(json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn seed_products(repository: &InMemoryProductRepository, count: u32) {
        for n in 1..=count {
            repository
                .create(Product {
                    id: None,
                    title: format!("p{}", n),
                    brand: Some(String::from(if n % 2 == 0 { "Acme" } else { "Globex" })),
                    category: Some(String::from("Gadgets")),
                    price: f64::from(n),
                    extra: mongodb::bson::doc! {},
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn index_reports_liveness() {
        let (router, _) = test_app();
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"vistaMart is running");
    }

    #[tokio::test]
    async fn duplicate_registration_returns_message_without_inserting() {
        let (router, _) = test_app();

        let (status, body) = send(
            &router,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "jane@vista.mart", "role": "buyer", "name": "Jane" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["acknowledged"], json!(true));

        let (status, body) = send(
            &router,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "jane@vista.mart", "role": "seller" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("User already exists"));

        // first registration wins: the role was not overwritten
        let (_, body) = send(&router, "GET", "/user/jane@vista.mart", None, None).await;
        assert_eq!(body["role"], json!("buyer"));
        assert_eq!(body["name"], json!("Jane"));
    }

    #[tokio::test]
    async fn unknown_user_lookup_returns_null() {
        let (router, _) = test_app();
        let (status, body) = send(&router, "GET", "/user/nobody@vista.mart", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn brand_filter_returns_only_matching_products() {
        let (router, products) = test_app();
        seed_products(&products, 6).await;

        let (status, body) = send(&router, "GET", "/all-products?brand=Acme", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let listed = body["products"].as_array().unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|p| p["brand"] == json!("Acme")));
        assert_eq!(body["totalProducts"], json!(3));
        // facets ignore the filter
        assert_eq!(body["brands"], json!(["Globex", "Acme"]));
        assert_eq!(body["categories"], json!(["Gadgets"]));
    }

    #[tokio::test]
    async fn second_page_skips_first_six_results() {
        let (router, products) = test_app();
        seed_products(&products, 8).await;

        let (status, body) = send(
            &router,
            "GET",
            "/all-products?page=2&limit=6",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let listed = body["products"].as_array().unwrap();
        assert_eq!(listed.len(), 2);
        // price-descending default, so the tail of the ordering lands here
        assert_eq!(listed[0]["title"], json!("p2"));
        assert_eq!(listed[1]["title"], json!("p1"));
        assert_eq!(body["totalProducts"], json!(8));
    }

    #[tokio::test]
    async fn ascending_sort_reverses_the_ordering() {
        let (router, products) = test_app();
        seed_products(&products, 3).await;

        let (_, body) = send(&router, "GET", "/all-products?sort=asc", None, None).await;
        let listed = body["products"].as_array().unwrap();
        assert_eq!(listed[0]["title"], json!("p1"));
        assert_eq!(listed[2]["title"], json!("p3"));
    }

    #[tokio::test]
    async fn title_filter_is_case_insensitive() {
        let (router, products) = test_app();
        seed_products(&products, 3).await;

        let (_, body) = send(&router, "GET", "/all-products?title=P2", None, None).await;
        let listed = body["products"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["title"], json!("p2"));
    }

    #[tokio::test]
    async fn seller_can_add_products() {
        let (router, _) = test_app();
        register(&router, "seller@vista.mart", "seller").await;
        let token = token_for(&router, "seller@vista.mart").await;

        let (status, body) = send(
            &router,
            "POST",
            "/add-products",
            Some(&token),
            Some(json!({ "title": "Widget", "brand": "Acme", "price": 9.99 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["acknowledged"], json!(true));

        let (_, body) = send(&router, "GET", "/all-products", None, None).await;
        assert_eq!(body["totalProducts"], json!(1));
    }

    #[tokio::test]
    async fn non_seller_is_forbidden() {
        let (router, products) = test_app();
        register(&router, "buyer@vista.mart", "buyer").await;
        let token = token_for(&router, "buyer@vista.mart").await;

        let (status, body) = send(
            &router,
            "POST",
            "/add-products",
            Some(&token),
            Some(json!({ "title": "Widget", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], json!("Forbidden access"));
        assert_eq!(products.count(&Default::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_requester_is_forbidden() {
        let (router, _) = test_app();
        let token = token_for(&router, "ghost@vista.mart").await;

        let (status, body) = send(
            &router,
            "POST",
            "/add-products",
            Some(&token),
            Some(json!({ "title": "Widget", "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], json!("Forbidden access"));
    }

    #[tokio::test]
    async fn missing_token_stops_the_request() {
        let (router, products) = test_app();

        let (_, body) = send(
            &router,
            "POST",
            "/add-products",
            None,
            Some(json!({ "title": "Widget", "price": 1.0 })),
        )
        .await;
        assert_eq!(body["message"], json!("No Token"));
        assert_eq!(products.count(&Default::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let (router, _) = test_app();

        let (_, body) = send(
            &router,
            "POST",
            "/add-products",
            Some("garbage"),
            Some(json!({ "title": "Widget", "price": 1.0 })),
        )
        .await;
        assert_eq!(body["message"], json!("Invalid Token"));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (router, products) = test_app();
        register(&router, "seller@vista.mart", "seller").await;

        let claims = Claims {
            email: String::from("seller@vista.mart"),
            iat: (Utc::now() - Duration::days(11)).timestamp() as usize,
            exp: (Utc::now() - Duration::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let (_, body) = send(
            &router,
            "POST",
            "/add-products",
            Some(&token),
            Some(json!({ "title": "Widget", "price": 1.0 })),
        )
        .await;
        assert_eq!(body["message"], json!("Invalid Token"));
        assert_eq!(products.count(&Default::default()).await.unwrap(), 0);
    }
}
