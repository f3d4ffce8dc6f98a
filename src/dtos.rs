use serde::{Deserialize, Serialize};

use crate::domain::{Product, User};

pub trait Response {}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> MessageResponse {
        MessageResponse {
            message: String::from(message),
        }
    }
}
impl Response for MessageResponse {}

// mirrors the driver acknowledgment shape clients already consume
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub acknowledged: bool,
    pub inserted_id: String,
}
impl Response for InsertResponse {}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CreateUserResponse {
    AlreadyExists(MessageResponse),
    Inserted(InsertResponse),
}
impl Response for CreateUserResponse {}

#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GetUserResponse(pub Option<User>);
impl Response for GetUserResponse {}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProductsResponse {
    pub products: Vec<Product>,
    pub brands: Vec<String>,
    pub categories: Vec<String>,
    pub total_products: u64,
}
impl Response for GetProductsResponse {}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
impl Response for TokenResponse {}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
}
impl Response for ApiError {}
