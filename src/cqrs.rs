use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::domain::{Product, Role, User};
use crate::dtos::{
    CreateUserResponse, GetProductsResponse, GetUserResponse, InsertResponse, MessageResponse,
    Response,
};
use crate::repositories::{PriceSort, ProductFilter, ProductRepository, UserRepository};

// traits
pub trait Command {}
pub trait Query {}

#[async_trait]
pub trait CommandHandler<C, R>
where
    C: Command + Send + Sync,
    R: Response,
{
    async fn handle(&self, input: &C) -> Result<R, String>;
}

#[async_trait]
pub trait QueryHandler<Q, R>
where
    Q: Query + Send + Sync,
    R: Response,
{
    async fn handle(&self, input: &Q) -> Result<R, String>;
}

// commands
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub profile: Document,
}
impl Command for CreateUserCommand {}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateProductCommand {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: f64,
    #[serde(flatten)]
    pub extra: Document,
}
impl Command for CreateProductCommand {}

// queries
#[derive(Debug)]
pub struct GetUserQuery {
    pub email: String,
}
impl Query for GetUserQuery {}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub title: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}
impl Query for ListProductsQuery {}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    6
}

// command handlers
pub struct CreateUserCommandHandler<T: UserRepository> {
    user_repository: Arc<T>,
}

impl<T: UserRepository> CreateUserCommandHandler<T> {
    pub fn new(user_repository: Arc<T>) -> CreateUserCommandHandler<T> {
        CreateUserCommandHandler { user_repository }
    }
}

#[async_trait]
impl<T: UserRepository> CommandHandler<CreateUserCommand, CreateUserResponse>
    for CreateUserCommandHandler<T>
{
    async fn handle(&self, input: &CreateUserCommand) -> Result<CreateUserResponse, String> {
        if self
            .user_repository
            .find_by_email(&input.email)
            .await?
            .is_some()
        {
            event!(Level::DEBUG, email = %input.email, "registration skipped, user exists");
            return Ok(CreateUserResponse::AlreadyExists(MessageResponse::new(
                "User already exists",
            )));
        }

        let user = User {
            id: None,
            email: input.email.clone(),
            role: input.role,
            profile: input.profile.clone(),
        };
        let inserted_id = self.user_repository.create(user).await?;
        Ok(CreateUserResponse::Inserted(InsertResponse {
            acknowledged: true,
            inserted_id,
        }))
    }
}

pub struct CreateProductCommandHandler<T: ProductRepository> {
    product_repository: Arc<T>,
}

impl<T: ProductRepository> CreateProductCommandHandler<T> {
    pub fn new(product_repository: Arc<T>) -> CreateProductCommandHandler<T> {
        CreateProductCommandHandler { product_repository }
    }
}

#[async_trait]
impl<T: ProductRepository> CommandHandler<CreateProductCommand, InsertResponse>
    for CreateProductCommandHandler<T>
{
    async fn handle(&self, input: &CreateProductCommand) -> Result<InsertResponse, String> {
        let product = Product {
            id: None,
            title: input.title.clone(),
            brand: input.brand.clone(),
            category: input.category.clone(),
            price: input.price,
            extra: input.extra.clone(),
        };
        let inserted_id = self.product_repository.create(product).await?;
        Ok(InsertResponse {
            acknowledged: true,
            inserted_id,
        })
    }
}

// query handlers
pub struct GetUserQueryHandler<T: UserRepository> {
    user_repository: Arc<T>,
}

impl<T: UserRepository> GetUserQueryHandler<T> {
    pub fn new(user_repository: Arc<T>) -> GetUserQueryHandler<T> {
        GetUserQueryHandler { user_repository }
    }
}

#[async_trait]
impl<T: UserRepository> QueryHandler<GetUserQuery, GetUserResponse> for GetUserQueryHandler<T> {
    async fn handle(&self, input: &GetUserQuery) -> Result<GetUserResponse, String> {
        Ok(GetUserResponse(
            self.user_repository.find_by_email(&input.email).await?,
        ))
    }
}

pub struct ListProductsQueryHandler<T: ProductRepository> {
    product_repository: Arc<T>,
}

impl<T: ProductRepository> ListProductsQueryHandler<T> {
    pub fn new(product_repository: Arc<T>) -> ListProductsQueryHandler<T> {
        ListProductsQueryHandler { product_repository }
    }
}

#[async_trait]
impl<T: ProductRepository> QueryHandler<ListProductsQuery, GetProductsResponse>
    for ListProductsQueryHandler<T>
{
    async fn handle(&self, input: &ListProductsQuery) -> Result<GetProductsResponse, String> {
        let filter = ProductFilter {
            title: input.title.clone(),
            category: input.category.clone(),
            brand: input.brand.clone(),
        };
        let sort = PriceSort::from_param(input.sort.as_deref());
        let page = u64::from(input.page.max(1));
        let limit = u64::from(input.limit);
        let skip = (page - 1) * limit;

        let products = self
            .product_repository
            .find_page(&filter, sort, skip, limit as i64)
            .await?;
        let total_products = self.product_repository.count(&filter).await?;
        let facets = self.product_repository.facets().await?;

        Ok(GetProductsResponse {
            products,
            brands: facets.brands,
            categories: facets.categories,
            total_products,
        })
    }
}
