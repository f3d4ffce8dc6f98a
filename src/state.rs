use std::sync::Arc;

use crate::auth::TokenService;
use crate::cqrs::{
    CreateProductCommandHandler, CreateUserCommandHandler, GetUserQueryHandler,
    ListProductsQueryHandler,
};
use crate::repositories::{ProductRepository, UserRepository};

pub struct AppState<U: UserRepository, P: ProductRepository> {
    pub create_user_command_handler: Arc<CreateUserCommandHandler<U>>,
    pub get_user_query_handler: Arc<GetUserQueryHandler<U>>,
    pub create_product_command_handler: Arc<CreateProductCommandHandler<P>>,
    pub list_products_query_handler: Arc<ListProductsQueryHandler<P>>,
    // the seller gate reads roles directly
    pub user_repository: Arc<U>,
    pub token_service: Arc<TokenService>,
}
