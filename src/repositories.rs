use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Collection, Database};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Product, User};

pub const USER_COLLECTION: &str = "users";
pub const PRODUCT_COLLECTION: &str = "products";

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl ProductFilter {
    // title/category match as case-insensitive substrings, brand matches exactly
    fn to_document(&self) -> Document {
        let mut query = doc! {};
        if let Some(title) = &self.title {
            query.insert("title", doc! { "$regex": title, "$options": "i" });
        }
        if let Some(category) = &self.category {
            query.insert("category", doc! { "$regex": category, "$options": "i" });
        }
        if let Some(brand) = &self.brand {
            query.insert("brand", brand);
        }
        query
    }

    fn matches(&self, product: &Product) -> bool {
        if let Some(title) = &self.title {
            if !product.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            match &product.category {
                Some(value) if value.to_lowercase().contains(&category.to_lowercase()) => {}
                _ => return false,
            }
        }
        if let Some(brand) = &self.brand {
            if product.brand.as_deref() != Some(brand.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    Ascending,
    Descending,
}

impl PriceSort {
    pub fn from_param(sort: Option<&str>) -> PriceSort {
        if sort == Some("asc") {
            PriceSort::Ascending
        } else {
            PriceSort::Descending
        }
    }

    fn direction(self) -> i32 {
        match self {
            PriceSort::Ascending => 1,
            PriceSort::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFacets {
    pub brands: Vec<String>,
    pub categories: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<String, String>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: Product) -> Result<String, String>;
    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: PriceSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<Product>, String>;
    async fn count(&self, filter: &ProductFilter) -> Result<u64, String>;
    async fn facets(&self) -> Result<ProductFacets, String>;
}

fn inserted_id_hex(inserted_id: &Bson) -> String {
    match inserted_id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

// first-seen order, missing values dropped
fn distinct_in_order<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for value in values.into_iter().flatten() {
        if seen.insert(value.clone()) {
            distinct.push(value);
        }
    }
    distinct
}

#[derive(Clone)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> InMemoryUserRepository {
        InMemoryUserRepository {
            users: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<String, String> {
        let mut lock = self.users.lock().await;
        lock.insert(user.email.clone(), user);
        Ok(Uuid::new_v4().to_string())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, String> {
        let lock = self.users.lock().await;
        Ok(lock.get(email).cloned())
    }
}

#[derive(Clone)]
pub struct InMemoryProductRepository {
    products: Arc<Mutex<Vec<Product>>>,
}

impl InMemoryProductRepository {
    pub fn new() -> InMemoryProductRepository {
        InMemoryProductRepository {
            products: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, product: Product) -> Result<String, String> {
        let mut lock = self.products.lock().await;
        lock.push(product);
        Ok(Uuid::new_v4().to_string())
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: PriceSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<Product>, String> {
        let lock = self.products.lock().await;
        let mut matching: Vec<Product> = lock
            .iter()
            .filter(|product| filter.matches(product))
            .cloned()
            .collect();
        matching.sort_by(|a, b| match sort {
            PriceSort::Ascending => a.price.total_cmp(&b.price),
            PriceSort::Descending => b.price.total_cmp(&a.price),
        });
        Ok(matching
            .into_iter()
            .skip(skip as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filter: &ProductFilter) -> Result<u64, String> {
        let lock = self.products.lock().await;
        Ok(lock.iter().filter(|product| filter.matches(product)).count() as u64)
    }

    async fn facets(&self) -> Result<ProductFacets, String> {
        let lock = self.products.lock().await;
        Ok(ProductFacets {
            brands: distinct_in_order(lock.iter().map(|product| product.brand.clone())),
            categories: distinct_in_order(lock.iter().map(|product| product.category.clone())),
        })
    }
}

#[derive(Clone)]
pub struct MongoDbUserRepository {
    user_collection: Collection<User>,
}

impl MongoDbUserRepository {
    pub fn new(database: &Database) -> MongoDbUserRepository {
        MongoDbUserRepository {
            user_collection: database.collection(USER_COLLECTION),
        }
    }
}

#[async_trait]
impl UserRepository for MongoDbUserRepository {
    async fn create(&self, user: User) -> Result<String, String> {
        match self.user_collection.insert_one(user).await {
            Ok(result) => Ok(inserted_id_hex(&result.inserted_id)),
            Err(e) => Err(format!("Failed to insert user: {}", e)),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, String> {
        self.user_collection
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| format!("Failed to find user with email {}: {}", email, e))
    }
}

// only the fields the facet scan projects
#[derive(Debug, Deserialize)]
struct FacetRow {
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Clone)]
pub struct MongoDbProductRepository {
    product_collection: Collection<Product>,
}

impl MongoDbProductRepository {
    pub fn new(database: &Database) -> MongoDbProductRepository {
        MongoDbProductRepository {
            product_collection: database.collection(PRODUCT_COLLECTION),
        }
    }
}

#[async_trait]
impl ProductRepository for MongoDbProductRepository {
    async fn create(&self, product: Product) -> Result<String, String> {
        match self.product_collection.insert_one(product).await {
            Ok(result) => Ok(inserted_id_hex(&result.inserted_id)),
            Err(e) => Err(format!("Failed to insert product: {}", e)),
        }
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        sort: PriceSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<Product>, String> {
        let cursor = self
            .product_collection
            .find(filter.to_document())
            .sort(doc! { "price": sort.direction() })
            .skip(skip)
            .limit(limit)
            .await
            .map_err(|e| format!("Failed to find products: {}", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| format!("Failed to read products: {}", e))
    }

    async fn count(&self, filter: &ProductFilter) -> Result<u64, String> {
        self.product_collection
            .count_documents(filter.to_document())
            .await
            .map_err(|e| format!("Failed to count products: {}", e))
    }

    async fn facets(&self) -> Result<ProductFacets, String> {
        let rows: Vec<FacetRow> = self
            .product_collection
            .clone_with_type::<FacetRow>()
            .find(doc! {})
            .projection(doc! { "brand": 1, "category": 1 })
            .await
            .map_err(|e| format!("Failed to scan product facets: {}", e))?
            .try_collect()
            .await
            .map_err(|e| format!("Failed to read product facets: {}", e))?;

        Ok(ProductFacets {
            brands: distinct_in_order(rows.iter().map(|row| row.brand.clone())),
            categories: distinct_in_order(rows.iter().map(|row| row.category.clone())),
        })
    }
}
