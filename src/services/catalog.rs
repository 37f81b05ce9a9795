use crate::{
    db::StoreHandle,
    entities::{product, Product},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Product as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: String,
    pub stock: i32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductView {
    fn from(model: product::Model) -> Self {
        let images = model.image_urls();
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            price: model.price,
            category: model.category,
            stock: model.stock,
            images,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub price: Decimal,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
}

/// Partial product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: Option<String>,
}

/// Query string accepted by the product listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    /// Matching products, ignoring pagination
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    /// Every category in the catalog, for filter UIs
    pub categories: Vec<String>,
}

fn sort_column(field: &str) -> Option<product::Column> {
    match field {
        "createdAt" | "created_at" => Some(product::Column::CreatedAt),
        "updatedAt" | "updated_at" => Some(product::Column::UpdatedAt),
        "price" => Some(product::Column::Price),
        "title" => Some(product::Column::Title),
        "stock" => Some(product::Column::Stock),
        "category" => Some(product::Column::Category),
        _ => None,
    }
}

fn sort_direction(order: &str) -> Option<Order> {
    match order.to_ascii_lowercase().as_str() {
        "asc" => Some(Order::Asc),
        "desc" => Some(Order::Desc),
        _ => None,
    }
}

/// Escapes LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn ensure_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::InvalidInput(
            "price must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn encode_images(images: &[String]) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(images)
        .map_err(|e| ServiceError::InternalError(format!("encode images: {}", e)))
}

#[derive(Clone)]
pub struct ProductService {
    db: StoreHandle,
    default_page_size: u64,
    max_page_size: u64,
}

impl ProductService {
    pub fn new(db: StoreHandle, default_page_size: u64, max_page_size: u64) -> Self {
        Self {
            db,
            default_page_size: default_page_size.max(1),
            max_page_size: max_page_size.max(1),
        }
    }

    /// Lists products matching the query, one page at a time.
    #[instrument(skip(self))]
    pub async fn list(&self, query: ProductQuery) -> Result<ProductPage, ServiceError> {
        let db = &*self.db;

        let sort_by = query.sort_by.as_deref().unwrap_or("createdAt");
        let column = sort_column(sort_by)
            .ok_or_else(|| ServiceError::InvalidInput(format!("cannot sort by {}", sort_by)))?;
        let sort_order = query.sort_order.as_deref().unwrap_or("desc");
        let direction = sort_direction(sort_order).ok_or_else(|| {
            ServiceError::InvalidInput(format!("sortOrder must be asc or desc, got {}", sort_order))
        })?;

        let page = query.page.unwrap_or(1).max(1);
        let limit = match query.limit {
            Some(0) | None => self.default_page_size,
            Some(n) => n.min(self.max_page_size),
        };
        // The row offset must fit the store's signed 64-bit OFFSET.
        (page - 1)
            .checked_mul(limit)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| ServiceError::InvalidInput(format!("page {} is out of range", page)))?;

        let mut select = Product::find();
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(product::Column::Category.eq(category));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Title)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Description)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }

        let paginator = select
            .order_by(column, direction)
            .order_by(product::Column::Id, Order::Asc)
            .paginate(db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        let categories = Product::find()
            .select_only()
            .column(product::Column::Category)
            .distinct()
            .order_by_asc(product::Column::Category)
            .into_tuple::<String>()
            .all(db)
            .await?;

        Ok(ProductPage {
            products: products.into_iter().map(ProductView::from).collect(),
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
            categories,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<ProductView, ServiceError> {
        request.validate()?;
        ensure_price(request.price)?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title),
            description: Set(request.description),
            price: Set(request.price),
            category: Set(request.category),
            stock: Set(request.stock),
            images: Set(encode_images(&request.images)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %model.id, "Product created");
        Ok(model.into())
    }

    /// Applies the fields present in `update` and refreshes `updated_at`.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: Uuid, update: ProductUpdate) -> Result<ProductView, ServiceError> {
        update.validate()?;
        if let Some(price) = update.price {
            ensure_price(price)?;
        }

        let existing = Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(price) = update.price {
            active.price = Set(price);
        }
        if let Some(stock) = update.stock {
            active.stock = Set(stock);
        }
        if let Some(images) = update.images {
            active.images = Set(encode_images(&images)?);
        }
        if let Some(category) = update.category {
            active.category = Set(category);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;
        info!(product_id = %id, "Product updated");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }

        info!(product_id = %id, "Product deleted");
        Ok(())
    }
}
