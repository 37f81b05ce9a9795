use crate::{
    db::StoreHandle,
    entities::{cart, product, Cart, CartLine, Product},
    errors::ServiceError,
    services::{catalog::ProductView, orders::quantity_too_large},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: ProductView,
}

/// Cart as displayed. `total` is the number of lines shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: usize,
}

fn corrupt(err: serde_json::Error) -> ServiceError {
    ServiceError::InternalError(format!("corrupt cart document: {}", err))
}

fn cart_not_found() -> ServiceError {
    ServiceError::NotFound("Cart not found".to_string())
}

fn line_not_found() -> ServiceError {
    ServiceError::NotFound("Item not found in cart".to_string())
}

fn insufficient_stock() -> ServiceError {
    ServiceError::InvalidInput("Insufficient stock".to_string())
}

/// Adds `quantity` of `product_id`, summing into an existing line if there is one.
pub fn merge_into(
    lines: &mut Vec<CartLine>,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    match lines.iter_mut().find(|line| line.product_id == product_id) {
        Some(line) => {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(quantity_too_large)?;
        }
        None => lines.push(CartLine {
            product_id,
            quantity,
        }),
    }
    Ok(())
}

#[derive(Clone)]
pub struct CartService {
    db: StoreHandle,
}

impl CartService {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<cart::Model>, ServiceError> {
        Ok(Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    /// Returns the user's cart, creating an empty one on first access.
    async fn ensure_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = self.find_cart(user_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let fresh = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            items: Set(serde_json::json!([])),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match fresh.insert(&*self.db).await {
            Ok(created) => {
                debug!(user_id = %user_id, "Created empty cart");
                Ok(created)
            }
            // Lost a race with a concurrent first access; the unique index kept one cart.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_cart(user_id)
                .await?
                .ok_or_else(|| ServiceError::InternalError("cart vanished after insert".into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the whole line list and refreshes `updated_at`.
    async fn save(&self, cart: cart::Model, lines: &[CartLine]) -> Result<(), ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.items = Set(cart::encode_lines(lines).map_err(corrupt)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    async fn product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Joins lines with current products; lines whose product is gone are dropped.
    async fn present(&self, lines: Vec<CartLine>) -> Result<CartView, ServiceError> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let mut products: HashMap<Uuid, product::Model> = if ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let items: Vec<CartItemView> = lines
            .into_iter()
            .filter_map(|line| {
                products.remove(&line.product_id).map(|product| CartItemView {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    product: product.into(),
                })
            })
            .collect();

        Ok(CartView {
            total: items.len(),
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.ensure_cart(user_id).await?;
        let lines = cart.lines().map_err(corrupt)?;
        self.present(lines).await
    }

    #[instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        request: AddToCartRequest,
    ) -> Result<CartView, ServiceError> {
        request.validate()?;

        let product = self.product(request.product_id).await?;
        if request.quantity > product.stock {
            return Err(insufficient_stock());
        }

        let cart = self.ensure_cart(user_id).await?;
        let mut lines = cart.lines().map_err(corrupt)?;
        merge_into(&mut lines, product.id, request.quantity)?;
        self.save(cart, &lines).await?;

        info!(user_id = %user_id, product_id = %product.id, "Item added to cart");
        self.present(lines).await
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        request: UpdateCartItemRequest,
    ) -> Result<CartView, ServiceError> {
        request.validate()?;

        let cart = self.find_cart(user_id).await?.ok_or_else(cart_not_found)?;
        let mut lines = cart.lines().map_err(corrupt)?;
        let line = lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
            .ok_or_else(line_not_found)?;

        let product = self.product(product_id).await?;
        if request.quantity > product.stock {
            return Err(insufficient_stock());
        }
        line.quantity = request.quantity;

        self.save(cart, &lines).await?;
        info!(user_id = %user_id, product_id = %product_id, "Cart item updated");
        self.present(lines).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(user_id).await?.ok_or_else(cart_not_found)?;
        let mut lines = cart.lines().map_err(corrupt)?;
        let before = lines.len();
        lines.retain(|line| line.product_id != product_id);
        if lines.len() == before {
            return Err(line_not_found());
        }

        self.save(cart, &lines).await?;
        info!(user_id = %user_id, product_id = %product_id, "Item removed from cart");
        self.present(lines).await
    }

    /// Deletes the cart document; the next read starts from an empty cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        Cart::delete_many()
            .filter(cart::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        info!(user_id = %user_id, "Cart cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_into_sums_existing_line() {
        let p = Uuid::new_v4();
        let q = Uuid::new_v4();
        let mut lines = Vec::new();

        merge_into(&mut lines, p, 2).unwrap();
        merge_into(&mut lines, q, 1).unwrap();
        merge_into(&mut lines, p, 3).unwrap();

        assert_eq!(
            lines,
            vec![
                CartLine {
                    product_id: p,
                    quantity: 5
                },
                CartLine {
                    product_id: q,
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn merge_into_rejects_overflowing_quantity() {
        let p = Uuid::new_v4();
        let mut lines = vec![CartLine {
            product_id: p,
            quantity: i32::MAX,
        }];

        assert!(merge_into(&mut lines, p, 1).is_err());
        assert_eq!(lines[0].quantity, i32::MAX);
    }

    #[test]
    fn add_request_rejects_non_positive_quantity() {
        let request = AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(request.validate().is_err());
    }
}
