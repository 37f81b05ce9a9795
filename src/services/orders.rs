//! Order placement.
//!
//! Placing an order reads every referenced product once, checks stock and prices the
//! lines from that same read, then applies three writes as one transaction: insert the
//! order, decrement stock per line, delete the caller's cart. Either all three become
//! visible or none do.
//!
//! With [`StockGuard::Conditional`] each decrement only matches rows that still hold
//! enough stock, so two checkouts racing for the last unit cannot both commit.

use crate::{
    config::StockGuard,
    db::StoreHandle,
    entities::{cart, order, product, Cart, OrderLine, OrderStatus, Product},
    errors::ServiceError,
    services::catalog::ProductView,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// A requested (product, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<LineRequest>,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
}

/// Order line as returned to clients: the stored snapshot plus the product as it is now.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLineView>,
    /// Fixed at placement; never recomputed from the live product join.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collapses repeated products into one line, summing quantities. First occurrence wins
/// the position. A summed quantity that does not fit an `i32` is rejected.
pub fn merge_lines(lines: &[LineRequest]) -> Result<Vec<LineRequest>, ServiceError> {
    let mut merged: Vec<LineRequest> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(lines.len());

    for line in lines {
        match index.get(&line.product_id) {
            Some(&i) => {
                merged[i].quantity = merged[i]
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(quantity_too_large)?;
            }
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(*line);
            }
        }
    }

    Ok(merged)
}

pub(crate) fn quantity_too_large() -> ServiceError {
    ServiceError::InvalidInput("quantity too large".to_string())
}

/// Sum of unit price times quantity.
pub fn order_total(lines: &[OrderLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum()
}

fn store_failure(err: DbErr) -> ServiceError {
    error!(error = %err, "order transaction store failure");
    ServiceError::InternalError(format!("order transaction failed: {}", err))
}

/// Joins each order line with the current product record.
pub(crate) async fn present_orders<C>(
    db: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderView>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut decoded = Vec::with_capacity(orders.len());
    for model in orders {
        let lines = model.lines().map_err(|e| {
            ServiceError::InternalError(format!("corrupt line items on order {}: {}", model.id, e))
        })?;
        decoded.push((model, lines));
    }

    let mut ids: Vec<Uuid> = decoded
        .iter()
        .flat_map(|(_, lines)| lines.iter().map(|l| l.product_id))
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let products: HashMap<Uuid, product::Model> = if ids.is_empty() {
        HashMap::new()
    } else {
        Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    Ok(decoded
        .into_iter()
        .map(|(model, lines)| OrderView {
            id: model.id,
            user_id: model.user_id,
            items: lines
                .into_iter()
                .map(|line| OrderLineView {
                    product: products.get(&line.product_id).cloned().map(ProductView::from),
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    title: line.title,
                })
                .collect(),
            total: model.total,
            status: model.status,
            address: model.address,
            assigned_to: model.delivery_agent_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
        .collect())
}

#[derive(Clone)]
pub struct OrderService {
    db: StoreHandle,
    stock_guard: StockGuard,
}

impl OrderService {
    pub fn new(db: StoreHandle, stock_guard: StockGuard) -> Self {
        Self { db, stock_guard }
    }

    /// Places an order for `user_id` and clears their cart.
    #[instrument(skip(self, request), fields(user_id = %user_id, lines = request.items.len()))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        request: PlaceOrderRequest,
    ) -> Result<OrderView, ServiceError> {
        request.validate()?;

        let address = request.address.trim();
        if address.is_empty() {
            return Err(ServiceError::InvalidInput("address is required".to_string()));
        }
        if let Some(bad) = request.items.iter().find(|line| line.quantity < 1) {
            return Err(ServiceError::InvalidInput(format!(
                "quantity must be at least 1 for product {}",
                bad.product_id
            )));
        }

        let requested = merge_lines(&request.items)?;
        let priced = match self.price_lines(&requested).await {
            Ok(lines) => lines,
            Err(e) => {
                counter!("storefront.orders.rejected", 1);
                info!(user_id = %user_id, reason = %e, "order rejected during stock check");
                return Err(e);
            }
        };

        let order = self.commit_priced(user_id, priced, address).await?;
        let mut views = present_orders(&*self.db, vec![order]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("placed order vanished".to_string()))
    }

    /// Reads each product once, checking existence and stock and snapshotting the price.
    async fn price_lines(&self, requested: &[LineRequest]) -> Result<Vec<OrderLine>, ServiceError> {
        let ids: Vec<Uuid> = requested.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut found = Vec::with_capacity(requested.len());
        for line in requested {
            let product = products.get(&line.product_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!("product not found: {}", line.product_id))
            })?;
            found.push((product, line.quantity));
        }

        // Every product exists; now the first short line aborts the order.
        if let Some((product, _)) = found.iter().find(|(p, quantity)| p.stock < *quantity) {
            return Err(ServiceError::InvalidInput(format!(
                "insufficient stock for {}",
                product.title
            )));
        }

        let lines = found
            .into_iter()
            .map(|(product, quantity)| OrderLine {
                product_id: product.id,
                quantity,
                unit_price: product.price,
                title: product.title.clone(),
            })
            .collect();

        Ok(lines)
    }

    /// Commits already-priced lines as one atomic unit.
    ///
    /// The lines are trusted as priced; stock is only re-checked by the conditional
    /// decrement. Any failure rolls the whole unit back.
    #[instrument(skip(self, lines, address), fields(user_id = %user_id))]
    pub async fn commit_priced(
        &self,
        user_id: Uuid,
        lines: Vec<OrderLine>,
        address: &str,
    ) -> Result<order::Model, ServiceError> {
        let total = order_total(&lines);
        let txn = self.db.begin().await.map_err(store_failure)?;

        match apply_order(&txn, self.stock_guard, user_id, &lines, total, address).await {
            Ok(order) => {
                txn.commit().await.map_err(store_failure)?;
                counter!("storefront.orders.placed", 1);
                info!(order_id = %order.id, user_id = %user_id, total = %total, "Order placed");
                Ok(order)
            }
            Err(e) => {
                if let Err(rb) = txn.rollback().await {
                    warn!(error = %rb, "rollback after failed order placement also failed");
                }
                counter!("storefront.orders.rolled_back", 1);
                warn!(user_id = %user_id, error = %e, "order placement rolled back");
                Err(e)
            }
        }
    }
}

async fn apply_order(
    txn: &DatabaseTransaction,
    guard: StockGuard,
    user_id: Uuid,
    lines: &[OrderLine],
    total: Decimal,
    address: &str,
) -> Result<order::Model, ServiceError> {
    let now = Utc::now();
    let items = serde_json::to_value(lines)
        .map_err(|e| ServiceError::InternalError(format!("encode order lines: {}", e)))?;

    let order = order::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        items: Set(items),
        total: Set(total),
        status: Set(OrderStatus::Pending),
        delivery_agent_id: Set(None),
        address: Set(address.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await
    .map_err(store_failure)?;

    for line in lines {
        let mut decrement = Product::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(now))
            .filter(product::Column::Id.eq(line.product_id));
        if guard == StockGuard::Conditional {
            decrement = decrement.filter(product::Column::Stock.gte(line.quantity));
        }

        let result = decrement.exec(txn).await.map_err(store_failure)?;
        if result.rows_affected == 0 {
            let still_exists = Product::find_by_id(line.product_id)
                .one(txn)
                .await
                .map_err(store_failure)?
                .is_some();
            return Err(if still_exists {
                ServiceError::InvalidInput(format!("insufficient stock for {}", line.title))
            } else {
                ServiceError::InvalidInput(format!("product not found: {}", line.product_id))
            });
        }
    }

    Cart::delete_many()
        .filter(cart::Column::UserId.eq(user_id))
        .exec(txn)
        .await
        .map_err(store_failure)?;

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(id: Uuid, quantity: i32) -> LineRequest {
        LineRequest {
            product_id: id,
            quantity,
        }
    }

    #[test]
    fn merge_sums_duplicates_and_keeps_first_position() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let merged = merge_lines(&[line(a, 2), line(b, 1), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![line(a, 5), line(b, 1)]);
    }

    #[test]
    fn merge_rejects_quantities_that_overflow() {
        let a = Uuid::new_v4();

        let err = merge_lines(&[line(a, i32::MAX), line(a, 5)]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(ref msg) if msg == "quantity too large"));
        assert_eq!(merge_lines(&[line(a, i32::MAX)]).unwrap(), vec![line(a, i32::MAX)]);
    }

    #[test]
    fn total_multiplies_price_by_quantity() {
        let lines = vec![
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: dec!(12.50),
                title: "Mug".into(),
            },
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 3,
                unit_price: dec!(7.25),
                title: "Coaster".into(),
            },
        ];
        assert_eq!(order_total(&lines), dec!(46.75));
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn order_view_serializes_amounts_as_numbers() {
        let view = OrderView {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            items: vec![],
            total: dec!(46.75),
            status: OrderStatus::Pending,
            address: "1 Main St".into(),
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["total"], serde_json::json!(46.75));
        assert_eq!(json["status"], "pending");
        assert!(json.get("assignedTo").is_none());
    }
}
