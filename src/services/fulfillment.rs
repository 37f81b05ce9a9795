//! Post-placement order handling: reads, status changes and the delivery workflow.

use crate::{
    auth::Principal,
    db::StoreHandle,
    entities::{order, user, Order, OrderStatus, User, UserRole},
    errors::ServiceError,
    services::{
        order_status::ensure_transition,
        orders::{present_orders, OrderView},
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

fn order_not_found() -> ServiceError {
    ServiceError::NotFound("Order not found".to_string())
}

fn order_changed(order_id: Uuid) -> ServiceError {
    ServiceError::Conflict(format!("order {} changed concurrently, retry", order_id))
}

async fn reload<C: ConnectionTrait>(db: &C, order_id: Uuid) -> Result<order::Model, ServiceError> {
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(order_not_found)
}

async fn present_one(
    db: &sea_orm::DatabaseConnection,
    model: order::Model,
) -> Result<OrderView, ServiceError> {
    present_orders(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::InternalError("order view missing".to_string()))
}

#[derive(Clone)]
pub struct FulfillmentService {
    db: StoreHandle,
}

impl FulfillmentService {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    /// Orders placed by `user_id`, newest first.
    #[instrument(skip(self))]
    pub async fn list_mine(&self, user_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        present_orders(&*self.db, orders).await
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        present_orders(&*self.db, orders).await
    }

    /// Fetches one order. Non-admin callers only ever match their own orders.
    #[instrument(skip(self, requester), fields(requester = %requester.user_id))]
    pub async fn get_one(
        &self,
        order_id: Uuid,
        requester: &Principal,
    ) -> Result<OrderView, ServiceError> {
        let mut query = Order::find_by_id(order_id);
        if !requester.has_role(UserRole::Admin) {
            query = query.filter(order::Column::UserId.eq(requester.user_id));
        }

        let model = query.one(&*self.db).await?.ok_or_else(order_not_found)?;
        present_one(&self.db, model).await
    }

    /// Moves an order along the transition table.
    ///
    /// `assigned` is only reachable through [`FulfillmentService::assign_to_agent`],
    /// which also records the agent.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderView, ServiceError> {
        if status == OrderStatus::Assigned {
            return Err(ServiceError::InvalidInput(
                "orders are assigned through the assignment endpoint".to_string(),
            ));
        }

        let previous = reload(&*self.db, order_id).await?.status;
        let updated = self.transition_from(order_id, previous, status).await?;
        info!(order_id = %order_id, from = %previous, to = %status, "Order status updated");
        present_one(&self.db, updated).await
    }

    /// Moves an order from `expected` to `next` only if it is still in `expected`.
    ///
    /// The status check and the write are one conditional UPDATE, so a concurrent
    /// change in between makes this fail instead of overwriting it.
    #[instrument(skip(self))]
    pub async fn transition_from(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        ensure_transition(expected, next)?;

        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(next))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(expected))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(order_changed(order_id));
        }

        reload(&*self.db, order_id).await
    }

    /// Assigns a pending order, or re-assigns an assigned one, to an active delivery agent.
    #[instrument(skip(self))]
    pub async fn assign_to_agent(
        &self,
        order_id: Uuid,
        agent_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let txn = self.db.begin().await?;

        User::find_by_id(agent_id)
            .filter(user::Column::Role.eq(UserRole::Delivery))
            .filter(user::Column::IsActive.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery agent not found".to_string()))?;

        let existing = reload(&txn, order_id).await?;
        if existing.status != OrderStatus::Assigned {
            ensure_transition(existing.status, OrderStatus::Assigned)?;
        }

        let result = Order::update_many()
            .col_expr(order::Column::DeliveryAgentId, Expr::value(Some(agent_id)))
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Assigned))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(existing.status))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(order_changed(order_id));
        }
        let updated = reload(&txn, order_id).await?;
        txn.commit().await?;

        info!(order_id = %order_id, agent_id = %agent_id, "Order assigned to delivery agent");
        present_one(&self.db, updated).await
    }

    /// Orders currently or previously assigned to `agent_id`, newest first.
    #[instrument(skip(self))]
    pub async fn list_assigned(&self, agent_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::DeliveryAgentId.eq(agent_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        present_orders(&*self.db, orders).await
    }

    /// Marks an order delivered. Only the assigned agent can, and only while it is assigned.
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        order_id: Uuid,
        agent_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Delivered))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::DeliveryAgentId.eq(agent_id))
            .filter(order::Column::Status.eq(OrderStatus::Assigned))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(
                "Order not found or not assigned to you".to_string(),
            ));
        }
        let updated = reload(&*self.db, order_id).await?;

        info!(order_id = %order_id, agent_id = %agent_id, "Order marked as delivered");
        present_one(&self.db, updated).await
    }
}
