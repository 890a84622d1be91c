use std::collections::HashMap;

use async_trait::async_trait;
use common::OrderNo;
use outbox::InMemoryUnitOfWork;

use crate::error::{ChoreographyError, Result};
use crate::order::{Order, OrderStatus};

/// The order service's table.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub orders: HashMap<OrderNo, Order>,
}

/// Unit of work over [`OrderBook`]; checkout commits the order row and its
/// `OrderPlaced` outbox record through this.
pub type OrderUow = InMemoryUnitOfWork<OrderBook>;

/// Whether an `update_status` call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The transition was valid and applied.
    Applied,
    /// The transition was invalid for the current state; nothing changed.
    Ignored,
}

/// Order persistence as the saga's collaborators see it.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists an order, replacing any previous row with the same number.
    async fn save(&self, order: Order) -> Result<()>;

    /// Moves an order to a new status if the transition is valid.
    ///
    /// Invalid transitions (redelivery, out-of-order events, terminal
    /// states) are ignored, not errors.
    async fn update_status(&self, order_no: &OrderNo, status: OrderStatus) -> Result<StatusChange>;

    /// Returns an order by number.
    async fn get(&self, order_no: &OrderNo) -> Result<Option<Order>>;
}

/// In-memory order repository over the order unit of work.
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    uow: OrderUow,
}

impl InMemoryOrderRepository {
    /// Creates a repository over the given unit of work.
    pub fn new(uow: OrderUow) -> Self {
        Self { uow }
    }

    /// Returns the underlying unit of work.
    pub fn uow(&self) -> &OrderUow {
        &self.uow
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> Result<()> {
        self.uow
            .transact::<_, ChoreographyError>(|state, _| {
                state.orders.insert(order.order_no.clone(), order.clone());
                Ok(())
            })
            .await
    }

    async fn update_status(&self, order_no: &OrderNo, status: OrderStatus) -> Result<StatusChange> {
        let change = self
            .uow
            .transact::<_, ChoreographyError>(|state, _| {
                let order = state
                    .orders
                    .get_mut(order_no)
                    .ok_or_else(|| ChoreographyError::OrderNotFound(order_no.clone()))?;

                if !order.status.can_transition_to(status) {
                    return Ok(StatusChange::Ignored);
                }
                order.status = status;
                order.audit.touch();
                Ok(StatusChange::Applied)
            })
            .await?;

        match change {
            StatusChange::Applied => {
                tracing::info!(%order_no, status = %status, "order status updated");
            }
            StatusChange::Ignored => {
                tracing::debug!(%order_no, status = %status, "status transition ignored");
            }
        }
        Ok(change)
    }

    async fn get(&self, order_no: &OrderNo) -> Result<Option<Order>> {
        Ok(self
            .uow
            .read(|state| state.orders.get(order_no).cloned())
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn order(order_no: &str) -> Order {
        Order::new(OrderNo::new(order_no), None, Vec::new(), Money::zero())
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemoryOrderRepository::new(OrderUow::new(OrderBook::default()));
        repo.save(order("ORD-1")).await.unwrap();

        let loaded = repo.get(&OrderNo::new("ORD-1")).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn valid_transition_is_applied() {
        let repo = InMemoryOrderRepository::new(OrderUow::new(OrderBook::default()));
        repo.save(order("ORD-1")).await.unwrap();

        let change = repo
            .update_status(&OrderNo::new("ORD-1"), OrderStatus::Reserved)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::Applied);
    }

    #[tokio::test]
    async fn invalid_transition_is_ignored() {
        let repo = InMemoryOrderRepository::new(OrderUow::new(OrderBook::default()));
        repo.save(order("ORD-1")).await.unwrap();
        repo.update_status(&OrderNo::new("ORD-1"), OrderStatus::Cancelled)
            .await
            .unwrap();

        let change = repo
            .update_status(&OrderNo::new("ORD-1"), OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::Ignored);

        let loaded = repo.get(&OrderNo::new("ORD-1")).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn update_of_unknown_order_is_an_error() {
        let repo = InMemoryOrderRepository::new(OrderUow::new(OrderBook::default()));
        let result = repo
            .update_status(&OrderNo::new("ORD-404"), OrderStatus::Paid)
            .await;
        assert!(matches!(result, Err(ChoreographyError::OrderNotFound(_))));
    }
}
