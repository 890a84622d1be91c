use common::{CustomerId, IdempotencyKey, Money, OrderNo};
use event_bus::{OrderLine, OrderPlaced};

use crate::error::{ChoreographyError, Result};
use crate::order::Order;
use crate::repository::OrderUow;

/// Command to place an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_no: OrderNo,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderLine>,
    pub idempotency_key: IdempotencyKey,
}

/// Entry point of the saga.
///
/// `place_order` commits the order row and its `OrderPlaced` outbox record
/// in one transaction, then returns. The caller gets acknowledgment of
/// order acceptance, not of saga completion: reservation and payment
/// outcomes propagate asynchronously.
pub struct CheckoutService {
    uow: OrderUow,
}

impl CheckoutService {
    /// Creates a checkout service over the order unit of work.
    pub fn new(uow: OrderUow) -> Self {
        Self { uow }
    }

    /// Accepts an order and stages its `OrderPlaced` event atomically.
    ///
    /// Re-submitting an existing order number returns the stored order
    /// unchanged and stages nothing.
    #[tracing::instrument(skip(self, cmd), fields(order_no = %cmd.order_no))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order> {
        let order = self
            .uow
            .transact::<_, ChoreographyError>(|state, batch| {
                if let Some(existing) = state.orders.get(&cmd.order_no) {
                    tracing::debug!(order_no = %cmd.order_no, "duplicate checkout, returning stored order");
                    return Ok(existing.clone());
                }

                let total: Money = cmd.items.iter().map(OrderLine::total).sum();
                let order = Order::new(
                    cmd.order_no.clone(),
                    cmd.customer_id,
                    cmd.items.clone(),
                    total,
                );

                batch.add_event(&OrderPlaced {
                    order_no: order.order_no.clone(),
                    customer_id: order.customer_id,
                    total: order.total,
                    items: order.items.clone(),
                    idempotency_key: cmd.idempotency_key.clone(),
                })?;
                state.orders.insert(order.order_no.clone(), order.clone());
                Ok(order)
            })
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_no = %order.order_no, total = %order.total, "order accepted");
        Ok(order)
    }
}
