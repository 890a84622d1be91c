use common::{KeyedLock, OrderNo, Sku};
use event_bus::InventoryReserved;

use crate::error::{InventoryError, Result};
use crate::item::InventoryItem;
use crate::reservation::{Reservation, ReservationLine};
use crate::store::InventoryUow;

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was reserved and the reservation persisted.
    Reserved,
    /// A reservation for this order already exists; nothing changed.
    AlreadyReserved,
    /// At least one line could not be covered; nothing changed.
    Rejected { reason: String },
}

impl ReserveOutcome {
    /// Returns true if a reservation exists after the call.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved | ReserveOutcome::AlreadyReserved)
    }

    /// Returns the rejection reason, if the attempt was rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            ReserveOutcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Outcome of a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Reserved stock was removed from hand.
    Confirmed,
    /// The reservation was already confirmed; nothing changed.
    AlreadyConfirmed,
    /// No reservation exists for the order; nothing changed.
    NoReservation,
}

/// Outcome of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Reserved stock was returned and the reservation removed.
    Released,
    /// No reservation exists for the order; nothing changed.
    NoReservation,
    /// The reservation is confirmed; cancellation is no longer valid.
    RejectedConfirmed,
}

/// Reserves, confirms and cancels stock idempotently per order number.
///
/// All three operations serialize per order via a keyed lock, so duplicate
/// deliveries racing each other cannot interleave on the same order. The
/// order number's uniqueness in the reservation table is what makes
/// `try_reserve` idempotent; no distributed coordination is involved.
pub struct ReservationManager {
    uow: InventoryUow,
    locks: KeyedLock,
}

impl ReservationManager {
    /// Creates a manager over the given unit of work.
    pub fn new(uow: InventoryUow) -> Self {
        Self {
            uow,
            locks: KeyedLock::new(),
        }
    }

    /// Returns the underlying unit of work (the service's outbox).
    pub fn uow(&self) -> &InventoryUow {
        &self.uow
    }

    /// Sets stock on hand for a SKU, creating the item if needed.
    pub async fn seed(&self, sku: impl Into<Sku>, quantity_on_hand: u32) {
        let sku = sku.into();
        self.uow
            .transact::<_, InventoryError>(|state, _| {
                state
                    .items
                    .entry(sku.clone())
                    .and_modify(|item| {
                        item.quantity_on_hand = quantity_on_hand;
                        item.audit.touch();
                    })
                    .or_insert_with(|| InventoryItem::new(sku.clone(), quantity_on_hand));
                Ok(())
            })
            .await
            .ok();
    }

    /// Returns a snapshot of one item's stock levels.
    pub async fn item(&self, sku: &Sku) -> Option<InventoryItem> {
        self.uow.read(|state| state.items.get(sku).cloned()).await
    }

    /// Returns the reservation held for an order, if any.
    pub async fn reservation(&self, order_no: &OrderNo) -> Option<Reservation> {
        self.uow
            .read(|state| state.reservations.get(order_no).cloned())
            .await
    }

    /// Attempts to reserve stock for every line of an order.
    ///
    /// Succeeds only if every line is fully available. A pre-existing
    /// reservation for the order is a no-op success. A short line rejects
    /// the whole attempt with reason `insufficient_stock:<sku>` and emits
    /// `InventoryReserved{success:false}`; success emits the positive
    /// event. Event and state change commit in the same transaction.
    #[tracing::instrument(skip(self, lines), fields(order_no = %order_no))]
    pub async fn try_reserve(
        &self,
        order_no: &OrderNo,
        lines: &[ReservationLine],
    ) -> Result<ReserveOutcome> {
        let _guard = self.locks.acquire(order_no.as_str()).await;

        let outcome = self
            .uow
            .transact::<_, InventoryError>(|state, batch| {
                if state.reservations.contains_key(order_no) {
                    return Ok(ReserveOutcome::AlreadyReserved);
                }

                for line in lines {
                    let available = state
                        .items
                        .get(&line.sku)
                        .map(InventoryItem::available)
                        .unwrap_or(0);
                    if available < line.quantity {
                        let reason = format!("insufficient_stock:{}", line.sku);
                        batch.add_event(&InventoryReserved {
                            order_no: order_no.clone(),
                            success: false,
                            reason: Some(reason.clone()),
                        })?;
                        return Ok(ReserveOutcome::Rejected { reason });
                    }
                }

                for line in lines {
                    let item = state
                        .items
                        .get_mut(&line.sku)
                        .ok_or_else(|| InventoryError::UnknownSku(line.sku.clone()))?;
                    item.reserve(line.quantity)?;
                }

                state.reservations.insert(
                    order_no.clone(),
                    Reservation::new(order_no.clone(), lines.to_vec()),
                );
                batch.add_event(&InventoryReserved {
                    order_no: order_no.clone(),
                    success: true,
                    reason: None,
                })?;
                Ok(ReserveOutcome::Reserved)
            })
            .await?;

        match &outcome {
            ReserveOutcome::Reserved => {
                metrics::counter!("inventory_reservations_total").increment(1);
                tracing::info!(%order_no, "stock reserved");
            }
            ReserveOutcome::AlreadyReserved => {
                tracing::debug!(%order_no, "duplicate reserve, no-op");
            }
            ReserveOutcome::Rejected { reason } => {
                metrics::counter!("inventory_rejections_total").increment(1);
                tracing::info!(%order_no, %reason, "reservation rejected");
            }
        }
        Ok(outcome)
    }

    /// Confirms an order's reservation, removing the stock from hand.
    ///
    /// Missing or already-confirmed reservations are anomaly-logged
    /// no-ops, not failures.
    #[tracing::instrument(skip(self), fields(order_no = %order_no))]
    pub async fn confirm(&self, order_no: &OrderNo) -> Result<ConfirmOutcome> {
        let _guard = self.locks.acquire(order_no.as_str()).await;

        let outcome = self
            .uow
            .transact::<_, InventoryError>(|state, _| {
                let lines = match state.reservations.get(order_no) {
                    None => return Ok(ConfirmOutcome::NoReservation),
                    Some(reservation) if reservation.confirmed => {
                        return Ok(ConfirmOutcome::AlreadyConfirmed);
                    }
                    Some(reservation) => reservation.lines.clone(),
                };

                for line in &lines {
                    let item = state
                        .items
                        .get_mut(&line.sku)
                        .ok_or_else(|| InventoryError::UnknownSku(line.sku.clone()))?;
                    item.confirm(line.quantity)?;
                }

                if let Some(reservation) = state.reservations.get_mut(order_no) {
                    reservation.confirmed = true;
                }
                Ok(ConfirmOutcome::Confirmed)
            })
            .await?;

        match outcome {
            ConfirmOutcome::Confirmed => {
                metrics::counter!("inventory_confirmations_total").increment(1);
                tracing::info!(%order_no, "reservation confirmed");
            }
            ConfirmOutcome::AlreadyConfirmed => {
                tracing::debug!(%order_no, "duplicate confirm, no-op");
            }
            ConfirmOutcome::NoReservation => {
                tracing::warn!(%order_no, "confirm for unknown reservation");
            }
        }
        Ok(outcome)
    }

    /// Cancels an order's reservation, returning the stock to available.
    ///
    /// Cancellation is only valid before confirmation: a confirmed
    /// reservation is a terminal state and requires a separate restock
    /// flow, so the attempt is rejected as a no-op.
    #[tracing::instrument(skip(self), fields(order_no = %order_no))]
    pub async fn cancel(&self, order_no: &OrderNo) -> Result<CancelOutcome> {
        let _guard = self.locks.acquire(order_no.as_str()).await;

        let outcome = self
            .uow
            .transact::<_, InventoryError>(|state, _| {
                let lines = match state.reservations.get(order_no) {
                    None => return Ok(CancelOutcome::NoReservation),
                    Some(reservation) if reservation.confirmed => {
                        return Ok(CancelOutcome::RejectedConfirmed);
                    }
                    Some(reservation) => reservation.lines.clone(),
                };

                for line in &lines {
                    let item = state
                        .items
                        .get_mut(&line.sku)
                        .ok_or_else(|| InventoryError::UnknownSku(line.sku.clone()))?;
                    item.release(line.quantity)?;
                }

                state.reservations.remove(order_no);
                Ok(CancelOutcome::Released)
            })
            .await?;

        match outcome {
            CancelOutcome::Released => {
                metrics::counter!("inventory_cancellations_total").increment(1);
                tracing::info!(%order_no, "reservation released");
            }
            CancelOutcome::NoReservation => {
                tracing::debug!(%order_no, "cancel with no reservation, no-op");
            }
            CancelOutcome::RejectedConfirmed => {
                tracing::warn!(%order_no, "cancel after confirm rejected");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InventoryState;
    use outbox::{InMemoryUnitOfWork, OutboxStore};

    async fn manager_with_stock(stock: &[(&str, u32)]) -> ReservationManager {
        let manager = ReservationManager::new(InMemoryUnitOfWork::new(InventoryState::default()));
        for (sku, on_hand) in stock {
            manager.seed(*sku, *on_hand).await;
        }
        manager
    }

    fn lines(wanted: &[(&str, u32)]) -> Vec<ReservationLine> {
        wanted
            .iter()
            .map(|(sku, qty)| ReservationLine::new(*sku, *qty))
            .collect()
    }

    #[tokio::test]
    async fn reserve_holds_stock_and_emits_event() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");

        let outcome = manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);

        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 2);
        assert_eq!(item.quantity_on_hand, 5);
        assert_eq!(manager.uow().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_reserve_is_noop() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        let order_lines = lines(&[("A", 2)]);

        manager.try_reserve(&order, &order_lines).await.unwrap();
        let second = manager.try_reserve(&order, &order_lines).await.unwrap();

        assert_eq!(second, ReserveOutcome::AlreadyReserved);
        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 2);
        // No second event for the duplicate.
        assert_eq!(manager.uow().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insufficient_stock_rejects_without_mutation() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");

        let outcome = manager
            .try_reserve(&order, &lines(&[("A", 6)]))
            .await
            .unwrap();

        assert_eq!(
            outcome.rejection_reason(),
            Some("insufficient_stock:A")
        );
        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 0);
        assert!(manager.reservation(&order).await.is_none());
        // The negative outcome is still announced.
        assert_eq!(manager.uow().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn short_second_line_rolls_back_entire_attempt() {
        let manager = manager_with_stock(&[("A", 5), ("B", 1)]).await;
        let order = OrderNo::new("ORD-100");

        let outcome = manager
            .try_reserve(&order, &lines(&[("A", 2), ("B", 3)]))
            .await
            .unwrap();

        assert_eq!(
            outcome.rejection_reason(),
            Some("insufficient_stock:B")
        );
        // Nothing was held for either SKU.
        assert_eq!(manager.item(&Sku::new("A")).await.unwrap().quantity_reserved, 0);
        assert_eq!(manager.item(&Sku::new("B")).await.unwrap().quantity_reserved, 0);
    }

    #[tokio::test]
    async fn unknown_sku_counts_as_no_stock() {
        let manager = manager_with_stock(&[]).await;
        let order = OrderNo::new("ORD-100");

        let outcome = manager
            .try_reserve(&order, &lines(&[("GHOST", 1)]))
            .await
            .unwrap();
        assert_eq!(
            outcome.rejection_reason(),
            Some("insufficient_stock:GHOST")
        );
    }

    #[tokio::test]
    async fn confirm_removes_stock_from_hand() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();

        let outcome = manager.confirm(&order).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);

        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_on_hand, 3);
        assert_eq!(item.quantity_reserved, 0);
        assert!(manager.reservation(&order).await.unwrap().confirmed);
    }

    #[tokio::test]
    async fn confirm_is_idempotent() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();

        manager.confirm(&order).await.unwrap();
        let second = manager.confirm(&order).await.unwrap();

        assert_eq!(second, ConfirmOutcome::AlreadyConfirmed);
        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_on_hand, 3);
        assert_eq!(item.quantity_reserved, 0);
    }

    #[tokio::test]
    async fn confirm_without_reservation_is_anomaly_noop() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let outcome = manager.confirm(&OrderNo::new("ORD-404")).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::NoReservation);
    }

    #[tokio::test]
    async fn cancel_returns_stock() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();

        let outcome = manager.cancel(&order).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Released);

        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 0);
        assert_eq!(item.quantity_on_hand, 5);
        assert!(manager.reservation(&order).await.is_none());
    }

    #[tokio::test]
    async fn cancel_after_confirm_is_rejected() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();
        manager.confirm(&order).await.unwrap();

        let outcome = manager.cancel(&order).await.unwrap();
        assert_eq!(outcome, CancelOutcome::RejectedConfirmed);

        // Stock levels unchanged by the rejected cancel.
        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_on_hand, 3);
        assert_eq!(item.quantity_reserved, 0);
    }

    #[tokio::test]
    async fn cancel_twice_is_noop() {
        let manager = manager_with_stock(&[("A", 5)]).await;
        let order = OrderNo::new("ORD-100");
        manager
            .try_reserve(&order, &lines(&[("A", 2)]))
            .await
            .unwrap();

        manager.cancel(&order).await.unwrap();
        let second = manager.cancel(&order).await.unwrap();
        assert_eq!(second, CancelOutcome::NoReservation);
    }
}
