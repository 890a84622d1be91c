//! Explicit construction and wiring of the whole choreography.

use std::sync::Arc;
use std::time::Duration;

use event_bus::{
    EventBus, InMemoryEventBus, IntegrationEvent, InventoryReserved, OrderPlaced, PaymentCompleted,
};
use inventory::{InventoryState, InventoryUow, ReservationManager};
use outbox::{DeadLetterStore, InMemoryDeadLetterStore, OutboxRelay, RelayConfig};
use payment::{
    FakeGatewayProvider, PaymentMethod, PaymentProcessor, PaymentState, PaymentUow,
    ProviderRegistry,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::checkout::CheckoutService;
use crate::error::Result;
use crate::handlers::{InventoryReservedHandler, PaymentCompletedHandler};
use crate::notify::{NotificationSender, RecordingNotificationSender};
use crate::repository::{InMemoryOrderRepository, OrderBook, OrderRepository, OrderUow};

/// The assembled choreography: three services, their outbox relays, and
/// the bus subscriptions that make them react to each other.
///
/// Every collaborator is built and passed in here explicitly; there is no
/// ambient container to look things up in.
pub struct Fulfillment {
    pub bus: InMemoryEventBus,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub inventory: Arc<ReservationManager>,
    pub payments: Arc<PaymentProcessor>,
    pub gateway: Arc<FakeGatewayProvider>,
    pub notifier: Arc<RecordingNotificationSender>,
    pub dead_letters: Arc<InMemoryDeadLetterStore>,
    order_relay: Arc<OutboxRelay<OrderUow, InMemoryEventBus>>,
    inventory_relay: Arc<OutboxRelay<InventoryUow, InMemoryEventBus>>,
    payment_relay: Arc<OutboxRelay<PaymentUow, InMemoryEventBus>>,
}

/// Running relay tasks plus the switches to stop them.
pub struct RelayHandles {
    handles: Vec<JoinHandle<()>>,
    shutdowns: Vec<oneshot::Sender<()>>,
}

impl RelayHandles {
    /// Signals every relay to stop and waits for the tasks to finish.
    pub async fn shutdown(self) {
        for tx in self.shutdowns {
            let _ = tx.send(());
        }
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

impl Fulfillment {
    /// Builds the full in-memory choreography with a fake payment gateway.
    pub async fn wire() -> Self {
        let bus = InMemoryEventBus::new();
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new());

        let order_uow = OrderUow::new(OrderBook::default());
        let orders = Arc::new(InMemoryOrderRepository::new(order_uow.clone()));
        let checkout = Arc::new(CheckoutService::new(order_uow.clone()));

        let inventory = Arc::new(ReservationManager::new(InventoryUow::new(
            InventoryState::default(),
        )));

        let gateway = Arc::new(FakeGatewayProvider::new());
        let registry =
            ProviderRegistry::new().register(PaymentMethod::FakeGateway, gateway.clone());
        let payments = Arc::new(PaymentProcessor::new(
            PaymentUow::new(PaymentState::default()),
            registry,
        ));

        let notifier = Arc::new(RecordingNotificationSender::new());
        let orders_dyn: Arc<dyn OrderRepository> = orders.clone();
        let notifier_dyn: Arc<dyn NotificationSender> = notifier.clone();

        // Both services react to OrderPlaced independently.
        bus.subscribe(
            OrderPlaced::EVENT_TYPE,
            Arc::new(inventory::OrderPlacedHandler::new(Arc::clone(&inventory))),
        )
        .await;
        bus.subscribe(
            OrderPlaced::EVENT_TYPE,
            Arc::new(payment::OrderPlacedHandler::new(
                Arc::clone(&payments),
                PaymentMethod::FakeGateway,
            )),
        )
        .await;
        bus.subscribe(
            InventoryReserved::EVENT_TYPE,
            Arc::new(InventoryReservedHandler::new(
                Arc::clone(&orders_dyn),
                Arc::clone(&payments),
                Arc::clone(&notifier_dyn),
            )),
        )
        .await;
        bus.subscribe(
            PaymentCompleted::EVENT_TYPE,
            Arc::new(PaymentCompletedHandler::new(
                Arc::clone(&orders_dyn),
                Arc::clone(&inventory),
                Arc::clone(&payments),
                Arc::clone(&notifier_dyn),
            )),
        )
        .await;

        let config = RelayConfig {
            poll_interval: Duration::from_millis(10),
            ..RelayConfig::default()
        };
        let order_relay = Arc::new(OutboxRelay::with_config(
            order_uow,
            bus.clone(),
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterStore>,
            config.clone(),
        ));
        let inventory_relay = Arc::new(OutboxRelay::with_config(
            inventory.uow().clone(),
            bus.clone(),
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterStore>,
            config.clone(),
        ));
        let payment_relay = Arc::new(OutboxRelay::with_config(
            payments.uow().clone(),
            bus.clone(),
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterStore>,
            config,
        ));

        Self {
            bus,
            checkout,
            orders,
            inventory,
            payments,
            gateway,
            notifier,
            dead_letters,
            order_relay,
            inventory_relay,
            payment_relay,
        }
    }

    /// Drains all three outboxes until no relay publishes anything more.
    ///
    /// Handlers react inline to published events and stage follow-up
    /// events in other outboxes, so draining repeats until the system is
    /// quiescent. Returns the number of records processed. Deterministic
    /// alternative to [`spawn_relays`](Self::spawn_relays) for tests.
    pub async fn drain_outboxes(&self) -> Result<usize> {
        let mut total = 0usize;

        // A transport failure round publishes nothing but leaves rows
        // pending; keep going until a fully quiet round.
        for _ in 0..16 {
            let order = self.order_relay.drain_once().await?;
            let inventory = self.inventory_relay.drain_once().await?;
            let payment = self.payment_relay.drain_once().await?;

            let round = order.published
                + order.dead_lettered
                + inventory.published
                + inventory.dead_lettered
                + payment.published
                + payment.dead_lettered;
            total += round;

            let failed =
                order.transport_failed || inventory.transport_failed || payment.transport_failed;
            if round == 0 && !failed {
                break;
            }
        }
        Ok(total)
    }

    /// Spawns the three relays as background tasks.
    pub fn spawn_relays(&self) -> RelayHandles {
        let mut handles = Vec::new();
        let mut shutdowns = Vec::new();

        let (tx, rx) = oneshot::channel();
        let relay = Arc::clone(&self.order_relay);
        handles.push(tokio::spawn(async move { relay.run(rx).await }));
        shutdowns.push(tx);

        let (tx, rx) = oneshot::channel();
        let relay = Arc::clone(&self.inventory_relay);
        handles.push(tokio::spawn(async move { relay.run(rx).await }));
        shutdowns.push(tx);

        let (tx, rx) = oneshot::channel();
        let relay = Arc::clone(&self.payment_relay);
        handles.push(tokio::spawn(async move { relay.run(rx).await }));
        shutdowns.push(tx);

        RelayHandles { handles, shutdowns }
    }
}
