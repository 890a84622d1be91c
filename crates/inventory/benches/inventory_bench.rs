use common::OrderNo;
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{InventoryState, ReservationLine, ReservationManager};
use outbox::InMemoryUnitOfWork;

fn bench_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("inventory/try_reserve", |b| {
        let manager = ReservationManager::new(InMemoryUnitOfWork::new(InventoryState::default()));
        rt.block_on(manager.seed("SKU-BENCH", u32::MAX));
        let lines = vec![ReservationLine::new("SKU-BENCH", 1)];
        let mut n = 0u64;

        b.iter(|| {
            n += 1;
            let order = OrderNo::new(format!("ORD-{n}"));
            rt.block_on(async {
                manager.try_reserve(&order, &lines).await.unwrap();
            });
        });
    });
}

fn bench_reserve_cancel_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("inventory/reserve_then_cancel", |b| {
        let manager = ReservationManager::new(InMemoryUnitOfWork::new(InventoryState::default()));
        rt.block_on(manager.seed("SKU-BENCH", 1000));
        let lines = vec![ReservationLine::new("SKU-BENCH", 1)];
        let order = OrderNo::new("ORD-CYCLE");

        b.iter(|| {
            rt.block_on(async {
                manager.try_reserve(&order, &lines).await.unwrap();
                manager.cancel(&order).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_reserve, bench_reserve_cancel_cycle);
criterion_main!(benches);
