//! # Envoy Bus Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | Immediate dispatch | Fan-out to N listeners on one channel |
//! | Deferred flush | Draining one generation of N queued payloads |
//! | Request | Responder lookup and invocation |
//! | Registration | Add then remove a listener |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use envoy_bus::{DeliveryMode, EventManager, Listener, MemorySink};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Moved {
    x: f32,
    y: f32,
}

fn quiet_bus() -> EventManager {
    EventManager::builder()
        .sink(Rc::new(MemorySink::new()))
        .build()
}

fn summing_listeners(bus: &EventManager, count: usize, total: &Rc<Cell<f32>>) -> Vec<Listener<Moved>> {
    (0..count)
        .map(|_| {
            let total = Rc::clone(total);
            let listener = Listener::new(move |m: &Moved| {
                total.set(total.get() + m.x + m.y);
                Ok(())
            });
            bus.add_listener(&listener);
            listener
        })
        .collect()
}

// ============================================================================
// Immediate dispatch
// ============================================================================

fn bench_dispatch_now(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch-now");
    group.measurement_time(Duration::from_secs(5));

    for listeners in [1, 8, 64] {
        let bus = quiet_bus();
        let total = Rc::new(Cell::new(0.0));
        let _handles = summing_listeners(&bus, listeners, &total);

        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, _| {
                b.iter(|| {
                    bus.dispatch_with(black_box(Moved { x: 1.0, y: 2.0 }), DeliveryMode::Now)
                        .ok();
                })
            },
        );
        black_box(total.get());
    }

    group.finish();
}

// ============================================================================
// Deferred flush
// ============================================================================

fn bench_flush_deferred(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush-deferred");
    group.measurement_time(Duration::from_secs(5));

    for queued in [16, 256, 4096] {
        let bus = quiet_bus();
        let total = Rc::new(Cell::new(0.0));
        let _handles = summing_listeners(&bus, 4, &total);

        group.throughput(Throughput::Elements(queued as u64));
        group.bench_with_input(BenchmarkId::new("queued", queued), &queued, |b, &queued| {
            b.iter(|| {
                for i in 0..queued {
                    bus.dispatch_with(
                        Moved {
                            x: i as f32,
                            y: 0.5,
                        },
                        DeliveryMode::NextTick,
                    )
                    .ok();
                }
                black_box(bus.flush_deferred().ok())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Responders
// ============================================================================

fn bench_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("request");

    let bus = quiet_bus();
    bus.add_responder(|id: u32| id.wrapping_mul(31));
    bus.add_unit_responder(|| 0.75f32);

    group.bench_function("with_argument", |b| {
        b.iter(|| black_box(bus.request::<u32, u32>(black_box(7)).ok()))
    });
    group.bench_function("without_argument", |b| {
        b.iter(|| black_box(bus.request_unit::<f32>().ok()))
    });
    group.bench_function("not_found", |b| {
        b.iter(|| black_box(bus.request::<u64, u32>(black_box(7)).is_err()))
    });

    group.finish();
}

// ============================================================================
// Registration churn
// ============================================================================

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    for existing in [0, 32, 256] {
        let bus = quiet_bus();
        let total = Rc::new(Cell::new(0.0));
        let _handles = summing_listeners(&bus, existing, &total);
        let churn = Listener::<Moved>::new(|_| Ok(()));

        group.bench_with_input(
            BenchmarkId::new("add_remove", existing),
            &existing,
            |b, _| {
                b.iter(|| {
                    bus.add_listener(&churn);
                    black_box(bus.remove_listener(&churn))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch_now,
    bench_flush_deferred,
    bench_request,
    bench_registration
);
criterion_main!(benches);
