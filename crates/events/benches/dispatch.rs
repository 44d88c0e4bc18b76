use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use eventter_events::{ChannelTyping, Event, EventManager, Receiver, RegistryConfig};

struct Sample {
    value: u64,
}
impl Event for Sample {}

struct Accumulator {
    total: u64,
}
impl Receiver for Accumulator {}

impl Accumulator {
    fn on_sample(&mut self, sample: &mut Sample) {
        self.total = self.total.wrapping_add(sample.value);
    }
}

/// Fan-out cost of one notify with `n` handle subscribers and `n` receivers.
fn bench_notify_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_fan_out");

    for n in [1usize, 16, 256] {
        let manager = EventManager::new();
        let sink = Rc::new(Cell::new(0u64));
        let receivers: Vec<_> = (0..n)
            .map(|_| Rc::new(RefCell::new(Accumulator { total: 0 })))
            .collect();

        for receiver in &receivers {
            manager
                .subscribe_receiver("sample", receiver, Accumulator::on_sample)
                .unwrap();
            let sink = sink.clone();
            manager
                .subscribe("sample", move |s: &mut Sample| sink.set(sink.get().wrapping_add(s.value)))
                .unwrap();
        }

        group.throughput(Throughput::Elements((2 * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let mut sample = Sample { value: 1 };
            b.iter(|| black_box(manager.notify("sample", &mut sample).unwrap()));
        });
    }

    group.finish();
}

/// Subscribe + unsubscribe churn on a busy name.
fn bench_subscription_churn(c: &mut Criterion) {
    let manager = EventManager::with_config(
        RegistryConfig::default().with_channel_typing(ChannelTyping::Shared),
    );
    for _ in 0..128 {
        manager.subscribe("sample", |_: &mut Sample| {}).unwrap();
    }

    c.bench_function("subscribe_unsubscribe", |b| {
        b.iter(|| {
            let handle = manager.subscribe("sample", |_: &mut Sample| {}).unwrap();
            manager.unsubscribe("sample", black_box(handle));
        });
    });
}

/// Publishing to a name nobody listens to.
fn bench_notify_without_subscribers(c: &mut Criterion) {
    let manager = EventManager::new();
    c.bench_function("notify_no_subscribers", |b| {
        let mut sample = Sample { value: 1 };
        b.iter(|| black_box(manager.notify("unknown", &mut sample).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_notify_fan_out,
    bench_subscription_churn,
    bench_notify_without_subscribers
);
criterion_main!(benches);
