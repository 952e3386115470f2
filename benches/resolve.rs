use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use gallery_auth::config::UserConfig;
use gallery_auth::identity::{
    resolve_authority, CallbackRegistry, ChangeCallback, Host, SessionDeps, StaticAuthGateway, Suppress, TracingNotifier,
    UserSession, WidgetNode,
};
use gallery_auth::storage::KvSessionStore;

fn deps() -> SessionDeps {
    SessionDeps::new(
        Arc::new(StaticAuthGateway::single_user("amy")),
        Arc::new(KvSessionStore::default()),
        Arc::new(TracingNotifier),
    )
}

/// Chain of `depth` nodes under a root that hosts the authority.
fn chain(depth: usize) -> Vec<Arc<WidgetNode>> {
    let root = WidgetNode::root("root");
    let root_host = root.as_host();
    let user = UserSession::new(UserConfig::default(), deps(), Some(&root_host));
    root.attach_user(user);
    let mut nodes = vec![root];
    for i in 0..depth {
        let parent = nodes[nodes.len() - 1].as_host();
        nodes.push(WidgetNode::child(format!("n{}", i), &parent));
    }
    nodes
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_authority");
    let realm = UserConfig::default().realm();
    for &depth in &[4usize, 64, 1024] {
        let nodes = chain(depth);
        let leaf: Arc<dyn Host> = nodes[nodes.len() - 1].as_host();
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("walk", depth), &depth, |b, _| {
            b.iter(|| criterion::black_box(resolve_authority(Some(leaf.clone()), &realm)));
        });
        group.bench_with_input(BenchmarkId::new("new_delegate", depth), &depth, |b, _| {
            b.iter(|| criterion::black_box(UserSession::new(UserConfig::default(), deps(), Some(&leaf))));
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("callback_fan_out");
    for &n in &[1usize, 16, 256] {
        let registry = CallbackRegistry::default();
        let callbacks: Vec<ChangeCallback> = (0..n).map(|_| ChangeCallback::from_fn(|v| { criterion::black_box(v); })).collect();
        for cb in &callbacks { registry.register(cb.clone()); }
        let skip = Suppress::Only(callbacks[0].clone());
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("all", n), &n, |b, _| {
            b.iter(|| registry.fan_out(true, &Suppress::None));
        });
        group.bench_with_input(BenchmarkId::new("skip_one", n), &n, |b, _| {
            b.iter(|| registry.fan_out(false, &skip));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_fan_out);
criterion_main!(benches);
