use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use karp::config::KarpConfig;
use karp::plugins::PluginRegistry;
use karp::schema::ResourceConfig;
use karp::testing::{municipalities_config, municipalities_entries, places_config, TestEnv};

fn make_place(code: u64) -> Value {
    let mut place = json!({
        "code": code,
        "name": format!("Plats {}", code),
        "population": code * 37 % 10_000,
        "area": code * 113 % 20_000,
        "municipality": [code % 3 + 1, (code + 1) % 3 + 1],
    });
    if code > 10 {
        place["larger_place"] = json!(code / 10);
    }
    place
}

fn build_env(place_count: u64) -> TestEnv {
    let mut env = TestEnv::new(KarpConfig::default(), PluginRegistry::new());
    env.add_resource(
        ResourceConfig::from_json(municipalities_config()).unwrap(),
        municipalities_entries(),
    )
    .unwrap();
    env.add_resource(
        ResourceConfig::from_json(places_config()).unwrap(),
        (1..=place_count).map(make_place),
    )
    .unwrap();
    env
}

fn bench_transform_entry(c: &mut Criterion) {
    let counts = [500u64, 2_000];
    let mut group = c.benchmark_group("transform_entry");
    for &count in &counts {
        let env = build_env(count);
        let places = env.resource("places").unwrap();
        // entry 5 collects entries 50..=59 through smaller_places
        let entry = places.entry_repository.get_by_entry_id("5").unwrap().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &entry, |b, entry| {
            b.iter(|| {
                black_box(
                    env.service
                        .transformer()
                        .transform_to_index_entry(&places, entry)
                        .unwrap(),
                );
            });
        });
    }
    group.finish();
}

fn bench_reindex(c: &mut Criterion) {
    let counts = [200u64, 1_000];
    let mut group = c.benchmark_group("reindex");
    group.sample_size(10);
    for &count in &counts {
        let env = build_env(count);
        let places = env.resource("places").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &places, |b, places| {
            b.iter(|| {
                black_box(env.service.reindex(places).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_update_references(c: &mut Criterion) {
    let env = build_env(1_000);
    let municipalities = env.resource("municipalities").unwrap();
    let changed = municipalities
        .entry_repository
        .get_by_entry_id("2")
        .unwrap()
        .unwrap();
    env.reindex_all().unwrap();

    c.bench_function("update_references_municipality", |b| {
        b.iter(|| {
            env.service
                .references()
                .update_references(&municipalities, std::slice::from_ref(&changed))
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_transform_entry,
    bench_reindex,
    bench_update_references
);
criterion_main!(benches);
