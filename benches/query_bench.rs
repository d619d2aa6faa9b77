//! Benchmarks for the skilldex query and search engines
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use skilldex::document::{SkillAction, SkillDocument, SkillTrack, StaticSource};
use skilldex::query::{parse, StructuredQueryEngine};
use skilldex::search::Bm25Index;
use std::sync::Arc;

const DAMAGE_TYPES: [&str; 4] = ["Fire", "Ice", "Lightning", "Physical"];

fn synthetic_corpus(files: usize, actions_per_file: usize) -> Vec<SkillDocument> {
    (0..files)
        .map(|f| {
            let mut track = SkillTrack::new("DamageTrack", 0);
            for a in 0..actions_per_file {
                track = track.action(
                    SkillAction::new("DamageAction", (a * 10) as i64)
                        .param("baseDamage", ((f * 37 + a * 13) % 500) as i64)
                        .param("damageType", DAMAGE_TYPES[(f + a) % DAMAGE_TYPES.len()]),
                );
            }
            SkillDocument::new(format!("skills/skill_{:04}.skill", f), format!("Skill {}", f))
                .hash(format!("hash-{}", f))
                .track(track)
        })
        .collect()
}

fn engine_over(files: usize, actions_per_file: usize) -> StructuredQueryEngine {
    let source = StaticSource::new(synthetic_corpus(files, actions_per_file));
    let engine = StructuredQueryEngine::new(Arc::new(source));
    engine.rebuild_index(false).expect("static corpus indexes");
    engine
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("simple", |b| {
        b.iter(|| parse(black_box("DamageAction where baseDamage > 200")))
    });

    group.bench_function("extended", |b| {
        b.iter(|| {
            parse(black_box(
                "SELECT COUNT(*), AVG(baseDamage) FROM DamageAction \
                 WHERE (damageType = 'Fire' or damageType = 'Ice') and baseDamage > 50 \
                 GROUP BY damageType ORDER BY count DESC LIMIT 10",
            ))
        })
    });

    group.finish();
}

fn bench_query_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_scan");

    for (files, actions) in [(10, 20), (100, 20), (100, 100)] {
        let engine = engine_over(files, actions);
        let total = (files * actions) as u64;
        group.throughput(Throughput::Elements(total));

        group.bench_function(format!("filter_{}x{}", files, actions), |b| {
            b.iter(|| {
                engine.query_opts(
                    black_box("DamageAction where baseDamage > 250"),
                    100,
                    false,
                    false,
                )
            })
        });

        group.bench_function(format!("aggregate_{}x{}", files, actions), |b| {
            b.iter(|| {
                engine.query_opts(
                    black_box("SELECT COUNT(*), AVG(baseDamage) FROM DamageAction GROUP BY damageType"),
                    100,
                    false,
                    false,
                )
            })
        });
    }

    group.finish();
}

fn bench_query_cached(c: &mut Criterion) {
    let engine = engine_over(100, 100);
    // Warm the cache once
    engine.query("DamageAction where baseDamage > 250", 100, false);

    c.bench_function("query_cached", |b| {
        b.iter(|| engine.query(black_box("DamageAction where baseDamage > 250"), 100, false))
    });
}

fn bench_bm25(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25");

    let engine = engine_over(100, 20);
    let mut index = Bm25Index::new();
    engine.index_search_text(&mut index);

    group.bench_function("search_2000_docs", |b| {
        b.iter(|| index.search(black_box("fire damage"), 10, None))
    });

    group.bench_function("index_2000_docs", |b| {
        b.iter(|| {
            let mut fresh = Bm25Index::new();
            engine.index_search_text(&mut fresh);
            fresh.len()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_query_scan,
    bench_query_cached,
    bench_bm25
);
criterion_main!(benches);
