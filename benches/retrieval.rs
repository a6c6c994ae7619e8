//! Benchmarks for extraction and retrieval hot paths.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use waterbear::collab::PassageMatch;
use waterbear::corpus;
use waterbear::extract::rules::RuleExtractor;
use waterbear::extract::{Extract, ExtractorConfig};
use waterbear::graph::index::GraphStore;
use waterbear::graph::{SourceSpan, Triple};
use waterbear::ingest;
use waterbear::intent::{LexicalResolver, ResolveIntent};
use waterbear::retrieve::fusion::{DEFAULT_ALPHA, fuse_evidence};
use waterbear::text::{ChunkConfig, chunk_text, clean_text};

fn seeded_store() -> Arc<GraphStore> {
    let store = Arc::new(GraphStore::new());
    let extractor = RuleExtractor::new(ExtractorConfig::default());
    ingest::ingest_batch(
        &store,
        &extractor,
        &ChunkConfig::default(),
        0.6,
        &corpus::bundled_documents(),
    );
    store
}

fn bench_extraction(c: &mut Criterion) {
    let extractor = RuleExtractor::new(ExtractorConfig::default());
    let cleaned = clean_text(&corpus::bundled_corpus()[0].text);
    let chunks = chunk_text(&cleaned, &ChunkConfig::default());
    let chunk = chunks[0].clone();

    c.bench_function("extract_chunk", |bench| {
        bench.iter(|| black_box(extractor.extract_chunk("bench-doc", &chunk).unwrap()))
    });
}

fn bench_entity_query(c: &mut Criterion) {
    let store = seeded_store();

    c.bench_function("entity_neighborhood_2hop", |bench| {
        bench.iter(|| black_box(store.query_by_entity("microgravity", 2)))
    });
}

fn bench_intent_resolution(c: &mut Criterion) {
    let resolver = LexicalResolver::new(seeded_store());

    c.bench_function("intent_resolution", |bench| {
        bench.iter(|| {
            black_box(resolver.resolve("How does microgravity affect bone mineral density in mice?"))
        })
    });
}

fn bench_fusion(c: &mut Criterion) {
    let triples: Vec<Triple> = (0..50)
        .map(|i| {
            Triple::new(
                &format!("entity {i}"),
                "affects",
                &format!("target {i}"),
                0.6 + (i % 40) as f32 / 100.0,
                SourceSpan::new("bench-doc", 0, 0, 10),
            )
            .unwrap()
        })
        .collect();
    let passages: Vec<PassageMatch> = (0..20)
        .map(|i| PassageMatch {
            passage_text: format!("passage number {i} about spaceflight biology"),
            similarity: 0.5 + i as f32 / 50.0,
            document_id: Some(format!("OSD-{i}")),
            title: None,
        })
        .collect();

    c.bench_function("fuse_50g_20v", |bench| {
        bench.iter(|| black_box(fuse_evidence(&triples, &passages, DEFAULT_ALPHA)))
    });
}

criterion_group!(
    benches,
    bench_extraction,
    bench_entity_query,
    bench_intent_resolution,
    bench_fusion
);
criterion_main!(benches);
