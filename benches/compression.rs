use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use response_bank::cache::{KeyDescriptor, KeyValue, StructuredKey};
use response_bank::compression::{compress, run, Encoding};

/// HTML-like body of roughly the given size
fn create_body(size: usize) -> Vec<u8> {
    let row = b"<tr><td class=\"name\">Widget</td><td class=\"price\">$12.00</td></tr>\n";
    row.iter().copied().cycle().take(size).collect()
}

/// Whole-buffer compression per encoding and body size
fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");

    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let body = create_body(size);
        for encoding in [Encoding::Gzip, Encoding::Brotli] {
            group.bench_with_input(
                BenchmarkId::new(encoding.to_string(), size),
                &body,
                |b, body| b.iter(|| compress(black_box(body), &encoding).unwrap()),
            );
        }
    }

    group.finish();
}

/// Streaming gzip: live flushes plus the single-shot artifact
fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_gzip");

    for chunk_size in [512, 8 * 1024] {
        let body = create_body(256 * 1024);
        group.bench_with_input(
            BenchmarkId::new("chunk_size", chunk_size),
            &body,
            |b, body| {
                b.iter(|| {
                    let chunks = body.chunks(chunk_size).map(Ok::<_, std::io::Error>);
                    let mut streamed = 0usize;
                    run(
                        chunks,
                        |chunk| {
                            streamed += chunk.len();
                            Ok(())
                        },
                        |artifact| {
                            black_box(artifact);
                        },
                    )
                    .unwrap();
                    streamed
                })
            },
        );
    }

    group.finish();
}

fn bench_canonicalize(c: &mut Criterion) {
    let descriptor: KeyDescriptor = StructuredKey::new(KeyValue::map([
        ("controller", "products"),
        ("action", "index"),
        ("page", "3"),
        ("locale", "en"),
    ]))
    .with_schema_version(2i64)
    .with_version("1700000000")
    .with_encoding("br")
    .into();

    c.bench_function("canonicalize_structured", |b| {
        b.iter(|| black_box(&descriptor).canonicalize())
    });
    c.bench_function("entity_tag_structured", |b| {
        b.iter(|| black_box(&descriptor).entity_tag())
    });
}

criterion_group!(benches, bench_compress, bench_stream, bench_canonicalize);
criterion_main!(benches);
