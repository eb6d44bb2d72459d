use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jeo_filter::lucene::LuceneQueryEncoder;
use jeo_filter::sql::{SqlEncoder, SqlEncoderConfig};
use jeo_filter::*;

fn bench_parse_split_encode(c: &mut Criterion) {
    let text = "STATE_NAME = 'Texas' AND PERSONS > 1000000 AND (LAND_KM < 5000 OR WATER_KM IS NULL) \
                AND INTERSECTS(the_geom, POLYGON((0 0, 10 0, 10 10, 0 10, 0 0)))";
    let feature = Feature::with_id("states.1")
        .with("STATE_NAME", "Texas")
        .with("PERSONS", 16_986_510)
        .with("LAND_KM", 678_051.0)
        .with("WATER_KM", Value::Null)
        .with("the_geom", geo::point!(x: 5.0, y: 5.0));
    let sql = SqlEncoder::new(SqlEncoderConfig::default());
    let lucene = LuceneQueryEncoder::default();

    c.bench_function("parse", |b| {
        b.iter(|| {
            let _ = cql::parse(black_box(text));
        })
    });
    let filter = cql::parse(text).unwrap();
    c.bench_function("test", |b| {
        b.iter(|| {
            let _ = filter.test(black_box(&feature));
        })
    });
    c.bench_function("split", |b| {
        b.iter(|| {
            let _ = FilterSplitter::new(&lucene).split(black_box(&filter));
        })
    });
    c.bench_function("encode_sql", |b| {
        b.iter(|| {
            let _ = sql.encode(black_box(&filter));
        })
    });
    c.bench_function("push_down_lucene", |b| {
        b.iter(|| {
            let _ = push_down(&lucene, black_box(&filter));
        })
    });
}

criterion_group!(benches, bench_parse_split_encode);
criterion_main!(benches);
