//! Decision mapping and request validation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use moderation_contract::{ModerationRequest, Thresholds};

fn bench_decide(c: &mut Criterion) {
    c.bench_function("thresholds_decide_all_scores", |b| {
        b.iter(|| {
            for score in 0..=100u8 {
                black_box(Thresholds::TEXT.decide(black_box(score)));
                black_box(Thresholds::IMAGE.decide(black_box(score)));
            }
        })
    });
}

fn bench_request_from_parts(c: &mut Criterion) {
    let image_data = "QUJD".repeat(4096);
    c.bench_function("request_from_text", |b| {
        b.iter(|| {
            ModerationRequest::from_parts(
                black_box(Some("you people never learn".to_string())),
                None,
                None,
                None,
            )
        })
    });
    c.bench_function("request_from_base64_image", |b| {
        b.iter(|| {
            ModerationRequest::from_parts(None, None, black_box(Some(image_data.clone())), None)
        })
    });
}

criterion_group!(benches, bench_decide, bench_request_from_parts);
criterion_main!(benches);
