use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_rtsp::overlay::draw_text;

pub fn benchmark_overlay(c: &mut Criterion) {
    let mut pixels = vec![0u8; 720 * 480 * 3];
    c.bench_function("fps_text", |b| {
        b.iter(|| {
            draw_text(
                &mut pixels,
                720,
                480,
                40,
                40,
                2,
                [0, 255, 0],
                "fps = 29.97",
            )
        })
    });
}

criterion_group!(benches, benchmark_overlay);
criterion_main!(benches);
