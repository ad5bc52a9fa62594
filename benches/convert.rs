use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_rtsp::convert::{yuyv_to_24bit, ChannelOrder};

pub fn benchmark_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("yuyv");
    for dim in [
        (320, 240),
        (640, 480),
        (720, 480),
        (1280, 720),
        (1920, 1080),
    ]
    .iter()
    {
        let src = vec![0x80u8; dim.0 * dim.1 * 2];
        let mut dst = vec![0u8; dim.0 * dim.1 * 3];
        group.bench_with_input(format!("{}x{}", dim.0, dim.1), dim, |b, dim| {
            b.iter(|| yuyv_to_24bit(&src, &mut dst, dim.0, dim.1, ChannelOrder::Bgr))
        });
    }
}

criterion_group!(benches, benchmark_convert);
criterion_main!(benches);
