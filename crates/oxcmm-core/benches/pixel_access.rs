//! Pixel access benchmarks
//!
//! Block reads from the storage layouts an image may have, and the ICC
//! codec on a typical profile.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxcmm_core::icc::ColorSpace;
use oxcmm_core::{AccessKind, DataType, Image, PixelAccess, PixelLayout, Profile, ProfileFlags};

fn layouts() -> [(&'static str, PixelLayout); 4] {
    let rgb8 = PixelLayout::new(3, DataType::U8);
    [
        ("rgb8", rgb8),
        ("rgb8/planar", rgb8.with_planar(true)),
        ("bgr8", rgb8.with_swap(true)),
        ("rgba16/byteswap", PixelLayout::new(4, DataType::U16).with_byte_swap(true)),
    ]
}

fn bench_read_span(c: &mut Criterion) {
    let mut group = c.benchmark_group("Image read_span");
    let (w, h) = (256, 256);
    let profile = Profile::from_signature(ColorSpace::Rgb);

    for (name, layout) in layouts() {
        let image = Image::create(w, h, None, layout, profile.clone()).unwrap();
        let mut line = vec![0u8; w * layout.normalized().pixel_size()];
        group.throughput(Throughput::Bytes((w * h * layout.pixel_size()) as u64));
        group.bench_with_input(BenchmarkId::new("lines", name), &layout, |b, _| {
            b.iter(|| {
                for y in 0..h {
                    image.read_span(0, y, w, black_box(&mut line)).unwrap();
                }
            })
        });
    }
    group.finish();
}

fn bench_ticket_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("PixelAccess walk");
    let image = Image::create(
        512,
        512,
        None,
        PixelLayout::new(3, DataType::U8),
        Profile::from_signature(ColorSpace::Rgb),
    )
    .unwrap();

    for (name, kind) in [
        ("line", AccessKind::Line),
        ("tile32", AccessKind::Tile { width: 32, height: 32 }),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut ticket = PixelAccess::create(0, 0, &image, kind);
                let mut visited = 0usize;
                loop {
                    visited += ticket.positions().count();
                    if !ticket.advance() {
                        break;
                    }
                }
                black_box(visited)
            })
        });
    }
    group.finish();
}

fn bench_profile_codec(c: &mut Criterion) {
    let data = Profile::from_signature(ColorSpace::Rgb).to_memory();
    c.bench_function("profile parse", |b| {
        b.iter(|| Profile::from_memory(black_box(&data), ProfileFlags::NO_CACHE).unwrap())
    });
    let profile = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
    c.bench_function("profile hash", |b| b.iter(|| black_box(profile.hash())));
}

criterion_group!(benches, bench_read_span, bench_ticket_walk, bench_profile_codec);
criterion_main!(benches);
