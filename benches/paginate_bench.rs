use brochure_export::compose::{compose, PageFormat};
use brochure_export::paginate::Paginator;
use brochure_export::rendering::{Bitmap, BreakPoints};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};

// A long brochure: 40 sections over a 1588x60000 bitmap (794 css px at 2x).
fn bench_paginate(c: &mut Criterion) {
    let format = PageFormat::a4();
    let capacity = format.capacity_px(1588);
    let offsets: Vec<f64> = (0..40).map(|i| i as f64 * 750.0).collect();
    let break_points = BreakPoints::from_css_offsets(&offsets, 30000.0, 60000);
    let paginator = Paginator::default();

    c.bench_function("paginate_60000_rows", |b| {
        b.iter(|| {
            let bands = paginator
                .paginate(black_box(60000), black_box(capacity), &break_points)
                .unwrap();
            black_box(bands)
        })
    });
}

fn bench_compose(c: &mut Criterion) {
    let format = PageFormat::a4();
    let bitmap = Bitmap::new(RgbImage::from_pixel(794, 4000, Rgb([250, 250, 250])), 1);
    let bands = Paginator::default()
        .paginate(bitmap.height(), format.capacity_px(bitmap.width()), &BreakPoints::default())
        .unwrap();

    c.bench_function("compose_and_serialize_pdf", |b| {
        b.iter(|| {
            let bytes = compose(&bitmap, &bands, &format).unwrap().to_bytes().unwrap();
            black_box(bytes)
        })
    });
}

criterion_group!(benches, bench_paginate, bench_compose);
criterion_main!(benches);
