use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use hftshm_layout::{RingLayout, buffer_index, event_offset, metadata_init};

#[repr(C, align(128))]
struct Page([u8; 4096]);

fn bench_hot_path(c: &mut Criterion) {
    let mut page = Box::new(Page([0; 4096]));
    let layout = RingLayout::new(4, 64, 1 << 16, 0).expect("layout");
    let meta = metadata_init(
        &mut page.0,
        layout.max_consumers,
        layout.event_size,
        layout.buffer_size,
        layout.producer_offset,
        layout.consumer_0_offset,
        layout.header_size,
    )
    .expect("init");

    let mut group = c.benchmark_group("hot_path");
    group.throughput(Throughput::Elements(1));

    group.bench_function("buffer_index", |b| {
        let mut seq = 0u64;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            black_box(buffer_index(meta, black_box(seq)))
        });
    });

    group.bench_function("event_offset", |b| {
        let mut seq = 0u64;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            black_box(event_offset(meta, buffer_index(meta, black_box(seq))))
        });
    });

    group.bench_function("modulo_baseline", |b| {
        let mut seq = 0u64;
        let size = black_box(layout.buffer_size as u64);
        b.iter(|| {
            seq = seq.wrapping_add(1);
            black_box((black_box(seq) % size) * layout.event_size as u64)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hot_path);
criterion_main!(benches);
