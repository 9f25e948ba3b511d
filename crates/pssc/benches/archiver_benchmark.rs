use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use pssc::Archiver;

fn benchmark_archiver(c: &mut Criterion) {
    let mut group = c.benchmark_group("PSSC Archiver");

    let sections: Vec<Vec<u8>> = (0..2000)
        .map(|i| {
            let mut s = vec![0u8; 64];
            s[0] = (i % 7) as u8; // a handful of distinct bodies to dedup against
            s
        })
        .collect();

    group.bench_function("add 2000 sections, 4 PIDs, periodic flush", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            let mut archiver = Archiver::new(&mut out).with_write_interval(11_250); // ~1s
            for (i, section) in sections.iter().enumerate() {
                let pid = 0x100 + (i % 4) as u16;
                let pcr = Some((i as u64) * 90_000 / 25);
                archiver.add(pid, pcr, black_box(section)).unwrap();
            }
            archiver.flush(false).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_archiver);
criterion_main!(benches);
