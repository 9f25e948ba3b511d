use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use ts::{PsiExtractor, TsPacket};

fn benchmark_extractor(c: &mut Criterion) {
    let mut group = c.benchmark_group("PSI Extractor");

    let stream = create_stream(2_000);

    group.bench_function("add_packet (steady state, two programs)", |b| {
        b.iter(|| {
            let mut extractor = PsiExtractor::new().with_program(1);
            extractor.add_target_stream_type(0x1B);
            extractor.add_target_stream_type(0x0F);
            let mut sink = |_pid: u16, _pcr: Option<u64>, _section: &[u8]| {};
            for raw in &stream {
                let packet = TsPacket::parse(black_box(raw.clone())).unwrap();
                extractor.add_packet(&packet, &mut sink);
            }
        })
    });

    group.bench_function("raw passthrough, no program selection", |b| {
        b.iter(|| {
            let mut extractor = PsiExtractor::new();
            extractor.add_target_pid(0x100);
            extractor.add_target_pid(0x101);
            let mut sink = |_pid: u16, _pcr: Option<u64>, _section: &[u8]| {};
            for raw in &stream {
                let packet = TsPacket::parse(black_box(raw.clone())).unwrap();
                extractor.add_packet(&packet, &mut sink);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_extractor);
criterion_main!(benches);

fn pat_packet() -> Vec<u8> {
    let mut p = vec![0u8; 188];
    p[0] = 0x47;
    p[1] = 0x40; // PUSI, PID 0
    p[2] = 0x00;
    p[3] = 0x10;
    p[4] = 0x00; // pointer field
    p[5] = 0x00; // table_id
    p[6] = 0x80;
    p[7] = 0x11; // section_length = 17
    p[8] = 0x00;
    p[9] = 0x01; // transport_stream_id
    p[10] = 0x01; // version 0, current_next = 1
    p[11] = 0x00;
    p[12] = 0x00;
    p[13] = 0x00;
    p[14] = 0x01; // program_number = 1
    p[15] = 0xE1;
    p[16] = 0x00; // pmt_pid = 0x100
    p[17] = 0x00;
    p[18] = 0x02; // program_number = 2
    p[19] = 0xE2;
    p[20] = 0x00; // pmt_pid = 0x200
    p
}

fn pmt_packet(pid: u16, program_number: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut p = vec![0u8; 188];
    p[0] = 0x47;
    p[1] = 0x40 | ((pid >> 8) as u8);
    p[2] = pid as u8;
    p[3] = 0x10;
    p[4] = 0x00;
    p[5] = 0x02;
    p[6] = 0x80;
    let section_length = 9 + 5 * streams.len() + 4;
    p[7] = section_length as u8;
    p[8] = (program_number >> 8) as u8;
    p[9] = program_number as u8;
    p[10] = 0x01;
    p[11] = 0x00;
    p[12] = 0x00;
    p[13] = 0xE1;
    p[14] = 0x00; // pcr_pid
    p[15] = 0x00;
    p[16] = 0x00;
    let mut off = 17;
    for &(stream_type, es_pid) in streams {
        p[off] = stream_type;
        p[off + 1] = 0xE0 | ((es_pid >> 8) as u8);
        p[off + 2] = es_pid as u8;
        p[off + 3] = 0x00;
        p[off + 4] = 0x00;
        off += 5;
    }
    p
}

fn data_packet(pid: u16, counter: u8) -> Vec<u8> {
    let mut p = vec![0u8; 188];
    p[0] = 0x47;
    p[1] = (pid >> 8) as u8;
    p[2] = pid as u8;
    p[3] = 0x10 | (counter & 0x0F);
    p
}

fn create_stream(data_packets: usize) -> Vec<Bytes> {
    let mut out = vec![
        Bytes::from(pat_packet()),
        Bytes::from(pmt_packet(0x100, 1, &[(0x1B, 0x100), (0x0F, 0x101)])),
        Bytes::from(pmt_packet(0x200, 2, &[(0x24, 0x200), (0x81, 0x201)])),
    ];
    for i in 0..data_packets {
        let pid = [0x100u16, 0x101, 0x200, 0x201][i % 4];
        out.push(Bytes::from(data_packet(pid, i as u8)));
    }
    out
}
