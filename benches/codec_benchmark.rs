use criterion::{black_box, criterion_group, criterion_main, Criterion};
use thz_rs::thz::frame::{pack_set_frame, FrameDecoder};
use thz_rs::thz::serial_mock::encode_reply;

fn bench_pack(c: &mut Criterion) {
    let payload: Vec<u8> = (0..=255u8).cycle().take(512).collect();
    c.bench_function("pack_set_frame_512", |b| {
        b.iter(|| pack_set_frame(black_box(0x0A), black_box(&payload)))
    });
}

fn bench_decode(c: &mut Criterion) {
    let payload: Vec<u8> = std::iter::once(0xFB)
        .chain((0..=255u8).cycle().take(400))
        .collect();
    let wire = encode_reply(0x00, &payload);
    c.bench_function("decode_reply_400", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            for &byte in &wire {
                if decoder.push(byte).unwrap() {
                    break;
                }
            }
            decoder.into_frame().unwrap()
        })
    });
}

criterion_group!(benches, bench_pack, bench_decode);
criterion_main!(benches);
