//! Criterion micro-benchmarks for the frame decode path.
//!
//! These measure the decoder's per-frame overhead across body shapes:
//! - a small single-chunk frame (the steady-state heartbeat case)
//! - a multi-chunk frame (chunked fetch payloads)
//! - a frame large enough to force scratch-buffer growth
//!
//! Run with: `cargo bench --bench decode_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tidemq::codec::FrameDecoder;
use tidemq::constants::RPC_PROTOCOL_BEGIN_TOKEN;

fn frame(serial_no: u32, chunks: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&RPC_PROTOCOL_BEGIN_TOKEN.to_be_bytes());
    buf.extend_from_slice(&serial_no.to_be_bytes());
    buf.extend_from_slice(&(chunks.len() as u32).to_be_bytes());
    for chunk in chunks {
        buf.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        buf.extend_from_slice(chunk);
    }
    buf
}

fn bench_decode(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");

    let small = frame(1, &[&[0x42u8; 128]]);
    let chunk_1k = vec![0x42u8; 1024];
    let chunks_1k: Vec<&[u8]> = (0..8).map(|_| chunk_1k.as_slice()).collect();
    let chunked = frame(2, &chunks_1k);
    let large = frame(3, &[&vec![0x42u8; 64 * 1024][..]]);

    let mut group = c.benchmark_group("decode");
    for (name, bytes) in [("small_128B", &small), ("chunked_8x1KiB", &chunked), ("large_64KiB", &large)] {
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), bytes, |b, bytes| {
            b.iter(|| {
                rt.block_on(async {
                    let mut decoder = FrameDecoder::new(black_box(bytes.as_slice()));
                    decoder.decode().await.expect("well-formed frame")
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
