// StrandTCP transport benchmarks using criterion.
//
// Measures:
//   - ByteStream write / read throughput
//   - Reassembler throughput on reversed ranges
//   - Loopback transfer between two in-memory connections

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use bytes::Bytes;
use strandtcp::{ByteStream, Connection, Reassembler, TcpConfig, Wrap32};

// ---------------------------------------------------------------------------
// ByteStream throughput
// ---------------------------------------------------------------------------

fn bench_byte_stream(c: &mut Criterion) {
    let sizes: &[usize] = &[64, 1024, 16384];

    let mut group = c.benchmark_group("byte_stream_write_read");
    for &size in sizes {
        let chunk = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{size}B")), &chunk, |b, chunk| {
            let mut stream = ByteStream::new(64_000);
            b.iter(|| {
                let n = stream.write(black_box(chunk)).unwrap();
                black_box(stream.read(n).unwrap());
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Reassembler
// ---------------------------------------------------------------------------

fn bench_reassembler_reversed(c: &mut Criterion) {
    const CHUNK: usize = 1000;
    const CHUNKS: usize = 64;
    let chunks: Vec<Bytes> = (0..CHUNKS).map(|i| Bytes::from(vec![i as u8; CHUNK])).collect();

    let mut group = c.benchmark_group("reassembler");
    group.throughput(Throughput::Bytes((CHUNK * CHUNKS) as u64));
    group.bench_function("reversed_64x1000", |b| {
        b.iter(|| {
            let mut r = Reassembler::new(CHUNK * CHUNKS);
            for (i, chunk) in chunks.iter().enumerate().rev() {
                r.submit(chunk.clone(), (i * CHUNK) as u64, i == CHUNKS - 1);
            }
            black_box(r.output().buffer_size());
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Loopback connection transfer
// ---------------------------------------------------------------------------

fn loopback_transfer(payload: &[u8]) -> usize {
    let config = TcpConfig::default();
    let mut client = Connection::with_isn_source(config.clone(), || Wrap32::new(1));
    let mut server = Connection::with_isn_source(config, || Wrap32::new(7));
    client.open();

    let mut sent = 0;
    let mut received = 0;
    loop {
        if sent < payload.len() {
            sent += client.write(&payload[sent..]).unwrap();
        }
        loop {
            let to_server: Vec<_> = client.drain_segments().collect();
            let to_client: Vec<_> = server.drain_segments().collect();
            if to_server.is_empty() && to_client.is_empty() {
                break;
            }
            to_server.into_iter().for_each(|seg| server.on_segment_received(seg));
            to_client.into_iter().for_each(|seg| client.on_segment_received(seg));
        }
        received += server.read(usize::MAX).unwrap().len();
        if received == payload.len() {
            return received;
        }
        client.on_tick(Duration::from_millis(1));
        server.on_tick(Duration::from_millis(1));
    }
}

fn bench_loopback(c: &mut Criterion) {
    let sizes: &[usize] = &[16 * 1024, 256 * 1024];

    let mut group = c.benchmark_group("loopback_transfer");
    for &size in sizes {
        let payload = vec![0xC3u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}KiB", size / 1024)), &payload, |b, p| {
            b.iter(|| black_box(loopback_transfer(p)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group! {
    name = transport_benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));
    targets =
        bench_byte_stream,
        bench_reassembler_reversed,
        bench_loopback
}

criterion_main!(transport_benches);
