//! Criterion benchmarks for the NetUMP engine hot paths.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use netump_core::engine::{NetUmpEngine, SessionState};
use netump_core::protocol::Command;
use netump_core::EndpointConfig;
use std::net::SocketAddr;

const NOTE_ON: u32 = 0x2091_4040;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Wire two engines together through the handshake, no sockets involved.
fn open_pair() -> (NetUmpEngine, NetUmpEngine) {
    let mut initiator = NetUmpEngine::new(EndpointConfig::default());
    let mut listener = NetUmpEngine::new(EndpointConfig::default());
    listener.start_listener();
    initiator.start_initiator(addr(8000));

    initiator.tick();
    let invitations: Vec<_> = initiator.drain_output().map(|(_, d)| d).collect();
    for datagram in invitations {
        listener.input(&datagram, addr(8001));
    }
    let acceptances: Vec<_> = listener.drain_output().map(|(_, d)| d).collect();
    for datagram in acceptances {
        initiator.input(&datagram, addr(8000));
    }
    assert_eq!(initiator.state(), SessionState::Opened);
    (initiator, listener)
}

fn assembler_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembler_throughput");

    for &message_count in &[16usize, 64, 256] {
        group.throughput(Throughput::Elements(message_count as u64));
        group.bench_with_input(
            BenchmarkId::new("one_word_messages", message_count),
            &message_count,
            |b, &count| {
                b.iter(|| {
                    let (mut initiator, mut listener) = open_pair();
                    for n in 0..count as u32 {
                        assert!(initiator.send_ump(&[NOTE_ON + n]));
                    }
                    // Drain everything: 64 payload words leave per tick.
                    while (listener.stats().ump_messages_delivered as usize) < count {
                        initiator.tick();
                        let datagrams: Vec<_> =
                            initiator.drain_output().map(|(_, d)| d).collect();
                        assert!(!datagrams.is_empty());
                        for datagram in datagrams {
                            listener.input(&datagram, addr(8001));
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

fn codec_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let command = Command::UmpData {
        sequence: 42,
        words: (0..64).map(|n| NOTE_ON + n).collect(),
    };
    group.throughput(Throughput::Bytes((4 + 64 * 4) as u64));
    group.bench_function("encode_decode_full_packet", |b| {
        b.iter(|| {
            let mut buf = bytes::BytesMut::with_capacity(512);
            command.encode(&mut buf);
            let mut bytes = buf.freeze();
            let decoded = Command::decode(&mut bytes).expect("decode");
            assert_eq!(decoded.opcode(), 0xFF);
        });
    });

    group.finish();
}

criterion_group!(benches, assembler_throughput, codec_roundtrip);
criterion_main!(benches);
