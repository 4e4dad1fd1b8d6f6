use battleye_rcon::packet::{Direction, Multipart, Packet};
use battleye_rcon::NonceCheck;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn codec(c: &mut Criterion) {
    c.bench_function("encode_client_command", |b| {
        let p = Packet::ClientCommand {
            sequence: 5,
            text: "players".into(),
        };
        b.iter(|| black_box(p.encode().unwrap()))
    });

    c.bench_function("decode_server_command_single_part", |b| {
        let buf = Packet::ServerCommand {
            sequence: 5,
            multipart: None,
            text: "Players on server: (1/32)\n1  BattlEyeRocks".into(),
        }
        .encode()
        .unwrap();

        b.iter(|| black_box(Packet::decode(&buf, Direction::ServerToClient).unwrap()))
    });

    c.bench_function("decode_server_command_multipart", |b| {
        let buf = Packet::ServerCommand {
            sequence: 5,
            multipart: Some(Multipart { total: 4, index: 2 }),
            text: "a chunk of a larger admin log dump".into(),
        }
        .encode()
        .unwrap();

        b.iter(|| black_box(Packet::decode(&buf, Direction::ServerToClient).unwrap()))
    });

    c.bench_function("decode_rejects_bad_crc", |b| {
        let mut buf = Packet::ClientCommand {
            sequence: 5,
            text: "players".into(),
        }
        .encode()
        .unwrap();
        *buf.last_mut().unwrap() ^= 0xFF;

        b.iter(|| black_box(Packet::decode(&buf, Direction::ClientToServer).is_err()))
    });
}

pub fn nonce_check(c: &mut Criterion) {
    c.bench_function("nonce_check_insert_steady_state", |b| {
        let mut nc = NonceCheck::new(5).unwrap();
        let mut seq = 0u8;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            black_box(nc.insert(seq))
        })
    });

    c.bench_function("nonce_check_insert_duplicate", |b| {
        let mut nc = NonceCheck::new(5).unwrap();
        nc.insert(7);
        b.iter(|| black_box(nc.insert(7)))
    });
}

criterion_group!(benches, codec, nonce_check);
criterion_main!(benches);
