//! Encode/decode micro-benchmarks

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pgcord::protocol::{decode_message, encode_message, FrontendMessage};
use pgcord::Param;

fn bench_encode_query(c: &mut Criterion) {
    let msg = FrontendMessage::Query("SELECT id, name, created_at FROM users WHERE id = 42".into());
    c.bench_function("encode_simple_query", |b| {
        b.iter(|| encode_message(black_box(&msg)))
    });
}

fn bench_encode_bind(c: &mut Criterion) {
    let msg = FrontendMessage::Bind {
        portal: String::new(),
        statement: "stmt".into(),
        params: vec![
            Param::Int8(123_456_789),
            Param::Text("some text value".into()),
            Param::Null,
            Param::Bool(true),
        ],
    };
    c.bench_function("encode_bind", |b| b.iter(|| encode_message(black_box(&msg))));
}

fn bench_decode_data_row(c: &mut Criterion) {
    // DataRow with 8 short text columns
    let mut body = Vec::new();
    body.extend_from_slice(&8i16.to_be_bytes());
    for i in 0..8 {
        let value = format!("value-{}", i);
        body.extend_from_slice(&(value.len() as i32).to_be_bytes());
        body.extend_from_slice(value.as_bytes());
    }
    let mut frame = vec![b'D'];
    frame.extend_from_slice(&((body.len() as i32 + 4).to_be_bytes()));
    frame.extend_from_slice(&body);

    c.bench_function("decode_data_row", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&frame[..]);
            decode_message(black_box(&mut buf)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_query,
    bench_encode_bind,
    bench_decode_data_row
);
criterion_main!(benches);
