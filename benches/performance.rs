use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::collections::BTreeSet;
use tandem::protocol::{Message, QueryReply, QueryRequest};
use tandem::{Address, Document, Query, QueryOptions};

/// Document shaped like a typical result row
fn create_test_document(i: usize) -> Document {
    Document::try_from(json!({
        "_id": i,
        "name": format!("user_{}", i),
        "email": format!("user_{}@example.com", i),
        "tags": ["a", "b", "c"],
        "profile": {"age": 30 + i % 40, "active": i % 2 == 0},
    }))
    .unwrap()
}

/// Address ordering and set membership
fn bench_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("address");

    for count in [10, 100, 1000].iter() {
        let addresses: Vec<Address> = (0..*count)
            .map(|i| Address::endpoint(&format!("10.0.{}.{}", i / 250, i % 250), 27017).unwrap())
            .collect();

        group.bench_with_input(
            BenchmarkId::new("btree_insert", count),
            &addresses,
            |b, addresses| {
                b.iter(|| {
                    let set: BTreeSet<Address> = addresses.iter().cloned().collect();
                    black_box(set);
                });
            },
        );
    }

    group.bench_function("endpoint_literal", |b| {
        b.iter(|| {
            let addr = Address::endpoint(black_box("192.168.1.20"), black_box(27018)).unwrap();
            black_box(addr);
        });
    });

    group.finish();
}

/// Request encoding and message framing
fn bench_request_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_codec");

    let request = QueryRequest {
        options: QueryOptions::SLAVE_OK,
        ns: "app.users".to_string(),
        n_to_skip: 0,
        n_to_return: 100,
        query: Query::new(Document::with("active", true))
            .sort(Document::with("name", 1))
            .to_document(),
        fields: Some(Document::with("email", 1)),
    };

    group.bench_function("query_to_message", |b| {
        b.iter(|| {
            let message = black_box(&request).to_message().unwrap();
            black_box(message);
        });
    });

    let mut wire = Vec::new();
    request.to_message().unwrap().write_to(&mut wire).unwrap();

    group.bench_function("message_read", |b| {
        b.iter(|| {
            let mut reader = black_box(wire.as_slice());
            let message = Message::read_from(&mut reader).unwrap();
            black_box(QueryRequest::from_message(&message).unwrap());
        });
    });

    group.finish();
}

/// Reply parsing and document decoding
fn bench_reply_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_decode");

    for batch_size in [1, 100, 1000].iter() {
        let docs: Vec<Document> = (0..*batch_size).map(create_test_document).collect();
        let reply = QueryReply::batch(42, 0, &docs).unwrap();
        let message = reply.to_message(7);

        group.bench_with_input(
            BenchmarkId::new("parse_batch", batch_size),
            &message,
            |b, message| {
                b.iter(|| {
                    let reply = QueryReply::from_message(message.clone()).unwrap();
                    let mut data: Bytes = reply.documents;
                    for _ in 0..reply.n_returned {
                        black_box(Document::decode_from(&mut data).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_address,
    bench_request_codec,
    bench_reply_decode
);
criterion_main!(benches);
