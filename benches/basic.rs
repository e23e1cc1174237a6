use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use sim7600_at::{classify, AtCommand, AtEngine, InProcessLock, MockSerialPort, Transport};
use std::sync::Arc;
use std::time::Duration;

pub fn bench_classify(c: &mut Criterion) {
    let lines = [
        "AT+CMGL=\"ALL\"",
        "+CMGL: 1,\"REC READ\",\"+15550100\",,\"24/03/01,10:00:00+04\"",
        "OK thanks, see you",
        "",
        "+CME ERROR: 10",
        "OK",
    ];
    c.bench_function("classify_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(classify(black_box(line), "OK"));
            }
        })
    });
}

pub fn bench_send_mock(c: &mut Criterion) {
    let mut mock = MockSerialPort::new("BENCH0");
    mock.always_reply_to(b"AT+CSQ\r\n", b"AT+CSQ\r\n+CSQ: 23,99\r\n\r\nOK\r\n");
    let transport = Transport::from_adapter(mock, 115_200);
    let engine = AtEngine::with_lock(transport, Arc::new(InProcessLock::new("BENCH0")));

    c.bench_function("send_mock_csq", |b| {
        b.iter(|| black_box(engine.send(AtCommand::new("AT+CSQ"))).is_ok())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_classify, bench_send_mock
}
criterion_main!(benches);
