use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mailforge::config;
use mailforge::pool::{Config as PoolConfig, Pool};
use mailforge::types::{EmailAddress, Envelope, MailMessage};
use mailforge::Transport;

const SERVER: &str = "smtp://127.0.0.1:2525";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn sample_mail() -> MailMessage {
    let envelope = Envelope::new(
        Some(EmailAddress::new("user@localhost".to_string()).unwrap()),
        vec![EmailAddress::new("root@localhost".to_string()).unwrap()],
    )
    .unwrap();
    MailMessage::new(
        envelope,
        "id",
        b"From: user@localhost\r\nContent-Type: text/plain\r\n\r\nHello example".to_vec(),
    )
}

fn bench_simple_send(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("send email over a fresh connection", move |b| {
        b.iter(|| {
            let result = black_box(rt.block_on(async {
                let mut connection = config::parse(SERVER).unwrap().connect().await?;
                Transport::send(&mut connection, sample_mail()).await
            }));
            result.unwrap();
        })
    });
}

fn bench_pooled_send(c: &mut Criterion) {
    let rt = runtime();
    let pool = Pool::new(PoolConfig::default(), || async { config::parse(SERVER).unwrap().connect().await });

    c.bench_function("send email through a connection pool", move |b| {
        b.iter(|| {
            let result = black_box(rt.block_on(async { pool.send_mail(sample_mail()).await }));
            result.unwrap();
        })
    });
}

criterion_group!(benches, bench_simple_send, bench_pooled_send);
criterion_main!(benches);
