use mailforge::stub::StubTransport;
use mailforge::types::{EmailAddress, Envelope, MailMessage};
use mailforge::Transport;

mailforge::async_test!(positive_stub_accepts_the_message, {
    let mut sender_ok = StubTransport::new_positive();
    let envelope = Envelope::new(
        Some(EmailAddress::new("user@localhost".to_string()).unwrap()),
        vec![EmailAddress::new("root@localhost".to_string()).unwrap()],
    )
    .unwrap();
    let mail = MailMessage::new(envelope, "id", "Hello \u{df}\u{263a} example".to_string().into_bytes());

    Transport::send(&mut sender_ok, mail).await.unwrap();
});

mailforge::async_test!(stub_with_queued_failure_reports_it, {
    let mut sender_ko = StubTransport::new(Err("fail".into()));
    let envelope = Envelope::new(
        Some(EmailAddress::new("user@localhost".to_string()).unwrap()),
        vec![EmailAddress::new("root@localhost".to_string()).unwrap()],
    )
    .unwrap();
    let mail = MailMessage::new(envelope, "id", "Hello \u{df}\u{263a} example".to_string().into_bytes());

    Transport::send(&mut sender_ko, mail).await.unwrap_err();
});
