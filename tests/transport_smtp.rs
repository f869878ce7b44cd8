#[cfg(feature = "smtp-transport")]
mod test {
    use mailforge::config;
    use mailforge::types::{EmailAddress, Envelope, MailMessage};
    use mailforge::Transport;

    async fn send_over_a_fresh_connection() {
        let envelope = Envelope::new(
            Some(EmailAddress::new("user@localhost".to_string()).unwrap()),
            vec![EmailAddress::new("root@localhost".to_string()).unwrap()],
        )
        .unwrap();
        let mail = MailMessage::new(
            envelope,
            "id",
            b"From: user@localhost\r\nContent-Type: text/plain\r\n\r\nHello example".to_vec(),
        );

        println!("connecting");
        let mut connection = config::parse("smtp://127.0.0.1:3025").unwrap().connect().await.unwrap();

        println!("sending");
        Transport::send(&mut connection, mail).await.unwrap();
    }

    // Needs a server listening on 127.0.0.1:3025.
    #[cfg(feature = "runtime-tokio")]
    #[tokio::test]
    #[ignore]
    async fn smtp_transport_simple() {
        send_over_a_fresh_connection().await;
    }

    #[cfg(feature = "runtime-async-std")]
    #[async_std::test]
    #[ignore]
    async fn smtp_transport_simple() {
        send_over_a_fresh_connection().await;
    }
}
