#[cfg(feature = "sendmail-transport")]
mod test {
    use mailforge::sendmail::SendmailTransport;
    use mailforge::types::{EmailAddress, Envelope, MailMessage};
    use mailforge::Transport;

    mailforge::async_test!(sendmail_transport_simple, {
        let mut sender = SendmailTransport::new_with_command("/bin/true");
        let envelope = Envelope::new(
            Some(EmailAddress::new("user@localhost".to_string()).unwrap()),
            vec![EmailAddress::new("root@localhost".to_string()).unwrap()],
        )
        .unwrap();
        let mail = MailMessage::new(envelope, "id", "Hello \u{df}\u{263a} example".to_string().into_bytes());

        let result = Transport::send(&mut sender, mail).await;
        println!("{:?}", result);
        assert!(result.is_ok());
    });
}
