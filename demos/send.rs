use mailforge::config;
use mailforge::types::{Envelope, MailMessage};
use mailforge::Transport;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

#[tokio::main]
async fn main() -> Result<()> {
    let mut connection = config::parse("smtp://127.0.0.1:2525")?.connect().await?;

    let envelope = Envelope::new(Some("user@localhost".parse()?), vec!["root@localhost".parse()?])?;
    let mail = MailMessage::new(envelope, "demo-send", b"Subject: Hello world\r\n\r\nHello world\r\n".to_vec());

    Transport::send(&mut connection, mail).await?;
    Ok(())
}
