use std::env;
use std::io::Read;

use mailforge::config;
use mailforge::types::{EmailAddress, Envelope, MailMessage};
use mailforge::Transport;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal `smtp -f <from> -t <to> [-t <to> ...] [-s host:port]` argument parser.
struct Opt {
    from: EmailAddress,
    to: Vec<EmailAddress>,
    server: String,
}

fn parse_args() -> Result<Opt> {
    let mut from = None;
    let mut to = Vec::new();
    let mut server = "localhost:25".to_string();

    let mut args = env::args().skip(1);
    while let Some(flag) = args.next() {
        let value = args.next().ok_or("missing value after flag")?;
        match flag.as_str() {
            "-f" => from = Some(value.parse()?),
            "-t" => to.push(value.parse()?),
            "-s" => server = value,
            other => return Err(format!("unknown flag {}", other).into()),
        }
    }

    Ok(Opt { from: from.ok_or("missing -f <sender address>")?, to, server })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opt = parse_args()?;
    println!("Type your mail and finish with Ctrl+D:");

    let mut body = Vec::new();
    std::io::stdin().read_to_end(&mut body)?;

    let envelope = Envelope::new(Some(opt.from), opt.to)?;
    let mail = MailMessage::new(envelope, "some_random_id", body);

    let mut connection = config::parse(&format!("smtp://{}", opt.server))?.connect().await?;
    let response = Transport::send(&mut connection, mail).await?;

    println!("Email sent. Response: {:?}", response);
    Ok(())
}
