//! The sendmail transport pipes a composed message to a local
//! `sendmail`-compatible binary: `<command> -i -f <from> <to...>`, with the
//! serialized message on stdin. Exit code 0 is success; exit code 127 is
//! reported distinctly as "command not found."

pub mod error;

use std::process::{Command, Stdio};

use log::info;

use crate::sendmail::error::{Error, SendmailResult};
use crate::types::MailMessage;

/// Spawns a `sendmail`-compatible command per message.
#[derive(Debug)]
pub struct SendmailTransport {
    command: String,
}

impl Default for SendmailTransport {
    fn default() -> Self {
        SendmailTransport::new()
    }
}

impl SendmailTransport {
    /// Creates a transport invoking the default `/usr/sbin/sendmail`.
    pub fn new() -> SendmailTransport {
        SendmailTransport { command: "/usr/sbin/sendmail".to_string() }
    }

    /// Creates a transport invoking `command` instead of the default binary.
    pub fn new_with_command(command: impl Into<String>) -> SendmailTransport {
        SendmailTransport { command: command.into() }
    }

    /// Drains `mail`, spawns the configured command with `-i -f <from>
    /// <to...>`, writes the message to its stdin, and waits for it to exit.
    pub async fn send(&mut self, mail: MailMessage) -> SendmailResult {
        let command = self.command.clone();
        let (envelope, message_id, bytes) = mail.into_buffered().await?;

        let from = envelope.from().map(ToString::to_string).unwrap_or_else(|| "\"\"".to_string());
        let to: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();

        crate::runtime::spawn_blocking(move || -> SendmailResult {
            let mut child = Command::new(&command)
                .arg("-i")
                .arg("-f")
                .arg(&from)
                .args(&to)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => Error::Client(format!("{} not found", command)),
                    _ => Error::Io(err),
                })?;

            {
                use std::io::Write;
                let stdin = child.stdin.as_mut().ok_or_else(|| Error::Client("child process stdin unavailable".to_string()))?;
                stdin.write_all(&bytes)?;
            }

            let output = child.wait_with_output()?;
            info!("{}: sendmail exited with {}", message_id, output.status);

            match output.status.code() {
                Some(0) => Ok(()),
                Some(127) => Err(Error::Client(format!("{} command not found", command))),
                _ => Err(Error::Client(String::from_utf8(output.stderr)?)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_uses_usr_sbin_sendmail() {
        let transport = SendmailTransport::new();
        assert_eq!(transport.command, "/usr/sbin/sendmail");
    }

    #[test]
    fn custom_command_is_honored() {
        let transport = SendmailTransport::new_with_command("/bin/cat");
        assert_eq!(transport.command, "/bin/cat");
    }
}
