//! The SMTP/LMTP protocol state machine: connect, capability negotiation,
//! `STARTTLS`, authentication, and the `MAIL`/`RCPT`/`DATA` transaction.

use std::time::Duration;

use log::{debug, info};

use crate::authentication::{Credentials, Mechanism};
use crate::commands::*;
use crate::error::Error;
use crate::extension::{ClientId, Extension, MailBodyParameter, MailParameter, RcptParameter, ServerInfo};
use crate::response::Response;
use crate::smtp::net::{ClientTlsParameters, Connector, NetworkStream};
use crate::stream::SmtpStream;
use crate::types::{EmailAddress, Envelope, MailMessage};
use crate::util::default_client_id;

/// How (and whether) TLS is layered onto the connection.
#[allow(missing_debug_implementations)]
pub enum Security {
    /// No TLS at all.
    None,
    /// Upgrade via `STARTTLS` if the server advertises it; proceed in the
    /// clear otherwise.
    Opportunistic(ClientTlsParameters),
    /// Upgrade via `STARTTLS`; fail the connection if the server does not
    /// advertise it.
    Required(ClientTlsParameters),
    /// Implicit TLS: the socket is wrapped before any SMTP traffic (e.g.
    /// SMTPS on port 465).
    Wrapper(ClientTlsParameters),
}

/// Per-recipient outcome of a completed transaction, together with DSN
/// parameters the caller asked to attach to the `RCPT TO` for that address.
#[derive(Debug, Clone, Default)]
pub struct DsnOptions {
    /// `NOTIFY=` value, e.g. `"SUCCESS,FAILURE"`.
    pub notify: Option<String>,
    /// `ORCPT=` value, the original recipient in xtext form.
    pub orcpt: Option<String>,
    /// `RET=` value on `MAIL FROM`, `"FULL"` or `"HDRS"`.
    pub ret: Option<&'static str>,
    /// `ENVID=` value on `MAIL FROM`.
    pub envid: Option<String>,
}

/// The result of sending one message: which recipients were accepted, which
/// were rejected (with the server's response), and the final status line.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Recipients the server accepted.
    pub accepted: Vec<EmailAddress>,
    /// Recipients the server rejected, with the rejecting response.
    pub rejected: Vec<(EmailAddress, Response)>,
    /// The response to the final `DATA` terminator (SMTP), or the last
    /// per-recipient response read (LMTP).
    pub response: Response,
}

/// Builds an [`SmtpConnection`].
#[allow(missing_debug_implementations)]
pub struct SmtpConnectionBuilder {
    host: String,
    port: u16,
    hello_name: ClientId,
    security: Security,
    credentials: Option<Credentials>,
    authentication_mechanism: Option<Vec<Mechanism>>,
    force_set_auth: bool,
    smtp_utf8: bool,
    pipelining: bool,
    timeout: Option<Duration>,
    lmtp: bool,
}

impl SmtpConnectionBuilder {
    /// Starts building a connection to `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SmtpConnectionBuilder {
            host: host.into(),
            port,
            hello_name: default_client_id(None),
            security: Security::None,
            credentials: None,
            authentication_mechanism: None,
            force_set_auth: false,
            smtp_utf8: false,
            pipelining: true,
            timeout: Some(Duration::from_secs(60)),
            lmtp: false,
        }
    }

    /// Sets the `EHLO`/`LHLO` client identifier.
    pub fn hello_name(mut self, hello_name: ClientId) -> Self {
        self.hello_name = hello_name;
        self
    }

    /// Sets the TLS policy.
    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets SASL credentials to authenticate with after `EHLO`.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Restricts (or forces) the SASL mechanisms tried, instead of picking
    /// the strongest one the server advertises.
    pub fn authentication_mechanism(mut self, mechanisms: Vec<Mechanism>, force: bool) -> Self {
        self.authentication_mechanism = Some(mechanisms);
        self.force_set_auth = force;
        self
    }

    /// Requests `SMTPUTF8` for envelopes that need it, when the server
    /// supports the extension.
    pub fn smtp_utf8(mut self, smtp_utf8: bool) -> Self {
        self.smtp_utf8 = smtp_utf8;
        self
    }

    /// Enables or disables command pipelining when the server advertises
    /// `PIPELINING`.
    pub fn pipelining(mut self, pipelining: bool) -> Self {
        self.pipelining = pipelining;
        self
    }

    /// Sets the per-operation timeout, or `None` to disable timeouts.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Speaks LMTP (`LHLO`, one `DATA` response per accepted recipient)
    /// instead of SMTP.
    pub fn lmtp(mut self, lmtp: bool) -> Self {
        self.lmtp = lmtp;
        self
    }

    /// The port this builder will connect to.
    pub fn port_ref(&self) -> u16 {
        self.port
    }

    /// The TLS policy this builder will use.
    pub fn security_ref(&self) -> &Security {
        &self.security
    }

    /// The credentials this builder will authenticate with, if any.
    pub fn credentials_ref(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Resolves the host, connects, negotiates `STARTTLS` and authentication,
    /// and returns a ready-to-use connection.
    pub async fn connect(self) -> Result<SmtpConnection, Error> {
        let addrs = crate::smtp::net::resolve(&self.host, self.port)
            .await
            .map_err(|_| Error::Resolution)?;
        let addr = addrs.first().ok_or(Error::Resolution)?;

        let implicit_tls = matches!(self.security, Security::Wrapper(_));
        let tls_params_for_connect = match &self.security {
            Security::Wrapper(params) => Some(params),
            _ => None,
        };

        let network_stream = NetworkStream::connect(addr, self.timeout, tls_params_for_connect)
            .await
            .map_err(Error::Io)?;

        debug!("connection established to {}:{}", self.host, self.port);

        let mut stream = SmtpStream::new(network_stream);

        // Read the server greeting (220) before any command is sent.
        stream.read_response().await?;

        let mut connection = SmtpConnection {
            stream: Some(stream),
            server_info: None,
            hello_name: self.hello_name,
            pipelining: self.pipelining,
            smtp_utf8: self.smtp_utf8,
            lmtp: self.lmtp,
            host: self.host,
            encrypted: implicit_tls,
        };

        connection.ehlo().await?;

        if !implicit_tls {
            connection.try_tls(self.security).await?;
        }

        if let Some(credentials) = self.credentials {
            connection
                .authenticate(credentials, self.authentication_mechanism, self.force_set_auth)
                .await?;
        }

        Ok(connection)
    }
}

/// A live, authenticated SMTP or LMTP connection ready to send one or more
/// messages.
#[allow(missing_debug_implementations)]
pub struct SmtpConnection {
    stream: Option<SmtpStream<NetworkStream>>,
    server_info: Option<ServerInfo>,
    hello_name: ClientId,
    pipelining: bool,
    smtp_utf8: bool,
    lmtp: bool,
    host: String,
    encrypted: bool,
}

impl SmtpConnection {
    fn stream_mut(&mut self) -> Result<&mut SmtpStream<NetworkStream>, Error> {
        self.stream.as_mut().ok_or(Error::Client("connection already closed"))
    }

    fn supports(&self, feature: Extension) -> bool {
        self.server_info.as_ref().map(|info| info.supports_feature(feature)).unwrap_or(false)
    }

    /// Whether the transport stream is currently carrying TLS.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    async fn ehlo(&mut self) -> Result<(), Error> {
        let client_id = self.hello_name.clone();
        let lmtp = self.lmtp;
        let response = self.stream_mut()?.ehlo(client_id, lmtp).await?;
        let server_info = ServerInfo::from_response(&response)?;
        debug!("server {}", server_info);
        self.server_info = Some(server_info);
        Ok(())
    }

    async fn try_tls(&mut self, security: Security) -> Result<(), Error> {
        match security {
            Security::None | Security::Wrapper(_) => Ok(()),
            Security::Opportunistic(params) if !self.supports(Extension::StartTls) => {
                let _ = params;
                Ok(())
            }
            Security::Required(_) if !self.supports(Extension::StartTls) => {
                Err(Error::Client("server does not support STARTTLS"))
            }
            Security::Opportunistic(params) | Security::Required(params) => {
                self.stream_mut()?.command(StarttlsCommand).await?;
                let raw = self.stream.take().expect("stream present").into_inner();
                let upgraded = raw.upgrade_tls(&params).await.map_err(Error::Io)?;
                self.stream = Some(SmtpStream::new(upgraded));
                self.encrypted = true;
                debug!("connection to {} encrypted", self.host);
                self.ehlo().await
            }
        }
    }

    async fn authenticate(
        &mut self,
        credentials: Credentials,
        restrict_to: Option<Vec<Mechanism>>,
        force: bool,
    ) -> Result<(), Error> {
        let candidates = restrict_to.unwrap_or_else(|| {
            vec![Mechanism::CramMd5, Mechanism::Plain, Mechanism::Login, Mechanism::Xoauth2]
        });

        let server_info = self.server_info.as_ref().ok_or(Error::Client("EHLO not yet sent"))?;

        let mechanism = if force {
            candidates.into_iter().next().ok_or(Error::Client("no authentication mechanism given"))?
        } else {
            candidates
                .into_iter()
                .find(|m| server_info.supports_auth_mechanism(*m))
                .ok_or(Error::Client("server does not support any configured AUTH mechanism"))?
        };

        let stream = self.stream_mut()?;
        let mut response = stream.command(AuthCommand::new(mechanism, credentials.clone(), None)?).await?;
        while response.has_code(334) {
            response = stream
                .command(AuthCommand::new_from_response(mechanism, credentials.clone(), &response)?)
                .await?;
        }
        info!("authenticated with {}", mechanism);
        Ok(())
    }

    /// Sends `mail`'s envelope and body over this connection.
    pub async fn send(&mut self, mail: MailMessage) -> Result<SendOutcome, Error> {
        self.send_with_dsn(mail, None).await
    }

    /// Sends `mail`, attaching the given DSN parameters to `MAIL FROM`/`RCPT TO`
    /// when the server advertises the `DSN` extension.
    pub async fn send_with_dsn(&mut self, mail: MailMessage, dsn: Option<DsnOptions>) -> Result<SendOutcome, Error> {
        let envelope = mail.envelope().clone();
        let message_id = mail.message_id().to_string();
        let message_size = mail.message_size();

        if let Some(size) = message_size {
            if let Some(max) = self.server_info.as_ref().and_then(ServerInfo::max_message_size) {
                if max > 0 && size > max {
                    return Err(Error::MessageTooLarge { size, max });
                }
            }
        }

        let mut mail_params = Vec::new();
        if self.supports(Extension::EightBitMime) {
            mail_params.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }
        if self.smtp_utf8 && envelope.needs_smtputf8() && self.supports(Extension::SmtpUtfEight) {
            mail_params.push(MailParameter::SmtpUtfEight);
        }
        if let Some(size) = message_size {
            if self.supports(Extension::Size(None)) {
                mail_params.push(MailParameter::Size(size));
            }
        }
        let use_dsn = dsn.is_some() && self.supports(Extension::Dsn);
        if use_dsn {
            if let Some(d) = &dsn {
                if let Some(ret) = d.ret {
                    mail_params.push(MailParameter::Ret(ret));
                }
                if let Some(envid) = &d.envid {
                    mail_params.push(MailParameter::Envid(envid.clone()));
                }
            }
        }

        let rcpt_params = |addr: &EmailAddress| -> Vec<RcptParameter> {
            let mut params = Vec::new();
            if use_dsn {
                if let Some(d) = &dsn {
                    if let Some(notify) = &d.notify {
                        params.push(RcptParameter::Other { keyword: "NOTIFY".to_string(), value: Some(notify.clone()) });
                    }
                    if let Some(orcpt) = &d.orcpt {
                        let _ = addr;
                        params.push(RcptParameter::Other { keyword: "ORCPT".to_string(), value: Some(orcpt.clone()) });
                    }
                }
            }
            params
        };

        let use_pipelining = self.pipelining && self.supports(Extension::Pipelining) && !self.lmtp;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        if use_pipelining {
            let stream = self.stream_mut()?;
            stream.send_command(MailCommand::new(envelope.from().cloned(), mail_params)).await?;
            for to in envelope.to() {
                stream.send_command(RcptCommand::new(to.clone(), rcpt_params(to))).await?;
            }
            stream.read_response().await?;
            for to in envelope.to() {
                match stream.read_raw_response().await {
                    Ok(response) if is_positive(&response) => accepted.push(to.clone()),
                    Ok(response) => rejected.push((to.clone(), response)),
                    Err(err) => return Err(err),
                }
            }
        } else {
            let stream = self.stream_mut()?;
            stream.command(MailCommand::new(envelope.from().cloned(), mail_params)).await?;
            for to in envelope.to() {
                match stream.command(RcptCommand::new(to.clone(), rcpt_params(to))).await {
                    Ok(_) => accepted.push(to.clone()),
                    Err(Error::Permanent(response)) | Err(Error::Transient(response)) => {
                        rejected.push((to.clone(), response))
                    }
                    Err(err) => return Err(err),
                }
                debug!("{}: to=<{}>", message_id, to);
            }
        }

        if accepted.is_empty() {
            return Err(Error::AllRecipientsRejected(rejected));
        }

        let stream = self.stream_mut()?;
        stream.command(DataCommand).await?;

        if self.lmtp {
            stream.send_data(mail.message()).await?;
            let mut last = None;
            for to in accepted.clone().iter() {
                match stream.read_raw_response().await {
                    Ok(response) if is_positive(&response) => last = Some(response),
                    Ok(response) => {
                        accepted.retain(|a| a != to);
                        rejected.push((to.clone(), response));
                    }
                    Err(err) => return Err(err),
                }
            }
            let response = last.ok_or(Error::Client("no LMTP per-recipient response received"))?;
            debug!("{}: status=sent", message_id);
            Ok(SendOutcome { accepted, rejected, response })
        } else {
            let response = stream.message(mail.message()).await?;
            debug!(
                "{}: status=sent ({})",
                message_id,
                response.message.first().map(String::as_str).unwrap_or("no response")
            );
            Ok(SendOutcome { accepted, rejected, response })
        }
    }

    /// Sends `QUIT` and consumes the connection.
    pub async fn quit(mut self) -> Result<(), Error> {
        if let Some(stream) = self.stream.as_mut() {
            stream.command(QuitCommand).await?;
        }
        self.stream = None;
        Ok(())
    }
}

fn is_positive(response: &Response) -> bool {
    matches!(
        response.code.severity,
        crate::response::Severity::PositiveCompletion | crate::response::Severity::PositiveIntermediate
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn send_outcome_tracks_rejections() {
        let outcome = SendOutcome {
            accepted: vec![],
            rejected: vec![],
            response: Response::new(
                crate::response::Code::new(
                    crate::response::Severity::PositiveCompletion,
                    crate::response::Category::Mail,
                    crate::response::Detail::Zero,
                ),
                vec!["ok".to_string()],
            ),
        };
        assert!(outcome.accepted.is_empty());
    }
}
