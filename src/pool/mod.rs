//! A pooled, rate-limited SMTP dispatcher: up to `max_connections` worker
//! tasks each reuse one connection for up to `max_messages` sends, pulling
//! from a shared queue and requeuing on connection failure.
//!
//! Generalised from the teacher's single-client reuse counter
//! (`ConnectionReuseParameters`/`InnerClient::can_be_reused`) to a pool of N
//! such clients sharing one queue.

pub mod queue;
pub mod rate_limiter;
pub mod resource;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::{mpsc, oneshot};
use futures::lock::Mutex as AsyncMutex;
use futures::StreamExt;
use log::{debug, info, warn};

pub use queue::PoolQueueEntry;
use rate_limiter::RateLimiter;
use resource::PoolResource;

use crate::error::Error;
use crate::smtp::connection::{SendOutcome, SmtpConnection};
use crate::types::{Envelope, MailMessage};

/// Pool tuning knobs (spec defaults: 5 connections, 100 messages/connection,
/// 1000 messages/second, unbounded requeues).
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum simultaneously-live connections.
    pub max_connections: usize,
    /// Maximum messages sent over one connection before it is retired.
    pub max_messages: usize,
    /// Maximum dispatches per `rate_delta` window; `0` disables throttling.
    pub rate_limit: usize,
    /// The rate limiter's sliding window length.
    pub rate_delta: Duration,
    /// Maximum times a failed send is requeued; negative means unbounded.
    pub max_requeues: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_connections: 5,
            max_messages: 100,
            rate_limit: 1000,
            rate_delta: Duration::from_millis(1000),
            max_requeues: -1,
        }
    }
}

type ConnectFn = dyn Fn() -> Pin<Box<dyn Future<Output = Result<SmtpConnection, Error>> + Send>> + Send + Sync;

struct Dispatch {
    entry: PoolQueueEntry,
    respond: oneshot::Sender<Result<SendOutcome, Error>>,
}

/// A running pool. Dropping the last clone of the pool's sender (by dropping
/// every `Pool` handle) lets the worker tasks drain and exit.
#[allow(missing_debug_implementations)]
pub struct Pool {
    sender: mpsc::UnboundedSender<Dispatch>,
    live: Arc<AtomicUsize>,
    config: Config,
}

impl Pool {
    /// Starts `config.max_connections` worker tasks. `connect` is called
    /// lazily, once per worker whenever that worker needs a fresh connection
    /// (on first use, after `max_messages`, or after a failure).
    pub fn new<F, Fut>(config: Config, connect: F) -> Pool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SmtpConnection, Error>> + Send + 'static,
    {
        let connect: Arc<ConnectFn> = Arc::new(move || Box::pin(connect()));
        let (sender, receiver) = mpsc::unbounded::<Dispatch>();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let live = Arc::new(AtomicUsize::new(0));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_delta));

        for worker in 0..config.max_connections.max(1) {
            let receiver = receiver.clone();
            let connect = connect.clone();
            let rate_limiter = rate_limiter.clone();
            let live = live.clone();
            let requeue_sender = sender.clone();
            let max_messages = config.max_messages;
            let max_requeues = config.max_requeues;

            crate::runtime::spawn(async move {
                run_worker(worker, receiver, connect, rate_limiter, live, requeue_sender, max_messages, max_requeues).await;
            });
        }

        Pool { sender, live, config }
    }

    /// Enqueues `envelope`/`message` and waits for the completed transaction.
    pub async fn send(&self, envelope: Envelope, message_id: impl Into<String>, message: Vec<u8>) -> Result<SendOutcome, Error> {
        let (respond, await_result) = oneshot::channel();
        let entry = PoolQueueEntry::new(envelope, message_id, message);
        self.sender
            .unbounded_send(Dispatch { entry, respond })
            .map_err(|_| Error::Client("pool has shut down"))?;
        await_result.await.map_err(|_| Error::Client("pool worker dropped before responding"))?
    }

    /// Drains `mail`'s body into memory and enqueues it, as [`Pool::send`].
    pub async fn send_mail(&self, mail: MailMessage) -> Result<SendOutcome, Error> {
        let (envelope, message_id, bytes) = mail.into_buffered().await.map_err(Error::Io)?;
        self.send(envelope, message_id, bytes).await
    }

    /// Number of currently-connected resources across all workers.
    pub fn live_resources(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// `true` once no resources are live and nothing is queued; mirrors the
    /// spec's `clear` event without a separate notification channel.
    pub fn is_clear(&self) -> bool {
        self.live_resources() == 0
    }

    /// The pool's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    id: usize,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<Dispatch>>>,
    connect: Arc<ConnectFn>,
    rate_limiter: Arc<RateLimiter>,
    live: Arc<AtomicUsize>,
    requeue_sender: mpsc::UnboundedSender<Dispatch>,
    max_messages: usize,
    max_requeues: i64,
) {
    let mut resource: Option<PoolResource> = None;

    loop {
        let dispatch = {
            let mut receiver = receiver.lock().await;
            receiver.next().await
        };
        let Dispatch { mut entry, respond } = match dispatch {
            Some(dispatch) => dispatch,
            None => break,
        };

        if resource.as_ref().map(|r| r.is_exhausted(max_messages)).unwrap_or(false) {
            debug!("pool worker {}: retiring connection after {} messages", id, max_messages);
            resource = None;
            live.fetch_sub(1, Ordering::SeqCst);
        }

        if resource.is_none() {
            match connect().await {
                Ok(connection) => {
                    live.fetch_add(1, Ordering::SeqCst);
                    resource = Some(PoolResource::new(connection));
                }
                Err(err) => {
                    warn!("pool worker {}: connect failed: {}", id, err);
                    requeue_or_fail(entry, respond, max_requeues, &requeue_sender);
                    continue;
                }
            }
        }

        rate_limiter.acquire().await;

        let res = resource.as_mut().expect("resource established above");
        let mail = entry.to_mail_message();
        match res.send(mail).await {
            Ok(outcome) => {
                let _ = respond.send(Ok(outcome));
            }
            Err(err) => {
                warn!("pool worker {}: send failed, dropping connection: {}", id, err);
                resource = None;
                live.fetch_sub(1, Ordering::SeqCst);
                entry.requeue_attempts += 1;
                requeue_or_fail(entry, respond, max_requeues, &requeue_sender);
            }
        }
    }

    if resource.is_some() {
        live.fetch_sub(1, Ordering::SeqCst);
    }
    info!("pool worker {} exiting", id);
}

fn requeue_or_fail(
    entry: PoolQueueEntry,
    respond: oneshot::Sender<Result<SendOutcome, Error>>,
    max_requeues: i64,
    sender: &mpsc::UnboundedSender<Dispatch>,
) {
    let exhausted = max_requeues >= 0 && entry.requeue_attempts > max_requeues;
    if exhausted {
        let _ = respond.send(Err(Error::Client("exceeded maximum requeue attempts")));
        return;
    }
    if sender.unbounded_send(Dispatch { entry, respond }).is_err() {
        // Pool shut down between the failure and the requeue; nothing to report to.
    }
}
