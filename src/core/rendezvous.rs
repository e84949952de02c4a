//! # Rendezvous: one-shot tagged tokens handed to the leader loop.
//!
//! Both the exit watcher and restart callers hand the leader loop a [`Token`] and then
//! block until that specific token is completed. The token carries its origin
//! ([`TokenKind`]) so the consumer branches on the tag, never on process liveness.
//!
//! ```text
//! watcher  ── signal(Exited) ───────────┐
//!                                        ├──► mpsc ──► Leader::run_forever ── token.complete()
//! restart  ── signal(RestartRequested) ─┘                                       │
//!    ▲                                                                           │
//!    └───────────────────────── oneshot ◄────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Each token is completed at most once (consumed by value)
//! - A dropped token releases its waiter just like a completed one
//! - After [`Rendezvous::close`], queued tokens are dropped and new signals return at once

use tokio::sync::{mpsc, oneshot, Mutex};

/// Origin of a rendezvous token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// The watched leader process terminated.
    Exited,
    /// An external caller asked for a restart.
    RestartRequested,
}

/// Single-use handoff: the producer waits until the consumer completes it.
#[derive(Debug)]
pub(crate) struct Token {
    kind: TokenKind,
    done: oneshot::Sender<()>,
}

impl Token {
    pub(crate) fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Releases the producer waiting on this token.
    pub(crate) fn complete(self) {
        let _ = self.done.send(());
    }
}

/// Outcome seen by a producer once its token is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Released {
    /// The consumer completed the token.
    Completed,
    /// The rendezvous was closed; the token was discarded unhandled.
    Discarded,
}

/// Single-consumer channel of tokens.
#[derive(Debug)]
pub(crate) struct Rendezvous {
    tx: mpsc::UnboundedSender<Token>,
    rx: Mutex<mpsc::UnboundedReceiver<Token>>,
}

impl Rendezvous {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueues a fresh token of `kind` and waits until it is released.
    pub(crate) async fn signal(&self, kind: TokenKind) -> Released {
        let (done, waiter) = oneshot::channel();
        if self.tx.send(Token { kind, done }).is_err() {
            return Released::Discarded;
        }
        match waiter.await {
            Ok(()) => Released::Completed,
            Err(_) => Released::Discarded,
        }
    }

    /// Waits for the next token. Returns `None` once closed and drained.
    pub(crate) async fn next(&self) -> Option<Token> {
        self.rx.lock().await.recv().await
    }

    /// Blocks the consumer until the guard is dropped; tokens keep queueing meanwhile.
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, mpsc::UnboundedReceiver<Token>> {
        self.rx.lock().await
    }

    /// Refuses new tokens and discards every queued one.
    pub(crate) async fn close(&self) {
        let mut rx = self.rx.lock().await;
        rx.close();
        while let Ok(token) = rx.try_recv() {
            drop(token);
        }
    }
}
