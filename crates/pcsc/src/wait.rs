//! Card presence wait loops

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use tracing::debug;

use crate::context::Context;
use crate::reader::Reader;
use crate::{Error, Result};

/// Flag polled by a spawned wait between two blocking calls
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Synchronize, return the first reader with a powered card, otherwise
/// block per the context's wait strategy and start over
pub(crate) fn wait_for_card(context: &Context, token: Option<&CancellationToken>) -> Result<Reader> {
    loop {
        if token.is_some_and(CancellationToken::is_cancelled) {
            debug!("Card wait cancelled");
            return Err(Error::Cancelled);
        }

        if let Some(reader) = context
            .list_readers()?
            .into_iter()
            .find(Reader::is_card_present)
        {
            debug!(reader = reader.name(), "Card present");
            return Ok(reader);
        }

        context.block_until_change()?;
    }
}

/// A card wait running on a worker thread
///
/// Cancellation is checked between waits, so it takes effect within one
/// event timeout or poll interval.
#[derive(Debug)]
pub struct CardWait {
    receiver: Receiver<Result<Reader>>,
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl CardWait {
    pub(crate) fn spawn(context: Context) -> Self {
        let (sender, receiver) = bounded(1);
        let token = CancellationToken::new();
        let worker_token = token.clone();

        let thread = thread::spawn(move || {
            let result = wait_for_card(&context, Some(&worker_token));
            // The receiver may have been dropped; nobody is left to tell
            let _ = sender.send(result);
        });

        Self {
            receiver,
            token,
            thread: Some(thread),
        }
    }

    /// Token that cancels this wait
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Channel delivering the single result, for use with `select!`
    pub const fn receiver(&self) -> &Receiver<Result<Reader>> {
        &self.receiver
    }

    /// Take the result if the wait has finished
    pub fn try_result(&self) -> Option<Result<Reader>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::Cancelled)),
        }
    }

    /// Block up to `timeout` for the result
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Reader>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::Cancelled)),
        }
    }

    /// Block until the worker finishes
    pub fn wait(mut self) -> Result<Reader> {
        let result = self.receiver.recv().unwrap_or(Err(Error::Cancelled));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }
}

impl Drop for CardWait {
    fn drop(&mut self) {
        // Detach the worker; it exits at its next cancellation check
        self.token.cancel();
    }
}
