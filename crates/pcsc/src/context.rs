//! Resource manager context

use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::backend::{CardHandle, ContextId, ResourceManager};
use crate::card::Card;
use crate::config::{ClientConfig, Protocol, Protocols, ShareMode, WaitStrategy};
#[cfg(unix)]
use crate::config::Scope;
use crate::reader::Reader;
use crate::table::ReaderStateTable;
use crate::wait::{self, CardWait};
use crate::{Error, Result};

/// State shared by every handle of one context
struct Session {
    /// `None` once the context has been released
    backend: Option<Box<dyn ResourceManager>>,
    id: ContextId,
    table: ReaderStateTable,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            match backend.release_context(self.id) {
                Ok(()) => debug!(context = %self.id, "Released context on drop"),
                Err(e) => debug!(context = %self.id, error = %e, "Failed to release context on drop"),
            }
        }
    }
}

/// A session with the smart card resource manager
///
/// Clones share the same connection; operations on one context are
/// serialized. Dropping the last clone releases the context if
/// [`release`](Self::release) was never called.
#[derive(Clone)]
pub struct Context {
    session: Arc<Mutex<Session>>,
    config: Arc<ClientConfig>,
}

impl Context {
    /// Connect to the daemon socket and establish a context in `scope`
    #[cfg(unix)]
    pub fn establish(scope: Scope) -> Result<Self> {
        Self::establish_with_config(ClientConfig::default().with_scope(scope))
    }

    /// Connect to the daemon described by `config` and establish a context
    #[cfg(unix)]
    pub fn establish_with_config(config: ClientConfig) -> Result<Self> {
        let client = crate::PcscLiteClient::connect_with_config(&config)?;
        Self::with_backend(client, config)
    }

    /// Establish a context through an arbitrary backend
    pub fn with_backend<R>(mut backend: R, config: ClientConfig) -> Result<Self>
    where
        R: ResourceManager + 'static,
    {
        let id = backend.establish_context(config.scope)?;
        Ok(Self {
            session: Arc::new(Mutex::new(Session {
                backend: Some(Box::new(backend)),
                id,
                table: ReaderStateTable::new(),
            })),
            config: Arc::new(config),
        })
    }

    /// Context identifier issued by the resource manager
    pub fn id(&self) -> ContextId {
        self.session.lock().id
    }

    /// Configuration this context was created with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether [`release`](Self::release) has been called
    pub fn is_released(&self) -> bool {
        self.session.lock().backend.is_none()
    }

    /// Release the context and close the connection
    ///
    /// Every later operation on this context, its readers and cards fails
    /// with [`Error::ContextReleased`].
    pub fn release(&self) -> Result<()> {
        let mut session = self.session.lock();
        let mut backend = session.backend.take().ok_or(Error::ContextReleased)?;
        backend.release_context(session.id)
    }

    /// Run `op` against the backend, failing if the context was released
    pub(crate) fn with_backend_mut<T>(
        &self,
        op: impl FnOnce(&mut dyn ResourceManager, ContextId) -> Result<T>,
    ) -> Result<T> {
        let mut session = self.session.lock();
        let id = session.id;
        let backend = session.backend.as_mut().ok_or(Error::ContextReleased)?;
        op(backend.as_mut(), id)
    }

    /// Refresh the reader-state table and snapshot every populated entry
    pub fn list_readers(&self) -> Result<Vec<Reader>> {
        let mut session = self.session.lock();
        let Session { backend, table, .. } = &mut *session;
        let backend = backend.as_mut().ok_or(Error::ContextReleased)?;

        let count = backend.sync_reader_states(table)?;
        trace!(count, "Listed readers");
        Ok(table
            .entries()
            .iter()
            .map(|entry| Reader::new(*entry, self.clone()))
            .collect())
    }

    /// Readers currently holding a powered card
    pub fn list_readers_with_card(&self) -> Result<Vec<Reader>> {
        let mut readers = self.list_readers()?;
        readers.retain(Reader::is_card_present);
        Ok(readers)
    }

    /// Look up a reader by name
    pub fn reader(&self, name: &str) -> Result<Reader> {
        self.list_readers()?
            .into_iter()
            .find(|reader| reader.name() == name)
            .ok_or(Error::NoReaderAvailable)
    }

    /// Block until some reader holds a powered card
    ///
    /// An empty reader table is not an error; the loop keeps waiting for a
    /// reader to appear.
    pub fn wait_for_card_present(&self) -> Result<Reader> {
        wait::wait_for_card(self, None)
    }

    /// Run [`wait_for_card_present`](Self::wait_for_card_present) on a
    /// worker thread
    pub fn spawn_wait_for_card(&self) -> CardWait {
        CardWait::spawn(self.clone())
    }

    /// Ask the resource manager to abort a blocking call on this context
    pub fn cancel(&self) -> Result<()> {
        self.with_backend_mut(|backend, id| backend.cancel(id))
    }

    /// Connect to the card in `reader`
    pub(crate) fn connect(
        &self,
        reader: &[u8],
        share_mode: ShareMode,
        preferred: Protocols,
    ) -> Result<(CardHandle, Protocol)> {
        self.with_backend_mut(|backend, id| backend.connect(id, reader, share_mode, preferred))
    }

    /// Open a [`Card`] on the reader named `reader`
    pub fn connect_card(&self, reader: &str) -> Result<Card> {
        self.reader(reader)?.connect()
    }

    /// Block until the reader table may have changed, per the wait strategy
    pub(crate) fn block_until_change(&self) -> Result<()> {
        match self.config.wait_strategy {
            WaitStrategy::Event { timeout } => {
                match self.with_backend_mut(|backend, _| backend.wait_reader_state_change(timeout)) {
                    Ok(()) | Err(Error::Timeout { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            WaitStrategy::Poll { interval } => {
                thread::sleep(interval);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Context");
        // The session may be held by the caller, e.g. while logging from a wait
        match self.session.try_lock() {
            Some(session) => debug
                .field("id", &session.id)
                .field("released", &session.backend.is_none())
                .field("readers", &session.table),
            None => debug.field("session", &"<locked>"),
        };
        debug.finish()
    }
}
