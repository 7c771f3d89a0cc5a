use std::fmt;

use tracing::warn;

use crate::error::SessionResult;
use crate::session::Session;

/// Guard for a write transaction started with
/// [`Session::begin_write`].
///
/// Dropping the scope without committing cancels the transaction. A scope
/// only ever ends its own transaction: once that transaction has been
/// committed or cancelled through the session, the scope is inert.
#[must_use = "dropping a WriteScope cancels its transaction"]
pub struct WriteScope {
    session: Session,
    serial: u64,
    done: bool,
}

impl WriteScope {
    pub(crate) fn new(session: Session, serial: u64) -> Self {
        Self {
            session,
            serial,
            done: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Commit and notify listeners. See [`Session::commit`].
    pub fn commit(mut self) -> SessionResult<()> {
        self.done = true;
        self.session.commit_serial(Some(self.serial))
    }

    pub fn cancel(mut self) -> SessionResult<()> {
        self.done = true;
        self.session.cancel_serial(Some(self.serial))
    }
}

impl Drop for WriteScope {
    fn drop(&mut self) {
        if !self.done && self.session.cancel_serial(Some(self.serial)).is_ok() {
            warn!(serial = self.serial, "write scope dropped without commit; cancelled");
        }
    }
}

impl fmt::Debug for WriteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteScope")
            .field("serial", &self.serial)
            .field("done", &self.done)
            .finish()
    }
}
