/// Client surfaces: single connections, cursors and replica pairs
///
/// [`Connection`] talks to one server and [`PairedClient`] routes every call
/// to whichever side of a replica pair is master. Both implement
/// [`DbClient`], so code written against the trait runs unchanged on either.
pub mod commands;
pub mod connection;
pub mod cursor;
pub mod paired;

pub use commands::{DbCommands, MasterStatus};
pub use connection::Connection;
pub use cursor::Cursor;
pub use paired::{MasterState, PairedClient, Side};

use crate::core::{Document, Query, QueryOptions};
use crate::error::TandemResult;
use std::time::Duration;

/// Query surface shared by single connections and replica pairs
pub trait DbClient {
    /// Send a query and return a cursor over its results.
    ///
    /// * `ns` - `<database>.<collection>[.<sub>]*`
    /// * `n_to_return` - batch size hint, 0 lets the server choose
    /// * `n_to_skip` - start with the nth matching document
    /// * `fields` - projection; all fields when `None`
    ///
    /// A query that matches nothing yields an empty cursor, not an error.
    fn query(
        &mut self,
        ns: &str,
        query: &Query,
        n_to_return: i32,
        n_to_skip: i32,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Cursor<'_>>;

    /// First matching document, if any. Error documents are returned as
    /// [`crate::TandemError::RemoteQuery`].
    fn find_one(
        &mut self,
        ns: &str,
        query: &Query,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Option<Document>>;
}

/// Dial and reconnect settings for a [`Connection`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// Re-dial a failed connection on the next operation
    pub auto_reconnect: bool,
    /// Minimum time between two reconnect attempts
    pub reconnect_interval: Duration,
    pub connect_timeout: Duration,
    /// Read/write timeout on the socket; `None` blocks indefinitely
    pub socket_timeout: Option<Duration>,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self {
            auto_reconnect: false,
            reconnect_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            socket_timeout: None,
        }
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.socket_timeout = timeout;
        self
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Master probing behaviour of a [`PairedClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct PairOptions {
    /// How many times both sides are probed before giving up
    pub probe_rounds: u32,
    /// Pause between probe rounds
    pub probe_retry_delay: Duration,
}

impl PairOptions {
    pub fn new() -> Self {
        Self {
            probe_rounds: 2,
            probe_retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_probe_rounds(mut self, rounds: u32) -> Self {
        self.probe_rounds = rounds;
        self
    }

    pub fn with_probe_retry_delay(mut self, delay: Duration) -> Self {
        self.probe_retry_delay = delay;
        self
    }
}

impl Default for PairOptions {
    fn default() -> Self {
        Self::new()
    }
}
