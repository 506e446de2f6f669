/// A connection to a single server
///
/// Tracks a sticky failure flag: once a dial or exchange fails, every later
/// operation fails immediately unless `auto_reconnect` is set, in which case
/// the next operation re-dials, at most once per reconnect interval.
use super::cursor::Cursor;
use super::{ConnectionOptions, DbClient};
use crate::core::{Address, Document, Query, QueryOptions};
use crate::error::{TandemError, TandemResult};
use crate::protocol::{Message, MessagingPort, QueryReply, QueryRequest};
use crate::utils::{self, format_duration};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Connection {
    port: Option<MessagingPort>,
    remote: Option<Address>,
    /// Server string given to `connect`, kept for reconnects
    server_address: String,
    failed: bool,
    last_reconnect_try: Option<Instant>,
    options: ConnectionOptions,
}

impl Connection {
    /// Unconnected connection
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            port: None,
            remote: None,
            server_address: String::new(),
            failed: false,
            last_reconnect_try: None,
            options,
        }
    }

    /// Resolve and dial `server` (`host[:port]` or a socket path).
    ///
    /// On failure the connection is marked failed. With `auto_reconnect` it
    /// stays usable and later operations retry the same server.
    pub fn connect(&mut self, server: &str) -> TandemResult<()> {
        self.server_address = server.to_string();
        self.port = None;

        let result = utils::parse_server(server)
            .and_then(|(host, port)| Address::endpoint(&host, port))
            .and_then(|addr| {
                let dialed = MessagingPort::connect(
                    &addr,
                    self.options.connect_timeout,
                    self.options.socket_timeout,
                );
                self.remote = Some(addr);
                dialed.map_err(|e| TandemError::connection(server, e))
            });

        match result {
            Ok(port) => {
                info!("Connected to {} ({})", server, port.remote());
                self.port = Some(port);
                self.failed = false;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", server, e);
                self.failed = true;
                if self.options.auto_reconnect {
                    self.last_reconnect_try = Some(Instant::now());
                }
                Err(e)
            }
        }
    }

    /// Server string this connection dials
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    /// Resolved address of the last dial attempt
    pub fn remote(&self) -> Option<&Address> {
        self.remote.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Gate run before every operation
    fn check_connection(&mut self) -> TandemResult<()> {
        if !self.failed {
            return Ok(());
        }

        if !self.options.auto_reconnect {
            return Err(TandemError::connection(
                &self.server_address,
                "connection previously failed",
            ));
        }

        let now = Instant::now();
        if let Some(last) = self.last_reconnect_try {
            if now.duration_since(last) < self.options.reconnect_interval {
                return Err(TandemError::connection(
                    &self.server_address,
                    format!(
                        "reconnect attempted less than {} ago",
                        format_duration(self.options.reconnect_interval)
                    ),
                ));
            }
        }
        self.last_reconnect_try = Some(now);

        info!("Trying to reconnect to {}", self.server_address);
        let server = self.server_address.clone();
        self.connect(&server)
    }

    /// Send one request and read its reply. Transport and framing errors
    /// fail the connection since the stream can no longer be trusted.
    pub(crate) fn exchange(&mut self, request: Message) -> TandemResult<QueryReply> {
        let port = self.port.as_mut().ok_or_else(|| {
            TandemError::connection(&self.server_address, "not connected")
        })?;

        let reply = port
            .call(request)
            .map_err(|e| TandemError::connection(&self.server_address, e))
            .and_then(QueryReply::from_message);

        if let Err(e) = &reply {
            warn!("Exchange with {} failed: {}", self.server_address, e);
            self.failed = true;
            self.port = None;
        }
        reply
    }
}

impl DbClient for Connection {
    fn query(
        &mut self,
        ns: &str,
        query: &Query,
        n_to_return: i32,
        n_to_skip: i32,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Cursor<'_>> {
        utils::validate_namespace(ns)?;
        self.check_connection()?;

        let request = QueryRequest {
            options,
            ns: ns.to_string(),
            n_to_skip,
            n_to_return,
            query: query.to_document(),
            fields: fields.cloned(),
        };
        debug!("Query {} on {}: {}", ns, self.server_address, request.query);

        let reply = self.exchange(request.to_message()?)?;
        Ok(Cursor::new(self, ns, n_to_return, options, reply))
    }

    fn find_one(
        &mut self,
        ns: &str,
        query: &Query,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Option<Document>> {
        let mut cursor = self.query(ns, query, 1, 0, fields, options)?;
        match cursor.try_next()? {
            Some(doc) => super::cursor::check_remote_error(doc).map(Some),
            None => Ok(None),
        }
    }
}
