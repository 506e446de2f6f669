/// Batched result cursor
///
/// A cursor holds the reply batch it is reading plus the server-side cursor
/// id. An id of 0 means the server will not produce more: the cursor is dead,
/// though documents already buffered can still be read.
use super::connection::Connection;
use crate::core::{Document, QueryOptions};
use crate::error::{TandemError, TandemResult};
use crate::protocol::{GetMoreRequest, QueryReply, ResponseFlags};
use bytes::Bytes;
use tracing::{debug, warn};

/// Open result stream borrowed from the [`Connection`] that issued the query.
///
/// The borrow ties the cursor to that connection: it cannot outlive it and
/// the connection cannot be used for anything else while the cursor is open.
#[derive(Debug)]
pub struct Cursor<'c> {
    conn: &'c mut Connection,
    ns: String,
    cursor_id: i64,
    n_returned: i32,
    pos: i32,
    /// Unread part of the current batch
    data: Bytes,
    n_to_return: i32,
    options: QueryOptions,
}

impl<'c> Cursor<'c> {
    /// Wrap the first reply of a query
    pub(crate) fn new(
        conn: &'c mut Connection,
        ns: &str,
        n_to_return: i32,
        options: QueryOptions,
        reply: QueryReply,
    ) -> Self {
        let mut cursor = Self {
            conn,
            ns: ns.to_string(),
            cursor_id: 0,
            n_returned: 0,
            pos: 0,
            data: Bytes::new(),
            n_to_return,
            options,
        };
        cursor.data_received(reply);
        cursor
    }

    /// Replace the batch with `reply`. Returns false when the server no
    /// longer knows the cursor; the cursor is then dead and empty.
    fn data_received(&mut self, reply: QueryReply) -> bool {
        self.pos = 0;
        if reply.flags.contains(ResponseFlags::CURSOR_NOT_FOUND) {
            self.cursor_id = 0;
            self.n_returned = 0;
            self.data = Bytes::new();
            return false;
        }

        self.cursor_id = reply.cursor_id;
        self.n_returned = reply.n_returned;
        self.data = reply.documents;
        true
    }

    /// True if `next()` can return a document: either one is buffered or
    /// the server may have more. Never does I/O.
    pub fn more(&self) -> bool {
        self.pos < self.n_returned || self.cursor_id != 0
    }

    /// Next document, fetching a new batch when the buffer is empty.
    ///
    /// Fails with [`TandemError::EmptyCursor`] when there is nothing to
    /// return, which happens when `more()` was false, or when a tailable
    /// cursor has no new data yet (use [`Cursor::try_next`] to poll those).
    /// Error documents from the server are returned as data; see
    /// [`Cursor::next_safe`].
    pub fn next(&mut self) -> TandemResult<Document> {
        self.try_next()?.ok_or(TandemError::EmptyCursor)
    }

    /// Like [`Cursor::next`] but a `$err` document becomes
    /// [`TandemError::RemoteQuery`]
    pub fn next_safe(&mut self) -> TandemResult<Document> {
        check_remote_error(self.next()?)
    }

    /// Next document, or `None` when nothing is available right now
    pub fn try_next(&mut self) -> TandemResult<Option<Document>> {
        if self.pos >= self.n_returned {
            if self.cursor_id == 0 {
                return Ok(None);
            }
            self.request_more()?;
            if self.pos >= self.n_returned {
                return Ok(None);
            }
        }

        match Document::decode_from(&mut self.data) {
            Ok(doc) => {
                self.pos += 1;
                Ok(Some(doc))
            }
            Err(e) => {
                // Rest of the batch is unreadable
                self.pos = self.n_returned;
                self.data = Bytes::new();
                Err(e)
            }
        }
    }

    /// Fetch the next batch with a get-more round trip on the owning
    /// connection
    fn request_more(&mut self) -> TandemResult<()> {
        let request = GetMoreRequest {
            ns: self.ns.clone(),
            n_to_return: self.n_to_return,
            cursor_id: self.cursor_id,
        };
        debug!("Get more on {} cursor {}", self.ns, self.cursor_id);

        let reply = match self.conn.exchange(request.to_message()?) {
            Ok(reply) => reply,
            Err(e) => {
                // The connection is gone and the cursor with it
                self.cursor_id = 0;
                return Err(e);
            }
        };

        let cursor_id = self.cursor_id;
        if !self.data_received(reply) {
            warn!("Cursor {} on {} not found on server", cursor_id, self.ns);
            return Err(TandemError::CursorNotFound {
                ns: self.ns.clone(),
                cursor_id,
            });
        }
        Ok(())
    }

    /// True when the server will not produce more for this cursor.
    /// Buffered documents may remain; check `more()` for that.
    pub fn is_dead(&self) -> bool {
        self.cursor_id == 0
    }

    pub fn tailable(&self) -> bool {
        self.options.contains(QueryOptions::TAILABLE)
    }

    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    /// Documents left in the current batch
    pub fn batch_remaining(&self) -> usize {
        (self.n_returned - self.pos).max(0) as usize
    }

    /// Error message of the next buffered document, without consuming it
    pub(crate) fn peek_error(&self) -> Option<String> {
        if self.pos >= self.n_returned {
            return None;
        }
        let mut data = self.data.clone();
        Document::decode_from(&mut data)
            .ok()
            .and_then(|doc| doc.error_message())
    }
}

/// Turn a `$err` document into [`TandemError::RemoteQuery`], pass anything
/// else through
pub(crate) fn check_remote_error(doc: Document) -> TandemResult<Document> {
    let Some(message) = doc.error_message() else {
        return Ok(doc);
    };
    Err(TandemError::RemoteQuery {
        message,
        code: doc
            .get("code")
            .or_else(|| doc.get("$err").and_then(|err| err.get("code")))
            .and_then(serde_json::Value::as_i64),
        document: doc,
    })
}
