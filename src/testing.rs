/// In-process scripted server for tests
///
/// Listens on a loopback port, decodes requests with the crate's own codec
/// and answers each one through a handler closure. A handler returning
/// `None` makes the server drop the connection.
use crate::core::{Document, QueryOptions};
use crate::protocol::{GetMoreRequest, Message, OpCode, QueryReply, QueryRequest};
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub(crate) enum Request {
    Query(QueryRequest),
    GetMore(GetMoreRequest),
}

impl Request {
    /// Command query whose first field is `name`
    pub(crate) fn is_command(&self, name: &str) -> bool {
        match self {
            Request::Query(q) => q.ns.ends_with(".$cmd") && q.query.first_key() == Some(name),
            Request::GetMore(_) => false,
        }
    }
}

type Handler = Box<dyn FnMut(&Request) -> Option<QueryReply> + Send>;

pub(crate) struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
    accepted: Arc<AtomicUsize>,
    master: Arc<AtomicBool>,
}

impl MockServer {
    pub(crate) fn start<F>(handler: F) -> Self
    where
        F: FnMut(&Request) -> Option<QueryReply> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        Self::serve(listener, Box::new(handler), Arc::new(AtomicBool::new(false)))
    }

    /// Like [`MockServer::start`] on a fixed port
    pub(crate) fn start_on<F>(port: u16, handler: F) -> Self
    where
        F: FnMut(&Request) -> Option<QueryReply> + Send + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        Self::serve(listener, Box::new(handler), Arc::new(AtomicBool::new(false)))
    }

    /// One side of a replica pair. Answers `ismaster` with the current
    /// master flag; other queries are served with `{port: <port>}` when
    /// master (or when slave-ok is set) and refused with "not master"
    /// otherwise.
    pub(crate) fn replica(is_master: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let master = Arc::new(AtomicBool::new(is_master));
        let flag = Arc::clone(&master);

        let handler = move |request: &Request| {
            let is_master = flag.load(Ordering::SeqCst);
            if request.is_command("ismaster") {
                let reply = doc(json!({"ismaster": is_master, "msg": "paired", "ok": 1.0}));
                return QueryReply::batch(0, 0, &[reply]).ok();
            }
            match request {
                Request::Query(q) if is_master || q.options.contains(QueryOptions::SLAVE_OK) => {
                    QueryReply::batch(0, 0, &[doc(json!({"port": port}))]).ok()
                }
                Request::Query(_) => QueryReply::query_failure("not master").ok(),
                Request::GetMore(_) => QueryReply::batch(0, 0, &[]).ok(),
            }
        };
        Self::serve(listener, Box::new(handler), master)
    }

    fn serve(listener: TcpListener, handler: Handler, master: Arc<AtomicBool>) -> Self {
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Mutex::new(handler));

        let log = Arc::clone(&requests);
        let count = Arc::clone(&accepted);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                count.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                thread::spawn(move || serve_connection(stream, handler, log));
            }
        });

        Self {
            addr,
            requests,
            accepted,
            master,
        }
    }

    pub(crate) fn host(&self) -> String {
        self.addr.to_string()
    }

    pub(crate) fn port(&self) -> u16 {
        self.addr.port()
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn command_count(&self, name: &str) -> usize {
        self.requests().iter().filter(|r| r.is_command(name)).count()
    }

    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Flip the master flag of a [`MockServer::replica`]
    pub(crate) fn set_master(&self, is_master: bool) {
        self.master.store(is_master, Ordering::SeqCst);
    }
}

fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<Mutex<Handler>>,
    log: Arc<Mutex<Vec<Request>>>,
) {
    loop {
        let Ok(message) = Message::read_from(&mut stream) else {
            return;
        };
        let request = match message.header.op_code {
            OpCode::Query => Request::Query(QueryRequest::from_message(&message).unwrap()),
            OpCode::GetMore => Request::GetMore(GetMoreRequest::from_message(&message).unwrap()),
            OpCode::Reply => return,
        };
        log.lock().unwrap().push(request.clone());

        let reply = {
            let mut handler = handler.lock().unwrap();
            (*handler)(&request)
        };
        match reply {
            Some(reply) => {
                if reply
                    .to_message(message.header.request_id)
                    .write_to(&mut stream)
                    .is_err()
                {
                    return;
                }
            }
            None => return,
        }
    }
}

/// Document from a JSON object literal
pub(crate) fn doc(value: Value) -> Document {
    Document::try_from(value).unwrap()
}

/// A loopback port with nothing listening on it
pub(crate) fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
