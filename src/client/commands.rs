/// Administrative commands
///
/// Commands are `find_one` calls against `<db>.$cmd` whose query document
/// names the command, e.g. `{ismaster: 1}`. The reply carries `ok` (non-zero
/// when the command ran) plus command-specific fields.
use super::DbClient;
use crate::core::{Document, Query, QueryOptions};
use crate::error::{TandemError, TandemResult};
use crate::utils::command_namespace;
use std::fmt;

/// Outcome of asking one node whether it is master
#[derive(Debug, Clone, PartialEq)]
pub enum MasterStatus {
    Master,
    NotMaster { msg: Option<String> },
    /// The node could not be asked or the command failed
    Unreachable { reason: String },
}

impl fmt::Display for MasterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterStatus::Master => write!(f, "Master"),
            MasterStatus::NotMaster { msg: Some(msg) } => write!(f, "Not master ({})", msg),
            MasterStatus::NotMaster { msg: None } => write!(f, "Not master"),
            MasterStatus::Unreachable { reason } => write!(f, "Unreachable: {}", reason),
        }
    }
}

impl MasterStatus {
    pub fn is_master(&self) -> bool {
        matches!(self, MasterStatus::Master)
    }

    /// Whether the node gave an answer at all
    pub fn answered(&self) -> bool {
        !matches!(self, MasterStatus::Unreachable { .. })
    }
}

/// Command helpers available on every [`DbClient`]
pub trait DbCommands: DbClient {
    /// Run `command` against `db` and return the raw reply
    fn run_command(&mut self, db: &str, command: &Document) -> TandemResult<Document> {
        let name = command.first_key().unwrap_or("<empty>").to_string();
        let ns = command_namespace(db);
        self.find_one(&ns, &Query::new(command.clone()), None, QueryOptions::NONE)?
            .ok_or_else(|| TandemError::command(name, "no reply document"))
    }

    /// Ask the node whether it is master. Returns the flag and the full
    /// reply, e.g. `{ismaster: 1.0, msg: "not paired", ok: 1.0}`.
    fn is_master(&mut self) -> TandemResult<(bool, Document)> {
        let reply = self.run_command("admin", &Document::with("ismaster", 1))?;
        if !reply.is_ok() {
            let message = reply.get_str("errmsg").unwrap_or("command returned ok: 0");
            return Err(TandemError::command("ismaster", message));
        }
        Ok((reply.truthy("ismaster"), reply))
    }

    /// [`DbCommands::is_master`] folded into a [`MasterStatus`]
    fn probe_master(&mut self) -> MasterStatus {
        match self.is_master() {
            Ok((true, _)) => MasterStatus::Master,
            Ok((false, reply)) => MasterStatus::NotMaster {
                msg: reply.get_str("msg").map(str::to_string),
            },
            Err(e) => MasterStatus::Unreachable {
                reason: e.to_string(),
            },
        }
    }
}

impl<T: DbClient + ?Sized> DbCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Connection, ConnectionOptions};
    use crate::protocol::QueryReply;
    use crate::testing::{closed_port, doc, MockServer, Request};
    use serde_json::json;

    fn connect(server: &MockServer) -> Connection {
        let mut conn = Connection::new(ConnectionOptions::default());
        conn.connect(&server.host()).unwrap();
        conn
    }

    #[test]
    fn test_master_status_display() {
        assert_eq!(MasterStatus::Master.to_string(), "Master");
        assert_eq!(
            MasterStatus::NotMaster {
                msg: Some("not paired".to_string())
            }
            .to_string(),
            "Not master (not paired)"
        );
        assert_eq!(
            MasterStatus::Unreachable {
                reason: "refused".to_string()
            }
            .to_string(),
            "Unreachable: refused"
        );
    }

    #[test]
    fn test_is_master_command_shape() {
        let server = MockServer::replica(true);
        let mut conn = connect(&server);

        let (is_master, reply) = conn.is_master().unwrap();
        assert!(is_master);
        assert!(reply.is_ok());

        let requests = server.requests();
        let Request::Query(q) = &requests[0] else {
            panic!("expected a query");
        };
        assert_eq!(q.ns, "admin.$cmd");
        assert_eq!(q.n_to_return, 1);
        assert_eq!(q.query.first_key(), Some("ismaster"));
    }

    #[test]
    fn test_probe_not_master() {
        let server = MockServer::start(|_| {
            QueryReply::batch(0, 0, &[doc(json!({"ismaster": 0, "msg": "paired", "ok": 1.0}))]).ok()
        });
        let mut conn = connect(&server);
        assert_eq!(
            conn.probe_master(),
            MasterStatus::NotMaster {
                msg: Some("paired".to_string())
            }
        );
    }

    #[test]
    fn test_command_failure() {
        let server = MockServer::start(|_| {
            QueryReply::batch(0, 0, &[doc(json!({"ok": 0, "errmsg": "no such cmd"}))]).ok()
        });
        let mut conn = connect(&server);
        match conn.is_master() {
            Err(TandemError::CommandFailed { command, message }) => {
                assert_eq!(command, "ismaster");
                assert_eq!(message, "no such cmd");
            }
            other => panic!("expected command failure, got {:?}", other),
        }
        assert!(!conn.probe_master().answered());
    }

    #[test]
    fn test_probe_unreachable() {
        let mut conn = Connection::new(ConnectionOptions::default());
        let _ = conn.connect(&format!("127.0.0.1:{}", closed_port()));
        let status = conn.probe_master();
        assert!(!status.is_master());
        assert!(!status.answered());
    }
}
