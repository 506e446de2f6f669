pub mod client;
pub mod config;
/// Tandem - blocking client for replica-pair document database servers
///
/// Opens connections, issues queries and streams result batches through
/// cursors. A [`PairedClient`] fails over between the two servers of a
/// replica pair, always routing calls to the node that currently claims to
/// be master.
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    Connection, ConnectionOptions, Cursor, DbClient, DbCommands, MasterState, MasterStatus,
    PairOptions, PairedClient, Side,
};
pub use config::Config;
pub use crate::core::{Address, Document, Query, QueryOptions};
pub use error::{TandemError, TandemResult};

use tracing::{info, warn};

/// Build the client described by `config` and connect it.
///
/// One host gives a [`Connection`], two give a [`PairedClient`]. A pair whose
/// master cannot be found yet is still returned, since it keeps probing on
/// later calls; a single connection that cannot be dialed is an error unless
/// auto-reconnect is enabled.
pub fn open(config: &Config) -> TandemResult<Box<dyn DbClient>> {
    config.validate()?;

    match config.servers.hosts.as_slice() {
        [host] => {
            let mut conn = Connection::new(config.connection_options());
            if let Err(e) = conn.connect(host) {
                if !conn.options().auto_reconnect {
                    return Err(e);
                }
                warn!("Initial connect to {} failed, will retry: {}", host, e);
            }
            Ok(Box::new(conn))
        }
        [left, right] => {
            let mut pair = PairedClient::new(config.connection_options(), config.pair_options());
            match pair.connect(left, right) {
                Ok(()) => info!("Connected to pair {} / {}", left, right),
                Err(e) => warn!("Pair {} / {} has no master yet: {}", left, right, e),
            }
            Ok(Box::new(pair))
        }
        hosts => Err(error::ConfigError::ValidationError(format!(
            "expected one or two hosts, got {}",
            hosts.len()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{closed_port, MockServer};

    #[test]
    fn test_open_single() {
        let server = MockServer::replica(true);
        let mut config = Config::default();
        config.servers.hosts = vec![server.host()];

        let mut client = open(&config).unwrap();
        assert!(client.probe_master().is_master());
        assert!(client
            .find_one("app.users", &Query::default(), None, QueryOptions::NONE)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_open_single_unreachable() {
        let mut config = Config::default();
        config.servers.hosts = vec![format!("127.0.0.1:{}", closed_port())];
        assert!(matches!(
            open(&config),
            Err(TandemError::ConnectionFailure { .. })
        ));

        config.connection.auto_reconnect = true;
        assert!(open(&config).is_ok());
    }

    #[test]
    fn test_open_pair() {
        let left = MockServer::replica(false);
        let right = MockServer::replica(true);
        let mut config = Config::default();
        config.servers.hosts = vec![left.host(), right.host()];

        let mut client = open(&config).unwrap();
        let doc = client
            .find_one("app.users", &Query::default(), None, QueryOptions::NONE)
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("port"), Some(&serde_json::json!(right.port())));
    }
}
