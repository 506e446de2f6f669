/// Replica-pair client with automatic master failover
///
/// Two connections, left and right, and a four-state marker of which side is
/// master. `Left`/`Right` mean that side answered "is master" and is used
/// until it reports otherwise. `UnknownLeft`/`UnknownRight` mean nothing is
/// confirmed and name the side to probe first on the next call.
use super::commands::{DbCommands, MasterStatus};
use super::connection::Connection;
use super::cursor::Cursor;
use super::{ConnectionOptions, DbClient, PairOptions};
use crate::core::{Document, Query, QueryOptions};
use crate::error::{is_not_master_message, TandemError, TandemResult};
use std::fmt;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    /// Nothing confirmed, probe left first
    UnknownLeft,
    /// Nothing confirmed, probe right first
    UnknownRight,
    Left,
    Right,
}

impl MasterState {
    pub fn confirmed(self) -> Option<Side> {
        match self {
            MasterState::Left => Some(Side::Left),
            MasterState::Right => Some(Side::Right),
            MasterState::UnknownLeft | MasterState::UnknownRight => None,
        }
    }

    /// Side probed first while unconfirmed
    fn probe_first(self) -> Side {
        match self {
            MasterState::UnknownLeft | MasterState::Left => Side::Left,
            MasterState::UnknownRight | MasterState::Right => Side::Right,
        }
    }

    fn master(side: Side) -> Self {
        match side {
            Side::Left => MasterState::Left,
            Side::Right => MasterState::Right,
        }
    }

    fn unknown(probe_first: Side) -> Self {
        match probe_first {
            Side::Left => MasterState::UnknownLeft,
            Side::Right => MasterState::UnknownRight,
        }
    }

    /// Forget the confirmed master and probe the other side next
    pub fn demoted(self) -> Self {
        match self {
            MasterState::Left => MasterState::UnknownRight,
            MasterState::Right => MasterState::UnknownLeft,
            unknown => unknown,
        }
    }
}

/// Client for a replica pair. Every query goes to the current master.
#[derive(Debug)]
pub struct PairedClient {
    left: Connection,
    right: Connection,
    master: MasterState,
    options: PairOptions,
}

impl PairedClient {
    /// Both connections always reconnect automatically so a side that was
    /// down can take over later.
    pub fn new(options: ConnectionOptions, pair_options: PairOptions) -> Self {
        let options = options.with_auto_reconnect(true);
        Self {
            left: Connection::new(options.clone()),
            right: Connection::new(options),
            master: MasterState::UnknownLeft,
            options: pair_options,
        }
    }

    /// Dial both servers, then find the master.
    ///
    /// An unreachable side is tolerated. Fails with
    /// [`TandemError::NoMasterFound`] when neither side is master; the client
    /// stays usable and later calls probe again.
    pub fn connect(&mut self, left: &str, right: &str) -> TandemResult<()> {
        if let Err(e) = self.left.connect(left) {
            warn!("Left side of pair unavailable: {}", e);
        }
        if let Err(e) = self.right.connect(right) {
            warn!("Right side of pair unavailable: {}", e);
        }
        self.check_master().map(|_| ())
    }

    pub fn master_state(&self) -> MasterState {
        self.master
    }

    pub fn left(&self) -> &Connection {
        &self.left
    }

    pub fn right(&self) -> &Connection {
        &self.right
    }

    fn connection_mut(&mut self, side: Side) -> &mut Connection {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Confirmed master side, probing when there is none.
    ///
    /// A confirmed master is trusted without a round trip. Otherwise both
    /// sides are asked in turn, starting from the marked one, for up to
    /// `probe_rounds` rounds. If only one side failed to answer, it becomes
    /// the side probed first next time.
    pub fn check_master(&mut self) -> TandemResult<Side> {
        if let Some(side) = self.master.confirmed() {
            return Ok(side);
        }

        let rounds = self.options.probe_rounds.max(1);
        let mut unanswered = Vec::with_capacity(2);
        for round in 0..rounds {
            if round > 0 {
                thread::sleep(self.options.probe_retry_delay);
            }
            unanswered.clear();

            let first = self.master.probe_first();
            for side in [first, first.other()] {
                let status = self.connection_mut(side).probe_master();
                debug!("Probe of {} side ({}): {}", side, self.server_of(side), status);
                match status {
                    MasterStatus::Master => {
                        info!("Master is {} side ({})", side, self.server_of(side));
                        self.master = MasterState::master(side);
                        return Ok(side);
                    }
                    MasterStatus::NotMaster { .. } => {}
                    MasterStatus::Unreachable { reason } => {
                        warn!("Master probe of {} failed: {}", self.server_of(side), reason);
                        unanswered.push(side);
                    }
                }
            }
        }

        if let [side] = unanswered[..] {
            self.master = MasterState::unknown(side);
        }
        Err(TandemError::no_master(format!(
            "neither {} nor {} is master",
            self.left.server_address(),
            self.right.server_address()
        )))
    }

    /// The confirmed master reported it is no longer master
    pub fn isnt_master(&mut self) {
        Self::demote(&mut self.master);
    }

    fn demote(master: &mut MasterState) {
        let demoted = master.demoted();
        if demoted != *master {
            info!("Master lost, {:?} -> {:?}", master, demoted);
            *master = demoted;
        }
    }

    fn server_of(&self, side: Side) -> &str {
        match side {
            Side::Left => self.left.server_address(),
            Side::Right => self.right.server_address(),
        }
    }
}

impl DbClient for PairedClient {
    fn query(
        &mut self,
        ns: &str,
        query: &Query,
        n_to_return: i32,
        n_to_skip: i32,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Cursor<'_>> {
        let side = self.check_master()?;
        let conn = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        let server = conn.server_address().to_string();

        match conn.query(ns, query, n_to_return, n_to_skip, fields, options) {
            Ok(cursor) => {
                if cursor.peek_error().is_some_and(|m| is_not_master_message(&m)) {
                    Self::demote(&mut self.master);
                    return Err(TandemError::NotMaster { server });
                }
                Ok(cursor)
            }
            Err(e) => {
                if e.is_connection_failure() {
                    Self::demote(&mut self.master);
                }
                Err(e)
            }
        }
    }

    fn find_one(
        &mut self,
        ns: &str,
        query: &Query,
        fields: Option<&Document>,
        options: QueryOptions,
    ) -> TandemResult<Option<Document>> {
        let side = self.check_master()?;
        let conn = self.connection_mut(side);
        let server = conn.server_address().to_string();

        match conn.find_one(ns, query, fields, options) {
            Ok(Some(doc))
                if !doc.is_ok()
                    && doc
                        .get_str("errmsg")
                        .is_some_and(is_not_master_message) =>
            {
                self.isnt_master();
                Err(TandemError::NotMaster { server })
            }
            Err(e) if e.is_not_master() => {
                self.isnt_master();
                Err(TandemError::NotMaster { server })
            }
            Err(e) if e.is_connection_failure() => {
                self.isnt_master();
                Err(e)
            }
            other => other,
        }
    }
}
