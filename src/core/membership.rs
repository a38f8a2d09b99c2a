//! Join, stabilize and notify: keep successor and predecessor pointers
//! converging to ring order.

use std::net::SocketAddr;

use tracing::{debug, info};

use crate::common::{Node, RequestSpecific, ResponseSpecific};
use crate::{Error, Result};

use super::LocalNode;

impl LocalNode {
    /// Become a ring of one: our own successor, with no predecessor.
    pub fn create(&self) {
        let mut state = self.state();

        state.predecessor = None;
        state.successors.reset(self.node);

        info!(id = ?self.node.id, address = ?self.node.address, "Created a new ring");
    }

    /// Join the ring `bootstrap` is part of.
    ///
    /// Our successor becomes the owner of our own id, as resolved through
    /// `bootstrap`. Nobody is notified yet, the next stabilize round takes
    /// care of that.
    pub fn join(&self, bootstrap: SocketAddr) -> Result<()> {
        let successor = self.resolve_from(bootstrap, self.node.id)?;

        if successor.same_address(&self.node) {
            // The ring resolved to us, there is nobody else to join.
            self.create();
            return Ok(());
        }

        let mut state = self.state();

        state.predecessor = None;
        state.successors.reset(successor);

        info!(
            id = ?self.node.id,
            ?bootstrap,
            successor = ?successor.address,
            "Joined ring"
        );

        Ok(())
    }

    /// One stabilize round.
    ///
    /// Adopt our successor's predecessor if it sits between us, refresh the
    /// successor list from the successor, then notify it about us. An
    /// unreachable successor is evicted and the round ends there.
    pub fn stabilize(&self) {
        let mut successor = self.state().successor();

        let predecessor = match self.call(successor.address, RequestSpecific::GetPredecessor) {
            Ok(ResponseSpecific::GetPredecessor { predecessor }) => {
                predecessor.map(|address| Node::new(address, &self.space))
            }
            Ok(_) => {
                debug!(successor = ?successor.address, "Unexpected response to get_predecessor");
                return;
            }
            Err(error) => {
                self.evict_successor(&successor, &error);
                return;
            }
        };

        if let Some(candidate) = predecessor {
            if candidate.id.in_interval(self.node.id, successor.id, false)
                && !candidate.same_address(&self.node)
            {
                let mut state = self.state();

                // Someone else may have moved the successor meanwhile.
                if state.successor() == successor {
                    state.successors.promote(candidate);
                    successor = candidate;

                    debug!(successor = ?candidate.address, "Adopted closer successor");
                }
            }
        }

        match self.call(successor.address, RequestSpecific::GetSuccessors) {
            Ok(ResponseSpecific::GetSuccessors { successors }) => {
                let fetched = successors
                    .into_iter()
                    .map(|address| Node::new(address, &self.space))
                    .collect();

                let mut state = self.state();

                if state.successor() == successor {
                    state.successors.refresh(successor, fetched);
                }
            }
            Ok(_) => {
                debug!(successor = ?successor.address, "Unexpected response to get_successors");
            }
            Err(error) => {
                debug!(successor = ?successor.address, ?error, "Failed to fetch successor list");
            }
        }

        if let Err(error) = self.call(
            successor.address,
            RequestSpecific::Notify {
                candidate: self.node.address,
            },
        ) {
            debug!(successor = ?successor.address, ?error, "Failed to notify successor");
        }
    }

    /// Handle a node proposing itself as our predecessor, returns `true` if
    /// accepted.
    ///
    /// Accepted iff we have no predecessor, or it lies between our current
    /// predecessor and us. We never accept ourselves.
    pub fn notify(&self, candidate: Node) -> bool {
        if candidate.same_address(&self.node) {
            return false;
        }

        let mut state = self.state();

        let accepted = match state.predecessor {
            None => true,
            Some(predecessor) => candidate.id.in_interval(predecessor.id, self.node.id, false),
        };

        if accepted {
            debug!(predecessor = ?candidate.address, "Accepted new predecessor");
            state.predecessor = Some(candidate);
        } else {
            debug!(candidate = ?candidate.address, "Rejected notify");
        }

        accepted
    }

    fn evict_successor(&self, failed: &Node, error: &Error) {
        let mut state = self.state();

        if state.successors.evict(&failed.address) {
            state.forget_finger(&failed.address);

            debug!(
                failed = ?failed.address,
                ?error,
                successor = ?state.successor().address,
                "Evicted unreachable successor"
            );
        }
    }
}
