//! Receive side: classify every arrival on one path and decide when the run
//! has seen enough samples.

use std::sync::Arc;

use partcheck_core::{digest, Packet};

use crate::completion::Completion;
use crate::stats::{Counters, RxPath};

/// What a validator made of one arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Header tag matched.
    Valid,
    /// Framing parsed but the tag did not match, or the payload could not
    /// hold one.
    Broken,
    /// Framing could not be walked to a transport payload.
    Foreign,
}

#[derive(Debug, Clone)]
pub struct Validator {
    path: RxPath,
    counters: Arc<Counters>,
    completion: Arc<Completion>,
    sample_target: u64,
}

impl Validator {
    pub fn new(
        path: RxPath,
        counters: Arc<Counters>,
        completion: Arc<Completion>,
        sample_target: u64,
    ) -> Self {
        Self {
            path,
            counters,
            completion,
            sample_target,
        }
    }

    pub fn path(&self) -> RxPath {
        self.path
    }

    /// Count the arrival, classify it, and fire completion once the total
    /// across both paths reaches the sample target.
    pub fn check(&self, pkt: &mut Packet) -> Arrival {
        let observed = self.counters.record_arrival();

        let arrival = match pkt.locate_transport_payload() {
            Err(e) => {
                tracing::debug!(path = %self.path, error = %e, "skipping unparseable frame");
                self.counters.record_foreign();
                Arrival::Foreign
            }
            Ok(_) => match digest::verify(pkt) {
                Ok(true) => {
                    self.counters.record_valid(self.path);
                    Arrival::Valid
                }
                Ok(false) | Err(_) => {
                    tracing::trace!(
                        path = %self.path,
                        len = pkt.len(),
                        payload = %hex::encode(pkt.payload().unwrap_or_default()),
                        "header tag mismatch"
                    );
                    self.counters.record_broken();
                    Arrival::Broken
                }
            },
        };

        if observed >= self.sample_target && self.completion.fire() {
            tracing::info!(
                path = %self.path,
                received_total = observed,
                sample_target = self.sample_target,
                "sample target reached"
            );
        }
        arrival
    }
}
