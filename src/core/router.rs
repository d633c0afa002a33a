// src/core/router.rs

//! Delivers envelopes to registered connections: fan-out to everyone but the
//! sender, and point-to-point delivery by screen name.
//!
//! A recipient whose write fails or times out is treated as disconnected. It is
//! removed from the registry, its session is told to stop, and the remaining
//! members are sent a LEAVE for it. Those LEAVE notifications go through the
//! same fan-out loop, so a cascade of failures is handled iteratively.

use crate::core::metrics;
use crate::core::protocol::Envelope;
use crate::core::state::{ClientHandle, ServerState};
use crate::core::RelayError;
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Summary of one fan-out, including any cascaded LEAVE notifications.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients that received the original envelope.
    pub delivered: usize,
    /// Names evicted because a delivery to them failed.
    pub evicted: Vec<String>,
}

/// The result of a private send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateOutcome {
    Delivered,
    /// No such recipient; an ERROR was returned to the sender.
    RecipientNotFound,
    /// The recipient existed but the write failed; it has been evicted.
    RecipientEvicted(DeliveryReport),
    /// The envelope could not be encoded; nothing was sent.
    NotSent,
}

/// Routes envelopes between sessions using the shared registry.
#[derive(Debug, Clone)]
pub struct Router {
    state: Arc<ServerState>,
}

impl Router {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Delivers `envelope` to every registered connection except `exclude`.
    ///
    /// Sends to all targets run concurrently, each bounded by the configured
    /// send timeout. A failure for one target never prevents delivery to the
    /// others.
    pub async fn broadcast(&self, envelope: &Envelope, exclude: Option<&str>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut pending = VecDeque::from([(envelope.clone(), exclude.map(str::to_string))]);
        let mut is_original = true;

        while let Some((envelope, exclude)) = pending.pop_front() {
            let frame = match envelope.encode_to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode {} envelope: {}", envelope.kind(), e);
                    is_original = false;
                    continue;
                }
            };

            // Copy the targets out; the registry lock is released before any I/O.
            let targets = self.state.registry.targets_except(exclude.as_deref());
            let timeout = self.state.send_timeout();
            let results = join_all(targets.iter().map(|(name, handle)| {
                let frame = &frame;
                async move { (name, handle, handle.send_frame(frame, timeout).await) }
            }))
            .await;

            let mut delivered = 0;
            for (name, handle, result) in results {
                match result {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        if self.evict(name, handle, &e) {
                            report.evicted.push(name.clone());
                            pending.push_back((Envelope::Leave { name: name.clone() }, Some(name.clone())));
                        }
                    }
                }
            }

            self.record_delivered(&envelope, delivered);
            if is_original {
                report.delivered = delivered;
                is_original = false;
            }
        }
        report
    }

    /// Delivers a private envelope to `recipient`.
    ///
    /// If nobody is registered under `recipient`, an
    /// `["ERROR","Recipient <name> not found"]` is written to `sender` instead
    /// and nothing is routed. If the write to the recipient fails, the
    /// recipient is evicted exactly as in `broadcast`.
    pub async fn send_private(
        &self,
        envelope: &Envelope,
        recipient: &str,
        sender: &ClientHandle,
    ) -> PrivateOutcome {
        let Some(target) = self.state.registry.lookup(recipient) else {
            let err = RelayError::RecipientNotFound(recipient.to_string());
            debug!("Session {}: {}", sender.session_id, err);
            self.reply(sender, &Envelope::error_from(&err)).await;
            return PrivateOutcome::RecipientNotFound;
        };

        let frame = match envelope.encode_to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {} envelope: {}", envelope.kind(), e);
                return PrivateOutcome::NotSent;
            }
        };

        match target.send_frame(&frame, self.state.send_timeout()).await {
            Ok(()) => {
                self.record_delivered(envelope, 1);
                PrivateOutcome::Delivered
            }
            Err(e) => {
                let mut report = DeliveryReport::default();
                if self.evict(recipient, &target, &e) {
                    report = self
                        .broadcast(&Envelope::Leave { name: recipient.to_string() }, Some(recipient))
                        .await;
                    report.evicted.insert(0, recipient.to_string());
                }
                PrivateOutcome::RecipientEvicted(report)
            }
        }
    }

    /// Writes an envelope to a single connection, usually the sender's own.
    /// Failures are left for that connection's read loop to notice.
    pub async fn reply(&self, handle: &ClientHandle, envelope: &Envelope) -> bool {
        let frame = match envelope.encode_to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {} envelope: {}", envelope.kind(), e);
                return false;
            }
        };
        match handle.send_frame(&frame, self.state.send_timeout()).await {
            Ok(()) => {
                self.record_delivered(envelope, 1);
                true
            }
            Err(e) => {
                debug!("Session {}: reply failed: {}", handle.session_id, e);
                false
            }
        }
    }

    /// Removes a recipient whose delivery failed. Returns true if this call
    /// performed the removal, i.e. the caller owes the room a LEAVE.
    fn evict(&self, name: &str, handle: &ClientHandle, cause: &RelayError) -> bool {
        metrics::DELIVERY_FAILURES_TOTAL.inc();
        match self.state.registry.remove_if_owner(name, handle.session_id) {
            Some(removed) => {
                warn!(
                    "Delivery to {} ({}) failed: {}. Treating as disconnected.",
                    name, removed.addr, cause
                );
                removed.kill();
                true
            }
            None => false,
        }
    }

    fn record_delivered(&self, envelope: &Envelope, count: usize) {
        if count == 0 {
            return;
        }
        self.state.stats.add_envelopes_delivered(count as u64);
        metrics::ENVELOPES_ROUTED_TOTAL
            .with_label_values(&[envelope.kind().as_ref()])
            .inc_by(count as f64);
    }
}
