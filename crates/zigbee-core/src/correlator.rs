//! Request/response correlator: futures, matching predicates, timeout
//! sweep
//!
//! A pending request is registered as a transient command listener plus
//! a one-shot future. Whichever of {a matching inbound command, the
//! per-entry sleep, the periodic sweep} removes the entry from the
//! pending table first is the one that completes it — `DashMap::remove`
//! is atomic, so only one of those three paths ever succeeds, which is
//! what rules out double-completion (see the crate's open question about
//! a duplicate inner lock: there is no lock to double-take here).

use crate::address::DeviceAddress;
use crate::dispatcher::Dispatcher;
use crate::error::NetworkError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use zigbee_commands::Command;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a correlated send.
#[derive(Debug)]
pub enum CommandResult {
    /// A response matched the request.
    Matched(Command),
    /// Fire-and-forget broadcast; no response is expected.
    Broadcast,
    /// No matching response arrived within the timeout.
    Empty,
    /// The transport reported a send failure.
    Error(String),
}

impl CommandResult {
    /// Callers detect "no response" via this predicate rather than
    /// matching on `Empty` directly, matching §7's "is-empty predicate".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, CommandResult::Empty)
    }
}

/// Injected comparison between the outbound request and each inbound
/// command observed while the request is pending.
pub trait Matcher: Send + Sync {
    fn is_match(&self, request: &Command, received: &Command) -> bool;
}

/// Compares source address, cluster id, and transaction id, respecting
/// direction — the default correlation rule for ZCL request/response
/// pairs.
pub struct DefaultZclMatcher {
    pub source: Option<DeviceAddress>,
}

impl Matcher for DefaultZclMatcher {
    fn is_match(&self, request: &Command, received: &Command) -> bool {
        if received.cluster_id != request.cluster_id {
            return false;
        }
        if received.transaction_id != request.transaction_id {
            return false;
        }
        if let Some(expected_source) = self.source {
            let received_source = received.source.map(|s| DeviceAddress::new(s.nwk_addr, s.endpoint));
            if received_source != Some(expected_source) {
                return false;
            }
        }
        true
    }
}

/// ZDO responses carry a different cluster id than their request (the
/// response cluster is the request cluster with bit 0x8000 set), so the
/// default ZCL matcher's cluster equality check does not apply here.
pub struct ZdoMatcher {
    pub source: Option<DeviceAddress>,
}

impl Matcher for ZdoMatcher {
    fn is_match(&self, request: &Command, received: &Command) -> bool {
        if received.cluster_id != request.cluster_id | 0x8000 {
            return false;
        }
        if received.transaction_id != request.transaction_id {
            return false;
        }
        if let Some(expected_source) = self.source {
            let received_source = received.source.map(|s| DeviceAddress::new(s.nwk_addr, s.endpoint));
            if received_source != Some(expected_source) {
                return false;
            }
        }
        true
    }
}

struct PendingEntry {
    deadline: Instant,
    tx: std::sync::Mutex<Option<oneshot::Sender<CommandResult>>>,
    listener_id: crate::dispatcher::ListenerId,
}

pub struct Correlator {
    dispatcher: Arc<Dispatcher>,
    pending: Arc<DashMap<u8, PendingEntry>>,
}

impl Correlator {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Starts the periodic sweep task; the returned handle should be
    /// aborted on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                this.expire_overdue();
            }
        })
    }

    fn expire_overdue(&self) {
        let now = Instant::now();
        let overdue: Vec<u8> = self
            .pending
            .iter()
            .filter(|e| e.deadline <= now)
            .map(|e| *e.key())
            .collect();
        for transaction_id in overdue {
            self.complete(transaction_id, CommandResult::Empty);
        }
    }

    fn complete(&self, transaction_id: u8, result: CommandResult) {
        if let Some((_, entry)) = self.pending.remove(&transaction_id) {
            self.dispatcher.remove_command_listener(entry.listener_id);
            if let Some(tx) = entry.tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        }
    }

    /// Registers a pending request, performs `send`, and returns a
    /// receiver that resolves to the eventual [`CommandResult`].
    pub async fn unicast<M, F, Fut>(
        self: &Arc<Self>,
        transaction_id: u8,
        request: Command,
        matcher: M,
        send: F,
    ) -> oneshot::Receiver<CommandResult>
    where
        M: Matcher + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), NetworkError>>,
    {
        self.expire_overdue();

        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        let request_for_match = request.clone();
        let listener_id = self.dispatcher.on_command(move |received: &Command| {
            if matcher.is_match(&request_for_match, received) {
                this.complete(transaction_id, CommandResult::Matched(received.clone()));
            }
        });

        self.pending.insert(
            transaction_id,
            PendingEntry {
                deadline: Instant::now() + REQUEST_TIMEOUT,
                tx: std::sync::Mutex::new(Some(tx)),
                listener_id,
            },
        );

        if let Err(e) = send().await {
            self.complete(transaction_id, CommandResult::Error(e.to_string()));
        } else {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(REQUEST_TIMEOUT).await;
                this.complete(transaction_id, CommandResult::Empty);
            });
        }

        rx
    }

    /// Fire-and-forget: perform `send`, then immediately report
    /// [`CommandResult::Broadcast`]. No listener is registered.
    pub async fn broadcast<F, Fut>(&self, send: F) -> CommandResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), NetworkError>>,
    {
        match send().await {
            Ok(()) => CommandResult::Broadcast,
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use zigbee_commands::{Command, CommandPayload, ZclCommand};
    use zigbee_transport::Direction;

    fn sample_command(transaction_id: u8) -> Command {
        Command::new(
            0x0104,
            0x0006,
            transaction_id,
            Direction::ServerToClient,
            CommandPayload::Zcl(ZclCommand::ReadAttributesResponse(
                zigbee_commands::zcl_generic::ReadAttributesResponse { results: vec![] },
            )),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn unicast_times_out_with_empty_result() {
        let dispatcher = Arc::new(Dispatcher::new());
        let correlator = Arc::new(Correlator::new(dispatcher));

        let request = sample_command(5);
        let rx = correlator
            .unicast(5, request, DefaultZclMatcher { source: None }, || async { Ok(()) })
            .await;

        tokio::time::advance(REQUEST_TIMEOUT + Duration::from_millis(10)).await;
        let result = rx.await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn unicast_completes_on_matching_inbound_command() {
        let dispatcher = Arc::new(Dispatcher::new());
        let correlator = Arc::new(Correlator::new(Arc::clone(&dispatcher)));

        let request = sample_command(7);
        let rx = correlator
            .unicast(7, request, DefaultZclMatcher { source: None }, || async { Ok(()) })
            .await;

        dispatcher.notify_command(sample_command(7));

        let result = tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, CommandResult::Matched(_)));
    }

    #[tokio::test]
    async fn unicast_reports_send_failure_immediately() {
        let dispatcher = Arc::new(Dispatcher::new());
        let correlator = Arc::new(Correlator::new(dispatcher));

        let request = sample_command(9);
        let rx = correlator
            .unicast(9, request, DefaultZclMatcher { source: None }, || async {
                Err(NetworkError::Transport("boom".into()))
            })
            .await;

        let result = rx.await.unwrap();
        assert!(matches!(result, CommandResult::Error(_)));
    }
}
