//! Event dispatcher: copy-on-write listener snapshots, fanned out without
//! ever holding a lock while a listener callback runs
//!
//! Six categories: node, device, group, state, announce, command. Each
//! is an independent `ListenerList<T>` so registering a device listener
//! can never block dispatch of a command event. Five categories fan out
//! onto an independent `tokio::spawn` per listener; the command category
//! dispatches inline instead, so that two frames handled back-to-back by
//! the inbound path are observed by command listeners in that same
//! arrival order (the correlator relies on this to bind a transaction id
//! before any reply for it can be compared).

use crate::address::{DeviceAddress, IeeeAddress, NetworkAddress};
use crate::model::{Device, Group, Node};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use zigbee_commands::Command;
use zigbee_transport::NetworkState;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    Added(Node),
    Updated(Node),
    Removed(NetworkAddress),
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Added(Device),
    Updated(Device),
    Removed(DeviceAddress),
}

#[derive(Debug, Clone)]
pub enum GroupEvent {
    Added(Group),
    Updated(Group),
    Removed(crate::address::GroupId),
}

#[derive(Debug, Clone, Copy)]
pub struct AnnounceEvent {
    pub nwk_addr: NetworkAddress,
    pub ieee_addr: IeeeAddress,
    pub capability: u8,
}

/// Opaque handle returned from registration; pass back to `deregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Listener<T> {
    id: ListenerId,
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

/// A copy-on-write listener list behind a single mutation lock.
///
/// Dispatch clones the `Arc<Vec<_>>` under the read lock (a pointer bump)
/// then drops the lock before invoking any callback, so a listener that
/// registers another listener, or that is itself deregistered mid-fanout,
/// cannot deadlock or observe a torn list.
struct ListenerList<T> {
    listeners: RwLock<Arc<Vec<Listener<T>>>>,
}

impl<T> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl<T: Send + Sync + 'static> ListenerList<T> {
    fn register(&self, id: ListenerId, callback: Arc<dyn Fn(&T) + Send + Sync>) {
        let mut guard = self.listeners.write().unwrap();
        let mut next = (**guard).clone();
        next.push(Listener { id, callback });
        *guard = Arc::new(next);
    }

    fn deregister(&self, id: ListenerId) {
        let mut guard = self.listeners.write().unwrap();
        let next: Vec<_> = guard.iter().filter(|l| l.id != id).cloned().collect();
        *guard = Arc::new(next);
    }

    fn notify(&self, event: T)
    where
        T: Clone,
    {
        let snapshot = self.listeners.read().unwrap().clone();
        for listener in snapshot.iter() {
            let callback = listener.callback.clone();
            let event = event.clone();
            tokio::spawn(async move {
                callback(&event);
            });
        }
    }

    /// Calls every listener inline, in snapshot order, before returning.
    /// Unlike `notify`, this preserves delivery order across successive
    /// calls — needed for the command category, where two frames arriving
    /// back-to-back must be observed by listeners in arrival order rather
    /// than racing across independently spawned tasks.
    fn notify_ordered(&self, event: T) {
        let snapshot = self.listeners.read().unwrap().clone();
        for listener in snapshot.iter() {
            (listener.callback)(&event);
        }
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
        }
    }
}

#[derive(Default)]
pub struct Dispatcher {
    next_id: AtomicU64,
    node: ListenerList<NodeEvent>,
    device: ListenerList<DeviceEvent>,
    group: ListenerList<GroupEvent>,
    state: ListenerList<NetworkState>,
    announce: ListenerList<AnnounceEvent>,
    command: ListenerList<Command>,
}

macro_rules! category {
    ($register:ident, $deregister:ident, $notify:ident, $field:ident, $event:ty) => {
        pub fn $register(
            &self,
            callback: impl Fn(&$event) + Send + Sync + 'static,
        ) -> ListenerId {
            let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.$field.register(id, Arc::new(callback));
            id
        }

        pub fn $deregister(&self, id: ListenerId) {
            self.$field.deregister(id);
        }

        pub fn $notify(&self, event: $event) {
            self.$field.notify(event);
        }
    };
}

/// Same registration/deregistration shape as `category!`, but dispatches
/// inline (see `ListenerList::notify_ordered`) to preserve arrival order.
macro_rules! ordered_category {
    ($register:ident, $deregister:ident, $notify:ident, $field:ident, $event:ty) => {
        pub fn $register(
            &self,
            callback: impl Fn(&$event) + Send + Sync + 'static,
        ) -> ListenerId {
            let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.$field.register(id, Arc::new(callback));
            id
        }

        pub fn $deregister(&self, id: ListenerId) {
            self.$field.deregister(id);
        }

        pub fn $notify(&self, event: $event) {
            self.$field.notify_ordered(event);
        }
    };
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    category!(
        on_node,
        remove_node_listener,
        notify_node,
        node,
        NodeEvent
    );
    category!(
        on_device,
        remove_device_listener,
        notify_device,
        device,
        DeviceEvent
    );
    category!(
        on_group,
        remove_group_listener,
        notify_group,
        group,
        GroupEvent
    );
    category!(
        on_state,
        remove_state_listener,
        notify_state,
        state,
        NetworkState
    );
    category!(
        on_announce,
        remove_announce_listener,
        notify_announce,
        announce,
        AnnounceEvent
    );
    ordered_category!(
        on_command,
        remove_command_listener,
        notify_command,
        command,
        Command
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn notifies_registered_listener() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        dispatcher.on_node(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.notify_node(NodeEvent::Removed(NetworkAddress(1)));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deregistered_listener_receives_no_further_events() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let id = dispatcher.on_node(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.notify_node(NodeEvent::Removed(NetworkAddress(1)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        dispatcher.remove_node_listener(id);
        dispatcher.notify_node(NodeEvent::Removed(NetworkAddress(2)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn command_listeners_observe_frames_in_arrival_order() {
        use std::sync::Mutex;
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

        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        dispatcher.on_command(move |cmd: &Command| {
            seen2.lock().unwrap().push(cmd.transaction_id);
        });

        // notify_command dispatches inline, so by the time each call
        // returns every registered listener has already observed it —
        // two back-to-back calls cannot race each other.
        dispatcher.notify_command(sample_command(1));
        dispatcher.notify_command(sample_command(2));
        dispatcher.notify_command(sample_command(3));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
