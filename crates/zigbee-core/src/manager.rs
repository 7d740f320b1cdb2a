//! Network Manager: ties the lifecycle, mesh model, dispatcher, pipeline,
//! and correlator into the one object applications hold
//!
//! A background task subscribes to transport events and drives device
//! discovery, while the public API builds and correlates outbound
//! commands.

use crate::address::{Address, BROADCAST_ROUTERS, DeviceAddress, GroupId, IeeeAddress, NetworkAddress};
use crate::correlator::{Correlator, CommandResult, DefaultZclMatcher, Matcher, ZdoMatcher};
use crate::dispatcher::{AnnounceEvent, Dispatcher, ListenerId, NodeEvent, DeviceEvent, GroupEvent};
use crate::error::NetworkError;
use crate::lifecycle::{validate_channel, validate_pan_id, Lifecycle, LifecycleState};
use crate::model::{Device, DeviceRole, Group, MeshModel, Node};
use crate::persistence::PersistenceAdapter;
use crate::pipeline::{self, Pipeline};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use zigbee_commands::{
    zcl_generic::{AttributeValue, ReadAttributes, WriteAttributes, AttributeWrite},
    ActiveEndpointsRequest, Command, CommandPayload, DeviceAnnounce,
    ManagementLeaveRequest, ManagementPermitJoiningRequest, SimpleDescriptorRequest,
    ActiveEndpointsResponse, SimpleDescriptorResponse, ZclCommand, ZdoCommand,
};
use zigbee_transport::{ApsFrameIndication, Direction, JoinResult, Transport, TransportEvent};

const ENDPOINT_SETTLE_DELAY: Duration = Duration::from_millis(500);
const MESH_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// The coordinator-side ZigBee network manager.
///
/// Holds the transport handle, the lifecycle state machine, the mesh
/// model, the event dispatcher, the request correlator, and (optionally)
/// a persistence adapter. Background tasks (inbound listener, mesh
/// monitor, correlator sweep) are started in [`NetworkManager::startup`]
/// and stopped in [`NetworkManager::shutdown`].
pub struct NetworkManager {
    transport: Arc<dyn Transport>,
    lifecycle: Lifecycle,
    model: Arc<MeshModel>,
    dispatcher: Arc<Dispatcher>,
    correlator: Arc<Correlator>,
    pipeline: Pipeline,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkManager {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, persistence: Option<Arc<dyn PersistenceAdapter>>) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new());
        let model = Arc::new(MeshModel::new(Arc::clone(&dispatcher)));
        let correlator = Arc::new(Correlator::new(Arc::clone(&dispatcher)));

        let manager = Arc::new(Self {
            transport,
            lifecycle: Lifecycle::new(),
            model,
            dispatcher,
            correlator,
            pipeline: Pipeline::new(),
            persistence,
            tasks: Mutex::new(Vec::new()),
        });

        manager.register_persistence_listeners();
        manager
    }

    fn register_persistence_listeners(self: &Arc<Self>) {
        if self.persistence.is_none() {
            return;
        }
        let this = Arc::clone(self);
        self.dispatcher.on_node(move |_: &NodeEvent| this.persist_async());
        let this = Arc::clone(self);
        self.dispatcher.on_device(move |_: &DeviceEvent| this.persist_async());
        let this = Arc::clone(self);
        self.dispatcher.on_group(move |_: &GroupEvent| this.persist_async());
    }

    fn persist_async(self: &Arc<Self>) {
        let Some(persistence) = self.persistence.clone() else {
            return;
        };
        let snapshot = self.model.snapshot();
        tokio::spawn(async move {
            persistence.serialize(&snapshot).await;
        });
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    #[must_use]
    pub fn model(&self) -> &Arc<MeshModel> {
        &self.model
    }

    // --- lifecycle ---

    /// Restores persisted state (if an adapter is set), then joins the
    /// network via the transport. Legal only from `Uninitialized`.
    pub async fn initialize(self: &Arc<Self>) -> Result<JoinResult, NetworkError> {
        self.lifecycle.require(&[LifecycleState::Uninitialized])?;

        if let Some(persistence) = &self.persistence {
            let snapshot = persistence.deserialize().await;
            self.model.restore(snapshot);
        }

        let result = self.transport.initialize().await?;
        self.lifecycle.transition_to(LifecycleState::Initialized);
        Ok(result)
    }

    pub async fn get_channel(&self) -> Result<u8, NetworkError> {
        Ok(self.transport.get_channel().await?)
    }

    pub async fn set_channel(&self, channel: u8) -> Result<(), NetworkError> {
        self.lifecycle.require(&[LifecycleState::Initialized])?;
        validate_channel(channel)?;
        self.transport.set_channel(channel).await?;
        Ok(())
    }

    pub async fn get_pan_id(&self) -> Result<u16, NetworkError> {
        Ok(self.transport.get_pan_id().await?)
    }

    pub async fn set_pan_id(&self, pan_id: u16) -> Result<(), NetworkError> {
        self.lifecycle.require(&[LifecycleState::Initialized])?;
        validate_pan_id(pan_id)?;
        self.transport.set_pan_id(pan_id).await?;
        Ok(())
    }

    pub async fn get_extended_pan_id(&self) -> Result<u64, NetworkError> {
        Ok(self.transport.get_extended_pan_id().await?)
    }

    pub async fn set_extended_pan_id(&self, extended_pan_id: u64) -> Result<(), NetworkError> {
        self.lifecycle.require(&[LifecycleState::Initialized])?;
        self.transport.set_extended_pan_id(extended_pan_id).await?;
        Ok(())
    }

    /// Security keys are a fixed-width `[u8; 16]`, so there is no length
    /// to validate beyond what the type already guarantees.
    pub async fn set_security_key(&self, key: [u8; 16]) -> Result<(), NetworkError> {
        self.lifecycle.require(&[LifecycleState::Initialized])?;
        self.transport.set_security_key(key).await?;
        Ok(())
    }

    /// Starts the transport, then the inbound listener, mesh monitor, and
    /// correlator sweep background tasks. Legal only from `Initialized`.
    pub async fn startup(self: &Arc<Self>, reinitialize: bool) -> Result<bool, NetworkError> {
        self.lifecycle.require(&[LifecycleState::Initialized])?;
        self.lifecycle.transition_to(LifecycleState::Starting);

        let joined = self.transport.startup(reinitialize).await?;

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.correlator.spawn_sweeper());
        tasks.push(self.spawn_inbound_listener());
        tasks.push(self.spawn_mesh_monitor());
        drop(tasks);

        self.lifecycle.transition_to(LifecycleState::Running);
        Ok(joined)
    }

    /// Persists state, stops background tasks, and shuts down the
    /// transport. Legal from `Running` or `Initialized`; idempotent
    /// thereafter.
    pub async fn shutdown(self: &Arc<Self>) -> Result<(), NetworkError> {
        if matches!(self.lifecycle.state(), LifecycleState::Stopped) {
            return Ok(());
        }
        self.lifecycle
            .require(&[LifecycleState::Running, LifecycleState::Initialized])?;
        self.lifecycle.transition_to(LifecycleState::ShuttingDown);

        self.persist_async();

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);

        self.transport.shutdown().await?;
        self.lifecycle.transition_to(LifecycleState::Stopped);
        Ok(())
    }

    fn spawn_inbound_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut events = self.transport.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(TransportEvent::ApsIndication(indication)) => {
                        this.handle_indication(indication).await;
                    }
                    Ok(TransportEvent::NetworkStateChanged(state)) => {
                        this.dispatcher.notify_state(state);
                    }
                    Ok(TransportEvent::DeviceAnnounced { nwk_addr, capability }) => {
                        tracing::debug!(
                            nwk_addr = format!("{nwk_addr:#06x}"),
                            capability,
                            "raw device-announced signal (full join flow runs off the ZDO frame)"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "transport event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("transport event channel closed, stopping inbound listener");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_mesh_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MESH_MONITOR_INTERVAL);
            loop {
                interval.tick().await;
                this.remesh().await;
            }
        })
    }

    /// Re-requests active endpoints for any node with no discovered
    /// device yet. Left intentionally thin: full mesh-health probing
    /// (link quality, route repair) is an external collaborator's job.
    async fn remesh(self: &Arc<Self>) {
        for node in self.model.nodes() {
            let has_device = self
                .model
                .devices()
                .iter()
                .any(|d| d.address.nwk == node.nwk);
            if has_device {
                continue;
            }
            if let Err(e) = self.discover_endpoints(node.nwk).await {
                tracing::debug!(nwk = %node.nwk, error = %e, "remesh: endpoint re-discovery failed");
            }
        }
    }

    async fn handle_indication(self: &Arc<Self>, indication: ApsFrameIndication) {
        let Some(command) = pipeline::parse_inbound(&indication.frame) else {
            return;
        };

        match &command.payload {
            CommandPayload::Zdo(ZdoCommand::DeviceAnnounce(announce)) => {
                self.handle_device_announce(announce.clone()).await;
            }
            CommandPayload::Zdo(ZdoCommand::ActiveEndpointsResponse(resp)) => {
                self.handle_active_endpoints_response(resp.clone());
            }
            CommandPayload::Zdo(ZdoCommand::SimpleDescriptorResponse(resp)) => {
                self.handle_simple_descriptor_response(resp.clone());
            }
            _ => {}
        }

        self.dispatcher.notify_command(command);
    }

    async fn handle_device_announce(self: &Arc<Self>, announce: DeviceAnnounce) {
        let nwk = NetworkAddress(announce.nwk_addr);
        let ieee = IeeeAddress(announce.ieee_addr);
        let role = if announce.is_router() {
            DeviceRole::Router
        } else {
            DeviceRole::EndDevice
        };

        let is_new = self.model.get_node(nwk).is_none();
        let node = Node::new(nwk, ieee, role);
        if is_new {
            self.model.add_node(node);
        } else {
            self.model.update_node(node);
        }

        self.dispatcher.notify_announce(AnnounceEvent {
            nwk_addr: nwk,
            ieee_addr: ieee,
            capability: announce.capability,
        });

        if is_new {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(ENDPOINT_SETTLE_DELAY).await;
                if let Err(e) = this.discover_endpoints(nwk).await {
                    tracing::warn!(error = %e, "failed to request active endpoints for newly announced device");
                }
            });
        }
    }

    fn handle_active_endpoints_response(self: &Arc<Self>, resp: ActiveEndpointsResponse) {
        if resp.status != 0 {
            return;
        }
        let nwk = NetworkAddress(resp.nwk_addr);
        for endpoint in resp.endpoints {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = this.discover_simple_descriptor(nwk, endpoint).await {
                    tracing::warn!(error = %e, "failed to request simple descriptor");
                }
            });
        }
    }

    fn handle_simple_descriptor_response(&self, resp: SimpleDescriptorResponse) {
        if resp.status != 0 {
            return;
        }
        let nwk = NetworkAddress(resp.nwk_addr);
        let Some(node) = self.model.get_node(nwk) else {
            tracing::debug!(nwk = %nwk, "simple descriptor response for unknown node");
            return;
        };

        let address = DeviceAddress::new(resp.nwk_addr, resp.endpoint);
        let device = Device {
            address,
            ieee: node.ieee,
            profile_id: resp.profile_id,
            device_id: resp.device_id,
            in_clusters: resp.in_clusters,
            out_clusters: resp.out_clusters,
        };

        if self.model.get_device(address).is_some() {
            self.model.update_device(device);
        } else {
            self.model.add_device(device);
        }
    }

    // --- outbound send / correlation ---

    /// Sends a ZCL command to `destination`. Group destinations are fired
    /// and forgotten (`CommandResult::Broadcast`); device destinations are
    /// correlated against the reply and resolve once matched or expired.
    pub async fn send(
        self: &Arc<Self>,
        destination: Address,
        cluster_id: u16,
        direction: Direction,
        payload: CommandPayload,
    ) -> Result<CommandResult, NetworkError> {
        if destination.is_group() {
            return self
                .send_fire_and_forget(destination, cluster_id, direction, payload)
                .await;
        }

        let source = match destination {
            Address::Device(d) => Some(d),
            Address::Group(_) => None,
        };
        self.correlated_send(destination, cluster_id, direction, payload, DefaultZclMatcher { source })
            .await
    }

    /// Sends a ZDO request and correlates it against the matching
    /// response, whose cluster id is the request cluster with 0x8000 set
    /// (see [`crate::correlator::ZdoMatcher`]).
    async fn send_zdo(
        self: &Arc<Self>,
        destination: Address,
        request_cluster_id: u16,
        payload: CommandPayload,
    ) -> Result<CommandResult, NetworkError> {
        let source = match destination {
            Address::Device(d) => Some(d),
            Address::Group(_) => None,
        };
        self.correlated_send(
            destination,
            request_cluster_id,
            Direction::ClientToServer,
            payload,
            ZdoMatcher { source },
        )
        .await
    }

    async fn correlated_send<M: Matcher + 'static>(
        self: &Arc<Self>,
        destination: Address,
        cluster_id: u16,
        direction: Direction,
        payload: CommandPayload,
        matcher: M,
    ) -> Result<CommandResult, NetworkError> {
        self.lifecycle.require(&[LifecycleState::Running])?;

        let (frame, transaction_id) = self
            .pipeline
            .build_outbound(destination, cluster_id, direction, &payload);

        let transport = Arc::clone(&self.transport);
        let send_frame = frame.clone();
        let send_fn = move || {
            let transport = Arc::clone(&transport);
            let frame = send_frame.clone();
            async move { transport.send_command(frame).await.map_err(NetworkError::from) }
        };

        let request = Command::new(frame.profile_id, cluster_id, transaction_id, direction, payload);
        let rx = self
            .correlator
            .unicast(transaction_id, request, matcher, send_fn)
            .await;
        Ok(rx.await.unwrap_or(CommandResult::Empty))
    }

    /// Sends a command without registering a correlator entry: used for
    /// requests a single device does not uniquely answer, like a
    /// network-wide permit-join.
    async fn send_fire_and_forget(
        self: &Arc<Self>,
        destination: Address,
        cluster_id: u16,
        direction: Direction,
        payload: CommandPayload,
    ) -> Result<CommandResult, NetworkError> {
        self.lifecycle.require(&[LifecycleState::Running])?;

        let (frame, _transaction_id) = self
            .pipeline
            .build_outbound(destination, cluster_id, direction, &payload);

        let transport = Arc::clone(&self.transport);
        Ok(self
            .correlator
            .broadcast(move || {
                let transport = Arc::clone(&transport);
                let frame = frame.clone();
                async move { transport.send_command(frame).await.map_err(NetworkError::from) }
            })
            .await)
    }

    // --- convenience operations ---

    /// Sends a Management Permit Joining Request to the broadcast-to-
    /// routers address. Any number of routers may act on it, so this does
    /// not wait for a reply.
    pub async fn permit_join(self: &Arc<Self>, duration_secs: u16) -> Result<CommandResult, NetworkError> {
        self.permit_join_at(Address::Device(DeviceAddress::new(BROADCAST_ROUTERS, 0)), duration_secs)
            .await
    }

    pub async fn permit_join_at(
        self: &Arc<Self>,
        destination: Address,
        duration_secs: u16,
    ) -> Result<CommandResult, NetworkError> {
        let duration_secs = duration_secs.min(255) as u8;
        let payload = CommandPayload::Zdo(ZdoCommand::ManagementPermitJoiningRequest(
            ManagementPermitJoiningRequest {
                transaction_seq: 0,
                duration_secs,
                tc_significance: true,
            },
        ));
        self.send_fire_and_forget(
            destination,
            zigbee_commands::ZdoCluster::MgmtPermitJoiningReq as u16,
            Direction::ClientToServer,
            payload,
        )
        .await
    }

    pub async fn leave(
        self: &Arc<Self>,
        parent_nwk: NetworkAddress,
        end_device_ieee: IeeeAddress,
    ) -> Result<CommandResult, NetworkError> {
        let payload = CommandPayload::Zdo(ZdoCommand::ManagementLeaveRequest(ManagementLeaveRequest {
            transaction_seq: 0,
            device_address: end_device_ieee.0,
            remove_children: false,
            rejoin: false,
        }));
        self.send_zdo(
            Address::Device(DeviceAddress::new(parent_nwk.0, 0)),
            zigbee_commands::ZdoCluster::MgmtLeaveReq as u16,
            payload,
        )
        .await
    }

    pub async fn read(
        self: &Arc<Self>,
        destination: DeviceAddress,
        cluster_id: u16,
        attribute_ids: Vec<u16>,
    ) -> Result<CommandResult, NetworkError> {
        let payload = CommandPayload::Zcl(ZclCommand::ReadAttributes(ReadAttributes { attribute_ids }));
        self.send(
            Address::Device(destination),
            cluster_id,
            Direction::ClientToServer,
            payload,
        )
        .await
    }

    pub async fn write(
        self: &Arc<Self>,
        destination: DeviceAddress,
        cluster_id: u16,
        attribute_id: u16,
        value: AttributeValue,
    ) -> Result<CommandResult, NetworkError> {
        let payload = CommandPayload::Zcl(ZclCommand::WriteAttributes(WriteAttributes {
            writes: vec![AttributeWrite { attribute_id, value }],
        }));
        self.send(
            Address::Device(destination),
            cluster_id,
            Direction::ClientToServer,
            payload,
        )
        .await
    }

    /// Binds a source endpoint's cluster to a destination. Not yet wired:
    /// the ZDO Bind Request payload (`zigbee_commands::BindRequest`) is
    /// write-only today (see its doc comment); completing this means
    /// adding the parse side and a bind-response correlation.
    pub async fn bind(
        &self,
        _source: DeviceAddress,
        _cluster_id: u16,
        _destination: DeviceAddress,
    ) -> Result<(), NetworkError> {
        Err(NetworkError::NotImplemented("ZDO bind request is not wired through yet"))
    }

    pub async fn unbind(
        &self,
        _source: DeviceAddress,
        _cluster_id: u16,
        _destination: DeviceAddress,
    ) -> Result<(), NetworkError> {
        Err(NetworkError::NotImplemented("ZDO unbind request is not wired through yet"))
    }

    pub async fn discover_endpoints(self: &Arc<Self>, nwk_addr: NetworkAddress) -> Result<CommandResult, NetworkError> {
        let payload = CommandPayload::Zdo(ZdoCommand::ActiveEndpointsRequest(ActiveEndpointsRequest {
            transaction_seq: 0,
            nwk_addr_of_interest: nwk_addr.0,
        }));
        self.send_zdo(
            Address::Device(DeviceAddress::new(nwk_addr.0, 0)),
            zigbee_commands::ZdoCluster::ActiveEpReq as u16,
            payload,
        )
        .await
    }

    pub async fn discover_simple_descriptor(
        self: &Arc<Self>,
        nwk_addr: NetworkAddress,
        endpoint: u8,
    ) -> Result<CommandResult, NetworkError> {
        let payload = CommandPayload::Zdo(ZdoCommand::SimpleDescriptorRequest(SimpleDescriptorRequest {
            transaction_seq: 0,
            nwk_addr: nwk_addr.0,
            endpoint,
        }));
        self.send_zdo(
            Address::Device(DeviceAddress::new(nwk_addr.0, 0)),
            zigbee_commands::ZdoCluster::SimpleDescReq as u16,
            payload,
        )
        .await
    }

    pub fn add_membership(&self, group_id: GroupId, label: impl Into<String>) {
        let label = label.into();
        if let Some(mut group) = self.model.get_group(group_id) {
            group.label = label;
            self.model.update_group(group);
        } else {
            self.model.add_group(Group { id: group_id, label });
        }
    }

    // --- mesh model passthroughs ---

    #[must_use]
    pub fn get_node(&self, nwk: NetworkAddress) -> Option<Node> {
        self.model.get_node(nwk)
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.model.nodes()
    }

    pub fn remove_node(&self, nwk: NetworkAddress) -> Option<Node> {
        self.model.remove_node(nwk)
    }

    #[must_use]
    pub fn get_device(&self, address: DeviceAddress) -> Option<Device> {
        self.model.get_device(address)
    }

    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.model.devices()
    }

    pub fn remove_device(&self, address: DeviceAddress) -> Option<Device> {
        self.model.remove_device(address)
    }

    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.model.groups()
    }

    pub fn remove_group(&self, id: GroupId) -> Option<Group> {
        self.model.remove_group(id)
    }

    // --- listener subscription passthroughs ---

    pub fn on_node(&self, callback: impl Fn(&NodeEvent) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_node(callback)
    }

    pub fn on_device(&self, callback: impl Fn(&DeviceEvent) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_device(callback)
    }

    pub fn on_group(&self, callback: impl Fn(&GroupEvent) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_group(callback)
    }

    pub fn on_state(&self, callback: impl Fn(&zigbee_transport::NetworkState) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_state(callback)
    }

    pub fn on_announce(&self, callback: impl Fn(&AnnounceEvent) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_announce(callback)
    }

    pub fn on_command(&self, callback: impl Fn(&Command) + Send + Sync + 'static) -> ListenerId {
        self.dispatcher.on_command(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceRole;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zigbee_transport::MockTransport;

    fn manager() -> Arc<NetworkManager> {
        NetworkManager::new(Arc::new(MockTransport::new()), None)
    }

    #[tokio::test]
    async fn initialize_transitions_to_initialized() {
        let manager = manager();
        manager.initialize().await.unwrap();
        assert_eq!(manager.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn setters_are_illegal_before_initialize() {
        let manager = manager();
        let err = manager.set_channel(15).await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidState));
    }

    #[tokio::test]
    async fn channel_setter_rejects_out_of_range_before_touching_transport() {
        let manager = manager();
        manager.initialize().await.unwrap();
        let err = manager.set_channel(40).await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn startup_requires_initialized_state() {
        let manager = manager();
        let err = manager.startup(false).await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidState));
    }

    #[tokio::test]
    async fn startup_then_shutdown_round_trips_lifecycle() {
        let manager = manager();
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();
        assert_eq!(manager.state(), LifecycleState::Running);
        manager.shutdown().await.unwrap();
        assert_eq!(manager.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let manager = manager();
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();
        manager.shutdown().await.unwrap();
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn add_membership_creates_then_relabels_group() {
        let manager = manager();
        manager.add_membership(GroupId(10), "kitchen");
        assert_eq!(manager.groups().len(), 1);
        manager.add_membership(GroupId(10), "den");
        let groups = manager.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "den");
    }

    #[tokio::test]
    async fn bind_reports_not_implemented() {
        let manager = manager();
        let err = manager
            .bind(DeviceAddress::new(1, 1), 0x0006, DeviceAddress::new(2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn device_announce_adds_a_new_node() {
        let manager = manager();
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        manager.on_node(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        manager
            .handle_device_announce(DeviceAnnounce {
                transaction_seq: 1,
                nwk_addr: 0x5678,
                ieee_addr: [1; 8],
                capability: 0x02,
            })
            .await;

        assert!(manager.get_node(NetworkAddress(0x5678)).is_some());
        assert_eq!(
            manager.get_node(NetworkAddress(0x5678)).unwrap().role,
            DeviceRole::Router
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn read_attribute_completes_once_response_arrives() {
        let transport = Arc::new(MockTransport::new());
        let manager = NetworkManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();

        let destination = DeviceAddress::new(0x1234, 1);
        let manager_for_read = Arc::clone(&manager);
        let read_task = tokio::spawn(async move {
            manager_for_read
                .read(destination, 0x0006, vec![0x0000])
                .await
                .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        let transaction_id = sent[0].sequence;

        let response = ZclCommand::ReadAttributesResponse(zigbee_commands::zcl_generic::ReadAttributesResponse {
            results: vec![zigbee_commands::zcl_generic::AttributeReadResult {
                attribute_id: 0x0000,
                status: 0,
                value: Some(AttributeValue::Uint8(42)),
            }],
        });
        let mut header = zigbee_transport::ZclHeader::new(
            zigbee_transport::FrameType::EntireProfile,
            zigbee_transport::Direction::ServerToClient,
            transaction_id,
            response.command_id(),
        );
        header.manufacturer_code = None;
        let mut ser = zigbee_transport::ByteSerializer::new();
        header.write(&mut ser);
        ser.write_bytes(&response.serialize());

        transport.emit_aps(zigbee_transport::ApsFrame {
            profile_id: zigbee_commands::profile::HOME_AUTOMATION,
            cluster_id: 0x0006,
            src_addr: 0x1234,
            src_endpoint: 1,
            dest_addr: zigbee_transport::ApsFrame::HOST_ADDRESS,
            dest_endpoint: 1,
            aps_counter: 0,
            sequence: transaction_id,
            radius: zigbee_transport::ApsFrame::DEFAULT_RADIUS,
            address_mode: zigbee_transport::ApsAddressMode::Device,
            payload: ser.into_bytes(),
        });

        let result = tokio::time::timeout(Duration::from_secs(1), read_task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, CommandResult::Matched(_)));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn permit_join_broadcasts_without_waiting_for_a_reply() {
        let transport = Arc::new(MockTransport::new());
        let manager = NetworkManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();

        let result = manager.permit_join(60).await.unwrap();
        assert!(matches!(result, CommandResult::Broadcast));

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dest_addr, BROADCAST_ROUTERS);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn discover_endpoints_correlates_against_offset_response_cluster() {
        let transport = Arc::new(MockTransport::new());
        let manager = NetworkManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);
        manager.initialize().await.unwrap();
        manager.startup(false).await.unwrap();

        let nwk_addr = NetworkAddress(0x5678);
        let manager_for_discover = Arc::clone(&manager);
        let discover_task = tokio::spawn(async move { manager_for_discover.discover_endpoints(nwk_addr).await.unwrap() });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].cluster_id, zigbee_commands::ZdoCluster::ActiveEpReq as u16);
        let transaction_id = sent[0].sequence;

        let response = zigbee_commands::zdo::ActiveEndpointsResponse {
            transaction_seq: 0,
            status: 0,
            nwk_addr: nwk_addr.0,
            endpoints: vec![1, 2],
        };
        let mut ser = zigbee_transport::ByteSerializer::new();
        response.write(&mut ser);

        transport.emit_aps(zigbee_transport::ApsFrame {
            profile_id: zigbee_commands::profile::ZDO,
            cluster_id: zigbee_commands::ZdoCluster::ActiveEpRsp as u16,
            src_addr: nwk_addr.0,
            src_endpoint: 0,
            dest_addr: zigbee_transport::ApsFrame::HOST_ADDRESS,
            dest_endpoint: 0,
            aps_counter: 0,
            sequence: transaction_id,
            radius: zigbee_transport::ApsFrame::DEFAULT_RADIUS,
            address_mode: zigbee_transport::ApsAddressMode::Device,
            payload: ser.into_bytes(),
        });

        let result = tokio::time::timeout(Duration::from_secs(1), discover_task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, CommandResult::Matched(_)));

        manager.shutdown().await.unwrap();
    }
}
