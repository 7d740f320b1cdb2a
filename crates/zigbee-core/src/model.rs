//! Mesh model: the authoritative in-memory maps of nodes, devices, and
//! groups
//!
//! Each map is a `DashMap` (sharded-lock, the idiomatic Rust rendition of
//! "each mutable container has a single owner lock") keyed exactly as
//! spec'd: network address for nodes, (network address, endpoint) for
//! devices, group id for groups. Add is a no-op on an existing key so a
//! duplicate discovery never fires a second `Added` event; update always
//! replaces and fires `Updated`; remove fires `Removed` only when the key
//! was actually present.

use crate::address::{DeviceAddress, GroupId, IeeeAddress, NetworkAddress};
use crate::dispatcher::{Dispatcher, DeviceEvent, GroupEvent, NodeEvent};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Coordinator,
    Router,
    EndDevice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub nwk: NetworkAddress,
    pub ieee: IeeeAddress,
    pub role: DeviceRole,
    #[serde(default)]
    pub neighbors: Vec<NetworkAddress>,
}

impl Node {
    #[must_use]
    pub fn new(nwk: NetworkAddress, ieee: IeeeAddress, role: DeviceRole) -> Self {
        Self {
            nwk,
            ieee,
            role,
            neighbors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub address: DeviceAddress,
    pub ieee: IeeeAddress,
    pub profile_id: u16,
    pub device_id: u16,
    #[serde(default)]
    pub in_clusters: Vec<u16>,
    #[serde(default)]
    pub out_clusters: Vec<u16>,
}

impl Device {
    #[must_use]
    pub fn new(address: DeviceAddress, ieee: IeeeAddress) -> Self {
        Self {
            address,
            ieee,
            profile_id: 0,
            device_id: 0,
            in_clusters: Vec::new(),
            out_clusters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub label: String,
}

/// A point-in-time copy of the whole mesh, as persisted and restored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<Node>,
    pub devices: Vec<Device>,
    pub groups: Vec<Group>,
}

pub struct MeshModel {
    nodes: DashMap<NetworkAddress, Node>,
    devices: DashMap<DeviceAddress, Device>,
    groups: DashMap<GroupId, Group>,
    dispatcher: Arc<Dispatcher>,
}

impl MeshModel {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            nodes: DashMap::new(),
            devices: DashMap::new(),
            groups: DashMap::new(),
            dispatcher,
        }
    }

    /// Replaces the whole model from a restored snapshot. Does not fire
    /// listener events — this runs during `initialize`, before anything
    /// could be listening.
    pub fn restore(&self, snapshot: NetworkSnapshot) {
        self.nodes.clear();
        for node in snapshot.nodes {
            self.nodes.insert(node.nwk, node);
        }
        self.devices.clear();
        for device in snapshot.devices {
            self.devices.insert(device.address, device);
        }
        self.groups.clear();
        for group in snapshot.groups {
            self.groups.insert(group.id, group);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self.nodes.iter().map(|e| e.value().clone()).collect(),
            devices: self.devices.iter().map(|e| e.value().clone()).collect(),
            groups: self.groups.iter().map(|e| e.value().clone()).collect(),
        }
    }

    // --- nodes ---

    /// Returns `true` if the node was newly added (and fires `Added`).
    /// A no-op (returns `false`, no event) if the key already exists.
    pub fn add_node(&self, node: Node) -> bool {
        if self.nodes.contains_key(&node.nwk) {
            return false;
        }
        self.nodes.insert(node.nwk, node.clone());
        self.dispatcher.notify_node(NodeEvent::Added(node));
        true
    }

    pub fn update_node(&self, node: Node) {
        self.nodes.insert(node.nwk, node.clone());
        self.dispatcher.notify_node(NodeEvent::Updated(node));
    }

    pub fn remove_node(&self, nwk: NetworkAddress) -> Option<Node> {
        let removed = self.nodes.remove(&nwk).map(|(_, v)| v);
        if removed.is_some() {
            self.dispatcher.notify_node(NodeEvent::Removed(nwk));
        }
        removed
    }

    #[must_use]
    pub fn get_node(&self, nwk: NetworkAddress) -> Option<Node> {
        self.nodes.get(&nwk).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    // --- devices ---

    pub fn add_device(&self, device: Device) -> bool {
        if self.devices.contains_key(&device.address) {
            return false;
        }
        self.devices.insert(device.address, device.clone());
        self.dispatcher.notify_device(DeviceEvent::Added(device));
        true
    }

    pub fn update_device(&self, device: Device) {
        self.devices.insert(device.address, device.clone());
        self.dispatcher.notify_device(DeviceEvent::Updated(device));
    }

    pub fn remove_device(&self, address: DeviceAddress) -> Option<Device> {
        let removed = self.devices.remove(&address).map(|(_, v)| v);
        if removed.is_some() {
            self.dispatcher.notify_device(DeviceEvent::Removed(address));
        }
        removed
    }

    #[must_use]
    pub fn get_device(&self, address: DeviceAddress) -> Option<Device> {
        self.devices.get(&address).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    // --- groups ---

    pub fn add_group(&self, group: Group) -> bool {
        if self.groups.contains_key(&group.id) {
            return false;
        }
        self.groups.insert(group.id, group.clone());
        self.dispatcher.notify_group(GroupEvent::Added(group));
        true
    }

    pub fn update_group(&self, group: Group) {
        self.groups.insert(group.id, group.clone());
        self.dispatcher.notify_group(GroupEvent::Updated(group));
    }

    pub fn remove_group(&self, id: GroupId) -> Option<Group> {
        let removed = self.groups.remove(&id).map(|(_, v)| v);
        if removed.is_some() {
            self.dispatcher.notify_group(GroupEvent::Removed(id));
        }
        removed
    }

    #[must_use]
    pub fn get_group(&self, id: GroupId) -> Option<Group> {
        self.groups.get(&id).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.groups.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> MeshModel {
        MeshModel::new(Arc::new(Dispatcher::new()))
    }

    #[test]
    fn add_node_is_idempotent() {
        let model = model();
        let node = Node::new(NetworkAddress(1), IeeeAddress([0; 8]), DeviceRole::Router);
        assert!(model.add_node(node.clone()));
        assert!(!model.add_node(node));
        assert_eq!(model.nodes().len(), 1);
    }

    #[test]
    fn remove_unknown_node_is_a_no_op() {
        let model = model();
        assert!(model.remove_node(NetworkAddress(99)).is_none());
    }

    #[test]
    fn update_replaces_existing_entry() {
        let model = model();
        let mut node = Node::new(NetworkAddress(1), IeeeAddress([0; 8]), DeviceRole::Router);
        model.add_node(node.clone());
        node.role = DeviceRole::EndDevice;
        model.update_node(node);
        assert_eq!(model.get_node(NetworkAddress(1)).unwrap().role, DeviceRole::EndDevice);
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let model = model();
        model.add_node(Node::new(NetworkAddress(1), IeeeAddress([1; 8]), DeviceRole::Router));
        model.add_device(Device::new(DeviceAddress::new(1, 1), IeeeAddress([1; 8])));
        model.add_group(Group {
            id: GroupId(5),
            label: "kitchen".to_string(),
        });

        let snapshot = model.snapshot();
        let restored = model();
        restored.restore(snapshot);

        assert_eq!(restored.nodes().len(), 1);
        assert_eq!(restored.devices().len(), 1);
        assert_eq!(restored.groups().len(), 1);
    }
}
