//! An in-memory `Transport` for tests
//!
//! Records every frame handed to `send_command` and lets the test drive
//! inbound traffic by calling `emit`.

use crate::aps::ApsFrame;
use crate::error::ProtocolError;
use crate::transport::{JoinResult, NetworkState, Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

pub struct MockTransport {
    join_result: Mutex<JoinResult>,
    startup_result: Mutex<bool>,
    channel: AtomicU8,
    pan_id: AtomicU16,
    extended_pan_id: AtomicU64,
    sent: Mutex<Vec<ApsFrame>>,
    event_tx: broadcast::Sender<TransportEvent>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            join_result: Mutex::new(JoinResult::Joined),
            startup_result: Mutex::new(true),
            channel: AtomicU8::new(11),
            pan_id: AtomicU16::new(0x1234),
            extended_pan_id: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    #[must_use]
    pub fn with_join_result(self, result: JoinResult) -> Self {
        *self.join_result.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn with_channel(self, channel: u8) -> Self {
        self.channel.store(channel, Ordering::SeqCst);
        self
    }

    /// All frames handed to `send_command`, in order, since construction.
    pub fn sent_frames(&self) -> Vec<ApsFrame> {
        self.sent.lock().unwrap().clone()
    }

    /// Push an unsolicited event as if the radio had produced it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Convenience: emit an APS indication carrying `frame`.
    pub fn emit_aps(&self, frame: ApsFrame) {
        self.emit(TransportEvent::ApsIndication(crate::transport::ApsFrameIndication {
            frame,
            lqi: 255,
            rssi: 0,
        }));
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn initialize(&self) -> Result<JoinResult, ProtocolError> {
        Ok(*self.join_result.lock().unwrap())
    }

    async fn startup(&self, _reinitialize: bool) -> Result<bool, ProtocolError> {
        if *self.startup_result.lock().unwrap() {
            self.emit(TransportEvent::NetworkStateChanged(NetworkState::Connected));
        }
        Ok(*self.startup_result.lock().unwrap())
    }

    async fn shutdown(&self) -> Result<(), ProtocolError> {
        self.emit(TransportEvent::NetworkStateChanged(NetworkState::Offline));
        Ok(())
    }

    async fn get_channel(&self) -> Result<u8, ProtocolError> {
        Ok(self.channel.load(Ordering::SeqCst))
    }

    async fn set_channel(&self, channel: u8) -> Result<(), ProtocolError> {
        self.channel.store(channel, Ordering::SeqCst);
        Ok(())
    }

    async fn get_pan_id(&self) -> Result<u16, ProtocolError> {
        Ok(self.pan_id.load(Ordering::SeqCst))
    }

    async fn set_pan_id(&self, pan_id: u16) -> Result<(), ProtocolError> {
        self.pan_id.store(pan_id, Ordering::SeqCst);
        Ok(())
    }

    async fn get_extended_pan_id(&self) -> Result<u64, ProtocolError> {
        Ok(self.extended_pan_id.load(Ordering::SeqCst))
    }

    async fn set_extended_pan_id(&self, extended_pan_id: u64) -> Result<(), ProtocolError> {
        self.extended_pan_id.store(extended_pan_id, Ordering::SeqCst);
        Ok(())
    }

    async fn set_security_key(&self, _key: [u8; 16]) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn send_command(&self, frame: ApsFrame) -> Result<(), ProtocolError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }
}
