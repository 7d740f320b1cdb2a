//! Async serial `Transport` for a ConBee-II-style deCONZ coordinator
//!
//! Frames an `ApsFrame` into the deCONZ serial envelope, SLIP-encodes it
//! onto a serial port, and decodes the same for inbound traffic. A
//! blocking reader thread feeds decoded frames to an async frame-handler
//! task over a channel, because serial reads do not belong on the tokio
//! executor.

use crate::aps::{ApsAddressMode, ApsFrame};
use crate::commands::{CommandId, NetworkParameter, NetworkStateCommand};
use crate::error::{ProtocolError, Status};
use crate::serial_frame::SerialFrame;
use crate::slip::{SlipDecoder, SlipEncoder};
use crate::transport::{ApsFrameIndication, JoinResult, NetworkState, Transport, TransportEvent};

use async_trait::async_trait;
use serial2::SerialPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

pub const BAUD_RATE: u32 = 115200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingRequest {
    response_tx: oneshot::Sender<Result<SerialFrame, ProtocolError>>,
}

enum WriteCommand {
    Send(Vec<u8>),
    Shutdown,
}

struct ReceivedFrame {
    data: Vec<u8>,
}

/// Serial transport talking the deCONZ protocol to a ConBee II (or
/// compatible) coordinator.
pub struct SerialTransport {
    write_tx: mpsc::Sender<WriteCommand>,
    sequence: AtomicU8,
    pending: Arc<Mutex<HashMap<u8, PendingRequest>>>,
    event_tx: broadcast::Sender<TransportEvent>,
}

impl SerialTransport {
    /// Connect to a deCONZ coordinator at the given serial port path.
    pub async fn connect(path: &str) -> Result<Self, ProtocolError> {
        tracing::info!("Connecting to deCONZ device at {}", path);

        let mut port = SerialPort::open(path, BAUD_RATE).map_err(ProtocolError::SerialError)?;
        port.set_read_timeout(Duration::from_millis(100))
            .map_err(ProtocolError::SerialError)?;
        let reader_port = port.try_clone().map_err(ProtocolError::SerialError)?;

        let pending: Arc<Mutex<HashMap<u8, PendingRequest>>> = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, _) = broadcast::channel(64);
        let (write_tx, write_rx) = mpsc::channel(32);
        let (frame_tx, frame_rx) = mpsc::channel::<ReceivedFrame>(64);

        tokio::spawn(Self::writer_task(port, write_rx));
        std::thread::spawn(move || Self::reader_thread(reader_port, frame_tx));

        let pending_clone = pending.clone();
        let event_tx_clone = event_tx.clone();
        tokio::spawn(Self::frame_handler_task(frame_rx, pending_clone, event_tx_clone));

        tracing::info!("Connected to deCONZ device");

        Ok(Self {
            write_tx,
            sequence: AtomicU8::new(1),
            pending,
            event_tx,
        })
    }

    async fn writer_task(port: SerialPort, mut rx: mpsc::Receiver<WriteCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriteCommand::Send(data) => {
                    tracing::debug!("Writing {} bytes to serial port", data.len());
                    if let Err(e) = port.write_all(&data) {
                        tracing::error!("Write error: {}", e);
                    }
                    if let Err(e) = port.flush() {
                        tracing::error!("Flush error: {}", e);
                    }
                }
                WriteCommand::Shutdown => break,
            }
        }
        tracing::debug!("Writer task shutting down");
    }

    fn reader_thread(port: SerialPort, frame_tx: mpsc::Sender<ReceivedFrame>) {
        tracing::debug!("Reader thread started");
        let mut buffer = [0u8; 1024];
        let mut decoder = SlipDecoder::new();

        loop {
            match port.read(&mut buffer) {
                Ok(0) => {
                    tracing::warn!("Serial port closed");
                    break;
                }
                Ok(n) => {
                    for frame_data in decoder.feed(&buffer[..n]) {
                        if frame_tx.blocking_send(ReceivedFrame { data: frame_data }).is_err() {
                            tracing::warn!("Frame channel closed");
                            return;
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(ref e) if e.raw_os_error() == Some(libc::EAGAIN) => continue,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
                Err(e) => {
                    tracing::error!("Serial read error: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("Reader thread shutting down");
    }

    async fn frame_handler_task(
        mut frame_rx: mpsc::Receiver<ReceivedFrame>,
        pending: Arc<Mutex<HashMap<u8, PendingRequest>>>,
        event_tx: broadcast::Sender<TransportEvent>,
    ) {
        while let Some(received) = frame_rx.recv().await {
            if let Err(e) = Self::handle_frame(&received.data, &pending, &event_tx).await {
                tracing::warn!("Error handling frame: {}", e);
            }
        }
        tracing::debug!("Frame handler task shutting down");
    }

    async fn handle_frame(
        data: &[u8],
        pending: &Arc<Mutex<HashMap<u8, PendingRequest>>>,
        event_tx: &broadcast::Sender<TransportEvent>,
    ) -> Result<(), ProtocolError> {
        let frame = SerialFrame::deserialize(data)?;

        let mut pending_guard = pending.lock().await;
        if let Some(req) = pending_guard.remove(&frame.sequence) {
            drop(pending_guard);
            let _ = req.response_tx.send(Ok(frame));
            return Ok(());
        }
        drop(pending_guard);

        match frame.command_id {
            CommandId::DeviceStateChanged => {
                if !frame.payload.is_empty() {
                    let state = device_state_to_network_state(frame.payload[0]);
                    let _ = event_tx.send(TransportEvent::NetworkStateChanged(state));
                }
            }
            CommandId::ApsDataIndication => {
                if let Ok((indication, announce)) = parse_aps_indication(&frame.payload) {
                    let _ = event_tx.send(TransportEvent::ApsIndication(indication));
                    if let Some((nwk_addr, capability)) = announce {
                        let _ = event_tx.send(TransportEvent::DeviceAnnounced { nwk_addr, capability });
                    }
                }
            }
            _ => {
                tracing::debug!("Unhandled unsolicited frame: {:?}", frame.command_id);
            }
        }

        Ok(())
    }

    async fn request(&self, command_id: CommandId, payload: Vec<u8>) -> Result<SerialFrame, ProtocolError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = SerialFrame::new(command_id, sequence, payload);
        let data = SlipEncoder::encode(&frame.serialize());

        let (response_tx, response_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(sequence, PendingRequest { response_tx });
        }

        self.write_tx
            .send(WriteCommand::Send(data))
            .await
            .map_err(|_| ProtocolError::NotConnected)?;

        match tokio::time::timeout(DEFAULT_TIMEOUT, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProtocolError::Timeout),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&sequence);
                Err(ProtocolError::Timeout)
            }
        }
    }

    async fn read_parameter(&self, param: NetworkParameter) -> Result<Vec<u8>, ProtocolError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.push(param as u8);

        let response = self.request(CommandId::ReadParameter, payload).await?;
        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(ProtocolError::DeviceError(status));
        }
        if response.payload.len() < 3 {
            return Err(ProtocolError::InvalidFrame("parameter response too short".into()));
        }
        Ok(response.payload[3..].to_vec())
    }

    async fn write_parameter(&self, param: NetworkParameter, value: &[u8]) -> Result<(), ProtocolError> {
        let payload_len = (1 + value.len()) as u16;
        let mut payload = Vec::new();
        payload.extend_from_slice(&payload_len.to_le_bytes());
        payload.push(param as u8);
        payload.extend_from_slice(value);

        let response = self.request(CommandId::WriteParameter, payload).await?;
        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(ProtocolError::DeviceError(status));
        }
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.write_tx.try_send(WriteCommand::Shutdown);
    }
}

fn device_state_to_network_state(byte: u8) -> NetworkState {
    match byte & 0x03 {
        0 => NetworkState::Offline,
        1 => NetworkState::Joining,
        2 => NetworkState::Connected,
        _ => NetworkState::Leaving,
    }
}

/// Parse a deCONZ APS_DATA_INDICATION payload into our `ApsFrameIndication`,
/// plus an optional device-announce tuple if the ZDO Device_annce (cluster
/// 0x0013) was embedded.
fn parse_aps_indication(
    data: &[u8],
) -> Result<(ApsFrameIndication, Option<(u16, u8)>), ProtocolError> {
    if data.len() < 15 {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }
    let mut idx = 2; // skip payload_len
    idx += 1; // device_state byte
    let dest_addr_mode = data[idx];
    idx += 1;
    let (dest_addr, dest_addr_len) = match dest_addr_mode {
        0x01 | 0x02 => (u16::from_le_bytes([data[idx], data[idx + 1]]), 2),
        0x03 => (0, 8),
        _ => (u16::from_le_bytes([data[idx], data[idx + 1]]), 10),
    };
    idx += dest_addr_len;
    let dest_endpoint = data[idx];
    idx += 1;

    let src_addr_mode = data[idx];
    idx += 1;
    let src_short_addr = match src_addr_mode {
        0x01 | 0x02 => {
            let a = u16::from_le_bytes([data[idx], data[idx + 1]]);
            idx += 2;
            a
        }
        0x03 => {
            idx += 8;
            0
        }
        _ => {
            let a = u16::from_le_bytes([data[idx], data[idx + 1]]);
            idx += 10;
            a
        }
    };
    let src_endpoint = data[idx];
    idx += 1;

    let profile_id = u16::from_le_bytes([data[idx], data[idx + 1]]);
    idx += 2;
    let cluster_id = u16::from_le_bytes([data[idx], data[idx + 1]]);
    idx += 2;

    let asdu_len = u16::from_le_bytes([data[idx], data[idx + 1]]) as usize;
    idx += 2;
    if idx + asdu_len > data.len() {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }
    let asdu = data[idx..idx + asdu_len].to_vec();
    idx += asdu_len;

    let lqi = if idx < data.len() { data[idx] } else { 0 };
    let rssi = if idx + 1 < data.len() { data[idx + 1] as i8 } else { 0 };

    // ZDO device announcement: profile 0x0000, cluster 0x0013
    let announce = if profile_id == ApsFrame::PROFILE_ZDO && cluster_id == 0x0013 && asdu.len() >= 12 {
        let short_addr = u16::from_le_bytes([asdu[1], asdu[2]]);
        let capability = asdu[11];
        Some((short_addr, capability))
    } else {
        None
    };

    let frame = ApsFrame {
        profile_id,
        cluster_id,
        src_addr: src_short_addr,
        src_endpoint,
        dest_addr,
        dest_endpoint,
        aps_counter: 0,
        sequence: 0,
        radius: 0,
        address_mode: ApsAddressMode::Device,
        payload: asdu,
    };

    Ok((ApsFrameIndication { frame, lqi, rssi }, announce))
}

/// Serialize an outbound `ApsFrame` into a deCONZ `APS_DATA_REQUEST` payload.
fn serialize_aps_request(request_id: u8, frame: &ApsFrame) -> Vec<u8> {
    let mut data = Vec::new();
    let payload_start = data.len();
    data.extend_from_slice(&0u16.to_le_bytes());

    data.push(request_id);
    data.push(0x00); // flags

    let addr_mode: u8 = match frame.address_mode {
        ApsAddressMode::Device => 0x02,
        ApsAddressMode::Group => 0x01,
    };
    data.push(addr_mode);
    data.extend_from_slice(&frame.dest_addr.to_le_bytes());
    data.push(frame.dest_endpoint);

    data.extend_from_slice(&frame.profile_id.to_le_bytes());
    data.extend_from_slice(&frame.cluster_id.to_le_bytes());
    data.push(frame.src_endpoint);

    data.extend_from_slice(&(frame.payload.len() as u16).to_le_bytes());
    data.extend_from_slice(&frame.payload);

    data.push(0x04); // tx options: APS ACK requested
    data.push(frame.radius);

    let payload_len = (data.len() - 2) as u16;
    data[payload_start..payload_start + 2].copy_from_slice(&payload_len.to_le_bytes());
    data
}

#[async_trait]
impl Transport for SerialTransport {
    async fn initialize(&self) -> Result<JoinResult, ProtocolError> {
        let state = self.read_parameter(NetworkParameter::NwkAddress).await;
        match state {
            Ok(_) => Ok(JoinResult::Joined),
            Err(ProtocolError::DeviceError(Status::NoNetwork)) => Ok(JoinResult::NotJoined),
            Err(_) => Ok(JoinResult::Failed),
        }
    }

    async fn startup(&self, _reinitialize: bool) -> Result<bool, ProtocolError> {
        let payload = vec![NetworkStateCommand::Online as u8];
        let response = self.request(CommandId::ChangeNetworkState, payload).await?;
        Ok(Status::try_from(response.status).unwrap_or(Status::Error) == Status::Success)
    }

    async fn shutdown(&self) -> Result<(), ProtocolError> {
        let payload = vec![NetworkStateCommand::Offline as u8];
        self.request(CommandId::ChangeNetworkState, payload).await?;
        Ok(())
    }

    async fn get_channel(&self) -> Result<u8, ProtocolError> {
        let v = self.read_parameter(NetworkParameter::CurrentChannel).await?;
        Ok(v.first().copied().unwrap_or(0))
    }

    async fn set_channel(&self, channel: u8) -> Result<(), ProtocolError> {
        self.write_parameter(NetworkParameter::CurrentChannel, &[channel]).await
    }

    async fn get_pan_id(&self) -> Result<u16, ProtocolError> {
        let v = self.read_parameter(NetworkParameter::NwkPanId).await?;
        Ok(if v.len() >= 2 { u16::from_le_bytes([v[0], v[1]]) } else { 0 })
    }

    async fn set_pan_id(&self, pan_id: u16) -> Result<(), ProtocolError> {
        self.write_parameter(NetworkParameter::NwkPanId, &pan_id.to_le_bytes()).await
    }

    async fn get_extended_pan_id(&self) -> Result<u64, ProtocolError> {
        let v = self.read_parameter(NetworkParameter::NwkExtendedPanId).await?;
        if v.len() < 8 {
            return Err(ProtocolError::InvalidFrame("extended PAN id too short".into()));
        }
        Ok(u64::from_le_bytes(v[..8].try_into().unwrap()))
    }

    async fn set_extended_pan_id(&self, extended_pan_id: u64) -> Result<(), ProtocolError> {
        self.write_parameter(NetworkParameter::NwkExtendedPanId, &extended_pan_id.to_le_bytes())
            .await
    }

    async fn set_security_key(&self, key: [u8; 16]) -> Result<(), ProtocolError> {
        self.write_parameter(NetworkParameter::NetworkKey, &key).await
    }

    async fn send_command(&self, frame: ApsFrame) -> Result<(), ProtocolError> {
        let request_id = self.sequence.load(Ordering::SeqCst);
        let payload = serialize_aps_request(request_id, &frame);
        let response = self.request(CommandId::ApsDataRequest, payload).await?;
        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(ProtocolError::DeviceError(status));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }
}
