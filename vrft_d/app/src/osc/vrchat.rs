use crate::osc::namespace::{DeclaredParameters, Namespace, ParamType, ParamValue};
use crate::osc::query::service::{OscQueryService, AVATAR_PARAMETER_PREFIX};
use anyhow::{anyhow, Context, Result};
use common::OscConfig;
use log::{debug, error, info};
use rosc::{decoder, encoder, OscBundle, OscMessage, OscPacket, OscType};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// VRChat over OSC. The declared set comes from OSCQuery; writes are sent as
/// one bundle per flush.
pub struct VRChatOsc {
    socket: Option<UdpSocket>,
    target_addr: String,
    receive_port: u16,
    declared: DeclaredParameters,
    pending: Vec<OscMessage>,
    updates_rx: Receiver<DeclaredParameters>,
    query_service: Option<OscQueryService>,
    change_tx: Sender<String>,
    shutdown_flag: Arc<AtomicBool>,
}

impl VRChatOsc {
    pub fn new(config: &OscConfig) -> Self {
        let (updates_tx, updates_rx) = channel();
        let (change_tx, change_rx) = channel();
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        Self {
            socket: None,
            target_addr: format!("{}:{}", config.send_address, config.send_port),
            receive_port: config.receive_port,
            declared: DeclaredParameters::default(),
            pending: Vec::new(),
            updates_rx,
            query_service: Some(OscQueryService::new(
                updates_tx,
                change_rx,
                shutdown_flag.clone(),
            )),
            change_tx,
            shutdown_flag,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.socket = Some(UdpSocket::bind("0.0.0.0:0").context("Failed to bind OSC send socket")?);

        if let Some(service) = self.query_service.take() {
            match service.start() {
                Ok(()) => info!("OSCQuery discovery started"),
                Err(e) => error!("Failed to start OSCQuery discovery: {:#}", e),
            }
        }

        let recv_socket = UdpSocket::bind(("0.0.0.0", self.receive_port))
            .with_context(|| format!("Failed to bind OSC receive port {}", self.receive_port))?;
        recv_socket.set_read_timeout(Some(Duration::from_millis(500)))?;

        let change_tx = self.change_tx.clone();
        let shutdown = self.shutdown_flag.clone();
        let port = self.receive_port;
        thread::Builder::new()
            .name("osc-listener".into())
            .spawn(move || {
                info!("Listening for OSC messages on port {}", port);
                let mut buf = [0u8; 2048];
                while !shutdown.load(Ordering::Relaxed) {
                    match recv_socket.recv_from(&mut buf) {
                        Ok((size, _)) => {
                            if let Ok((_, packet)) = decoder::decode_udp(&buf[..size]) {
                                handle_packet(packet, &change_tx);
                            }
                        }
                        Err(ref e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => error!("Error receiving OSC packet: {}", e),
                    }
                }
                info!("OSC listener thread exiting");
            })
            .context("Failed to spawn OSC listener")?;

        Ok(())
    }

    pub fn shutdown(&self) {
        info!("Shutting down OSC listener...");
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}

fn handle_packet(packet: OscPacket, change_tx: &Sender<String>) {
    match packet {
        OscPacket::Message(msg) if msg.addr == "/avatar/change" => {
            let avatar_id = match msg.args.first() {
                Some(OscType::String(s)) => s.clone(),
                _ => "Unknown".to_string(),
            };
            info!("Avatar change detected: {}", avatar_id);
            let _ = change_tx.send(avatar_id);
        }
        OscPacket::Message(_) => {}
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                handle_packet(packet, change_tx);
            }
        }
    }
}

fn to_osc(value: ParamValue) -> OscType {
    match value {
        ParamValue::Bool(b) => OscType::Bool(b),
        ParamValue::Float(f) => OscType::Float(f),
        ParamValue::Int(i) => OscType::Int(i),
    }
}

impl Namespace for VRChatOsc {
    fn declared_parameters(&self) -> DeclaredParameters {
        self.declared.clone()
    }

    fn write(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.pending.push(OscMessage {
            addr: format!("{}{}", AVATAR_PARAMETER_PREFIX, name),
            args: vec![to_osc(value)],
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let bundle = OscPacket::Bundle(OscBundle {
            timetag: rosc::OscTime::from((0, 0)),
            content: self.pending.drain(..).map(OscPacket::Message).collect(),
        });
        let buf = encoder::encode(&bundle).context("Failed to encode OSC bundle")?;

        if self.socket.is_none() {
            self.socket = Some(UdpSocket::bind("0.0.0.0:0").context("Failed to re-bind OSC socket")?);
            info!("Re-bound OSC socket");
        }
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| anyhow!("OSC socket not available"))?;

        if let Err(e) = socket.send_to(&buf, &self.target_addr) {
            self.socket = None;
            return Err(anyhow!("OSC send to {} failed: {}", self.target_addr, e));
        }
        Ok(())
    }

    fn refresh(&mut self) -> bool {
        let Some(latest) = self.updates_rx.try_iter().last() else {
            return false;
        };
        info!(
            "Avatar parameters updated: {} bool, {} float, {} int",
            latest.count(ParamType::Bool),
            latest.count(ParamType::Float),
            latest.count(ParamType::Int)
        );
        debug!(
            "FT/v2 sample: {:?}",
            latest
                .iter()
                .filter(|p| p.name.contains("FT") || p.name.contains("v2"))
                .take(10)
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
        );
        self.declared = latest;
        true
    }
}

impl Drop for VRChatOsc {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}
