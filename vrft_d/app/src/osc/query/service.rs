//! OSCQuery discovery of the runtime's declared avatar parameters.

use crate::osc::namespace::{DeclaredParameter, DeclaredParameters, ParamType, ParamValue};
use anyhow::{Context, Result};
use log::{error, info, warn};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const AVATAR_PARAMETER_PREFIX: &str = "/avatar/parameters/";

const SERVICE_TYPE: &str = "_oscjson._tcp.local.";
const INSTANCE_PREFIX: &str = "VRChat-Client-";
const DEBOUNCE: Duration = Duration::from_millis(500);
const MAX_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Map an OSC type tag onto a declared type. Other tags are not parameters
/// we can drive.
pub fn type_from_tag(tag: &str) -> Option<ParamType> {
    match tag {
        "f" | "d" => Some(ParamType::Float),
        "i" | "h" => Some(ParamType::Int),
        "T" | "F" => Some(ParamType::Bool),
        _ => None,
    }
}

#[derive(Deserialize, Debug)]
pub struct OscQueryNode {
    #[serde(rename = "FULL_PATH", default)]
    full_path: String,
    #[serde(rename = "TYPE")]
    type_: Option<String>,
    #[serde(rename = "VALUE")]
    value: Option<Vec<serde_json::Value>>,
    #[serde(rename = "CONTENTS")]
    contents: Option<HashMap<String, OscQueryNode>>,
}

fn parse_value(ty: ParamType, values: Option<&Vec<serde_json::Value>>) -> Option<ParamValue> {
    let first = values?.first()?;
    match ty {
        ParamType::Bool => first.as_bool().map(ParamValue::Bool),
        ParamType::Float => first.as_f64().map(|v| ParamValue::Float(v as f32)),
        ParamType::Int => first
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(ParamValue::Int),
    }
}

fn flatten_node(node: &OscQueryNode, params: &mut Vec<DeclaredParameter>) {
    if let Some(contents) = &node.contents {
        for child in contents.values() {
            flatten_node(child, params);
        }
    }

    // A node may carry both CONTENTS and a TYPE.
    let Some(ty) = node.type_.as_deref().and_then(type_from_tag) else {
        return;
    };
    let Some(name) = node.full_path.strip_prefix(AVATAR_PARAMETER_PREFIX) else {
        return;
    };
    params.push(DeclaredParameter {
        name: name.to_string(),
        ty,
        value: parse_value(ty, node.value.as_ref()),
    });
}

/// Flatten an `/avatar` tree into declared parameters named relative to
/// `/avatar/parameters/`.
pub fn declared_from_tree(root: &OscQueryNode) -> DeclaredParameters {
    let mut params = Vec::new();
    if let Some(parameters) = root.contents.as_ref().and_then(|c| c.get("parameters")) {
        flatten_node(parameters, &mut params);
    }
    params.sort_by(|a, b| a.name.cmp(&b.name));
    DeclaredParameters::new(params)
}

pub fn declared_from_json(json: &str) -> Result<DeclaredParameters> {
    let root: OscQueryNode =
        serde_json::from_str(json).context("Failed to parse OSCQuery avatar tree")?;
    Ok(declared_from_tree(&root))
}

fn fetch_avatar_parameters(url: &str) -> Result<DeclaredParameters> {
    let root: OscQueryNode = ureq::get(url)
        .timeout(Duration::from_secs(2))
        .call()
        .with_context(|| format!("GET {} failed", url))?
        .into_json()
        .context("Failed to read OSCQuery response")?;
    Ok(declared_from_tree(&root))
}

fn fetch_with_retry(url: String, sender: Sender<DeclaredParameters>) {
    thread::spawn(move || {
        for attempt in 1..=MAX_RETRIES {
            info!("Fetching avatar info (Attempt {}/{})...", attempt, MAX_RETRIES);
            match fetch_avatar_parameters(&url) {
                Ok(params) => {
                    info!("Fetched {} avatar parameters.", params.len());
                    let _ = sender.send(params);
                    return;
                }
                Err(e) => {
                    warn!("{:#}. Retrying in {:?}...", e, RETRY_DELAY);
                    thread::sleep(RETRY_DELAY);
                }
            }
        }
        error!("Failed to fetch avatar parameters after {} attempts.", MAX_RETRIES);
    });
}

/// Finds the runtime over mDNS and re-reads its parameter tree whenever the
/// avatar changes. New sets are delivered on `update_sender`.
pub struct OscQueryService {
    update_sender: Sender<DeclaredParameters>,
    change_receiver: Receiver<String>,
    shutdown: Arc<AtomicBool>,
}

impl OscQueryService {
    pub fn new(
        update_sender: Sender<DeclaredParameters>,
        change_receiver: Receiver<String>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            update_sender,
            change_receiver,
            shutdown,
        }
    }

    pub fn start(self) -> Result<()> {
        let current_url = Arc::new(Mutex::new(None::<String>));

        let url_for_mdns = current_url.clone();
        let sender_for_mdns = self.update_sender.clone();
        let shutdown = self.shutdown.clone();
        thread::Builder::new()
            .name("oscquery-mdns".into())
            .spawn(move || browse(url_for_mdns, sender_for_mdns, shutdown))
            .context("Failed to spawn mDNS thread")?;

        let change_rx = self.change_receiver;
        let sender = self.update_sender;
        thread::Builder::new()
            .name("oscquery-change".into())
            .spawn(move || {
                let mut last_fetch: Option<Instant> = None;
                while change_rx.recv().is_ok() {
                    if last_fetch.is_some_and(|t| t.elapsed() < DEBOUNCE) {
                        info!("Avatar change debounced (too rapid).");
                        continue;
                    }
                    last_fetch = Some(Instant::now());

                    let url = current_url.lock().ok().and_then(|u| u.clone());
                    match url {
                        Some(url) => fetch_with_retry(url, sender.clone()),
                        None => warn!("Avatar change received but no OSCQuery service is known yet."),
                    }
                }
            })
            .context("Failed to spawn avatar change thread")?;

        Ok(())
    }
}

fn browse(
    current_url: Arc<Mutex<Option<String>>>,
    sender: Sender<DeclaredParameters>,
    shutdown: Arc<AtomicBool>,
) {
    info!("Starting mDNS discovery...");

    while !shutdown.load(Ordering::Relaxed) {
        let mdns = match ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to create mDNS daemon: {}. Retrying in 5s...", e);
                thread::sleep(Duration::from_secs(5));
                continue;
            }
        };
        let receiver = match mdns.browse(SERVICE_TYPE) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to browse for {}: {}. Retrying in 5s...", SERVICE_TYPE, e);
                thread::sleep(Duration::from_secs(5));
                continue;
            }
        };
        info!("Browsing for {}...", SERVICE_TYPE);

        while let Ok(event) = receiver.recv() {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            match event {
                ServiceEvent::ServiceResolved(info) => {
                    let instance = info.get_fullname().split('.').next().unwrap_or("");
                    if !instance.starts_with(INSTANCE_PREFIX) {
                        info!("Ignored non-VRChat service: {}", instance);
                        continue;
                    }
                    let Some(ip) = info.get_addresses().iter().find(|ip| ip.is_ipv4()) else {
                        info!("Ignored service with no IPv4 address: {}", instance);
                        continue;
                    };

                    let url = format!("http://{}:{}/avatar", ip, info.get_port());
                    info!("OSCQuery service discovered at {}", url);
                    if let Ok(mut current) = current_url.lock() {
                        *current = Some(url.clone());
                    }
                    fetch_with_retry(url, sender.clone());
                }
                ServiceEvent::ServiceRemoved(_, fullname) if fullname.starts_with(INSTANCE_PREFIX) => {
                    info!("OSCQuery service removed: {}. Restarting discovery...", fullname);
                    if let Ok(mut current) = current_url.lock() {
                        *current = None;
                    }
                    let _ = sender.send(DeclaredParameters::default());
                    break;
                }
                _ => {}
            }
        }

        let _ = mdns.shutdown();
        thread::sleep(Duration::from_secs(2));
    }
}
