//! In-memory radio hub.
//!
//! Wires any number of [`MemoryRadio`] endpoints together for integration
//! tests and host-side simulation: per-node per-pipe mailboxes, peer
//! registration enforced on send, per-link signal strength, and
//! channel-matched beacon-marker delivery. Fragmentation and air-time are not
//! modeled; a message either arrives whole or the destination does not exist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::beacon::VendorMarker;
use crate::radio::{MarkerSink, Pipe, Radio, RadioAddr, RadioError, ScanRecord};
use crate::{LMK_LEN, MAX_MESSAGE_LEN};

/// Signal strength reported when no explicit link value is set.
pub const DEFAULT_RSSI: i8 = -50;

type Message = (RadioAddr, Vec<u8>);

struct PipeBox {
    tx: mpsc::UnboundedSender<Message>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl PipeBox {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }
}

struct NodeState {
    peers: HashMap<RadioAddr, Option<[u8; LMK_LEN]>>,
    marker: Option<VendorMarker>,
    filter: Option<(VendorMarker, MarkerSink)>,
    channel: u8,
}

struct NodeSlot {
    state: Mutex<NodeState>,
    pipes: Vec<PipeBox>,
}

impl NodeSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(NodeState {
                peers: HashMap::new(),
                marker: None,
                filter: None,
                channel: 1,
            }),
            pipes: (0..Pipe::COUNT).map(|_| PipeBox::new()).collect(),
        }
    }
}

/// The shared medium connecting [`MemoryRadio`] endpoints.
pub struct MemoryHub {
    nodes: Mutex<HashMap<RadioAddr, Arc<NodeSlot>>>,
    /// `(advertiser, observer) -> rssi` as measured by the observer
    links: Mutex<HashMap<(RadioAddr, RadioAddr), i8>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
        })
    }

    /// Add a node to the medium and return its radio endpoint.
    pub fn join(self: &Arc<Self>, addr: RadioAddr) -> Arc<MemoryRadio> {
        let slot = Arc::new(NodeSlot::new());
        self.nodes.lock().unwrap().insert(addr, Arc::clone(&slot));

        Arc::new(MemoryRadio {
            hub: Arc::clone(self),
            addr,
            slot,
        })
    }

    /// Set the signal strength `observer` measures on `advertiser`'s beacons.
    pub fn set_link_rssi(&self, advertiser: RadioAddr, observer: RadioAddr, rssi: i8) {
        self.links
            .lock()
            .unwrap()
            .insert((advertiser, observer), rssi);
    }

    /// Re-deliver every advertised marker, as live beacons do periodically.
    /// Tests drive this through [`MemoryHub::spawn_beacon_pump`].
    pub fn pump_markers(&self) {
        let advertisers: Vec<RadioAddr> = self.nodes.lock().unwrap().keys().copied().collect();
        for addr in advertisers {
            self.broadcast_from(addr);
        }
    }

    /// Spawn a task re-delivering markers every `period`, approximating the
    /// beacon interval of a real access point.
    pub fn spawn_beacon_pump(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                hub.pump_markers();
            }
        })
    }

    /// Deliver `advertiser`'s marker (if any) to every same-channel node with
    /// a matching filter installed.
    fn broadcast_from(&self, advertiser: RadioAddr) {
        // Collect sinks under the lock, invoke outside it
        let mut deliveries: Vec<(MarkerSink, ScanRecord)> = Vec::new();

        {
            let nodes = self.nodes.lock().unwrap();
            let Some(slot) = nodes.get(&advertiser) else {
                return;
            };

            let (marker, adv_channel) = {
                let state = slot.state.lock().unwrap();
                match state.marker {
                    Some(marker) => (marker, state.channel),
                    None => return,
                }
            };

            let links = self.links.lock().unwrap();

            for (addr, other) in nodes.iter() {
                if *addr == advertiser {
                    continue;
                }

                let state = other.state.lock().unwrap();
                if state.channel != adv_channel {
                    continue;
                }

                if let Some((want, sink)) = &state.filter {
                    if *want == marker {
                        let rssi = links
                            .get(&(advertiser, *addr))
                            .copied()
                            .unwrap_or(DEFAULT_RSSI);
                        deliveries.push((
                            Arc::clone(sink),
                            ScanRecord {
                                addr: advertiser,
                                rssi,
                            },
                        ));
                    }
                }
            }
        }

        for (sink, record) in deliveries {
            sink(record);
        }
    }

    /// Deliver already-advertised markers to a node that just installed a
    /// filter.
    fn catch_up_filters(&self, observer: RadioAddr) {
        let advertisers: Vec<RadioAddr> = self
            .nodes
            .lock()
            .unwrap()
            .keys()
            .copied()
            .filter(|a| *a != observer)
            .collect();

        for addr in advertisers {
            self.broadcast_from(addr);
        }
    }

    fn slot_of(&self, addr: RadioAddr) -> Option<Arc<NodeSlot>> {
        self.nodes.lock().unwrap().get(&addr).cloned()
    }
}

/// One node's endpoint on a [`MemoryHub`].
pub struct MemoryRadio {
    hub: Arc<MemoryHub>,
    addr: RadioAddr,
    slot: Arc<NodeSlot>,
}

#[async_trait]
impl Radio for MemoryRadio {
    fn local_addr(&self) -> RadioAddr {
        self.addr
    }

    async fn add_peer(
        &self,
        addr: RadioAddr,
        lmk: Option<[u8; LMK_LEN]>,
    ) -> Result<(), RadioError> {
        self.slot.state.lock().unwrap().peers.insert(addr, lmk);
        Ok(())
    }

    async fn remove_peer(&self, addr: RadioAddr) -> Result<(), RadioError> {
        self.slot.state.lock().unwrap().peers.remove(&addr);
        Ok(())
    }

    async fn send(
        &self,
        pipe: Pipe,
        dest: RadioAddr,
        data: &[u8],
        _wait: Option<Duration>,
    ) -> Result<(), RadioError> {
        if data.len() > MAX_MESSAGE_LEN {
            return Err(RadioError::PayloadTooLarge {
                len: data.len(),
                max: MAX_MESSAGE_LEN,
            });
        }

        if !self.slot.state.lock().unwrap().peers.contains_key(&dest) {
            return Err(RadioError::PeerNotRegistered(dest));
        }

        tracing::trace!(src = %self.addr, %dest, ?pipe, len = data.len(), "radio send");

        // A frame to a node that is not on the medium vanishes into the air,
        // exactly like the real thing
        if let Some(target) = self.hub.slot_of(dest) {
            let _ = target.pipes[pipe.index()].tx.send((self.addr, data.to_vec()));
        }

        Ok(())
    }

    async fn receive(
        &self,
        pipe: Pipe,
        buf: &mut [u8],
        wait: Option<Duration>,
    ) -> Result<(RadioAddr, usize), RadioError> {
        let mut rx = self.slot.pipes[pipe.index()].rx.lock().await;

        let message = match wait {
            Some(wait) => tokio::time::timeout(wait, rx.recv())
                .await
                .map_err(|_| RadioError::Timeout)?,
            None => rx.recv().await,
        };

        let (src, data) = message.ok_or(RadioError::Closed)?;

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((src, len))
    }

    fn set_beacon_marker(&self, marker: VendorMarker) {
        self.slot.state.lock().unwrap().marker = Some(marker);
        self.hub.broadcast_from(self.addr);
    }

    fn clear_beacon_marker(&self) {
        self.slot.state.lock().unwrap().marker = None;
    }

    fn install_marker_filter(&self, marker: VendorMarker, sink: MarkerSink) {
        self.slot.state.lock().unwrap().filter = Some((marker, sink));
        self.hub.catch_up_filters(self.addr);
    }

    fn clear_marker_filter(&self) {
        self.slot.state.lock().unwrap().filter = None;
    }

    fn channel(&self) -> u8 {
        self.slot.state.lock().unwrap().channel
    }

    fn set_channel(&self, channel: u8) -> Result<(), RadioError> {
        if channel == 0 || channel > 14 {
            return Err(RadioError::InvalidChannel(channel));
        }

        self.slot.state.lock().unwrap().channel = channel;
        Ok(())
    }
}
