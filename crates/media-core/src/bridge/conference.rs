//! Conference bridge: port table, directed edges and the tick

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use super::mixer::{accumulate, saturate};
use crate::error::{Error, Result};
use crate::format::{AudioFormat, BridgeConfig};
use crate::frame::{AudioFrame, FrameType};
use crate::port::{FdPort, FdPortOptions, MediaPort, PortId, PortInfo};
use crate::status::PortStatus;

/// Port storage shared between the table and an in-flight tick
///
/// Emptied by `destroy_port`; a tick holding a clone skips empty cells.
type PortCell = Arc<Mutex<Option<Box<dyn MediaPort>>>>;

/// Lifecycle of a registered port as seen through the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Registered, never connected
    Created,
    /// At least one edge touches the port
    Connected,
    /// Was connected before, no edges now
    Disconnected,
}

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick sequence number, starting at 0
    pub tick: u64,
    /// Sources that delivered audio
    pub frames_pulled: usize,
    /// Sinks that received a mixed frame
    pub frames_pushed: usize,
    /// Port callbacks that returned an error
    pub errors: usize,
    /// Wall time spent in the tick
    pub elapsed: Duration,
}

struct Slot {
    cell: PortCell,
    info: PortInfo,
}

#[derive(Default)]
struct Topology {
    slots: BTreeMap<u32, Slot>,
    edges: BTreeSet<(PortId, PortId)>,
    /// Ids destroyed while a tick was running; not reusable until it ends
    retired: Vec<u32>,
    tick_in_progress: bool,
    ever_connected: HashSet<PortId>,
}

impl Topology {
    fn contains(&self, id: PortId) -> bool {
        self.slots.contains_key(&id.0)
    }

    fn require(&self, id: PortId) -> Result<&Slot> {
        self.slots.get(&id.0).ok_or(Error::UnknownPort(id))
    }

    fn free_slot(&self, max_ports: usize) -> Option<u32> {
        (0..max_ports as u32).find(|slot| !self.slots.contains_key(slot) && !self.retired.contains(slot))
    }

    fn has_edges(&self, id: PortId) -> bool {
        self.edges.iter().any(|&(src, dst)| src == id || dst == id)
    }

    fn remove_edges_of(&mut self, id: PortId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|&(src, dst)| src != id && dst != id);
        before - self.edges.len()
    }
}

/// Tick working set, reused across ticks
#[derive(Default)]
struct TickScratch {
    frame: AudioFrame,
    mixed: AudioFrame,
    accumulators: HashMap<PortId, Vec<i32>>,
}

/// Many-to-many mixing graph driven by a periodic tick
///
/// Ports are owned by the bridge once added and addressed by [`PortId`].
/// Edges are directed (source to sink) and carry no ownership. Each tick
/// pulls one frame from every port with outgoing edges, sums them per sink
/// in a wide accumulator, then pushes one saturated frame to every port with
/// incoming edges.
pub struct ConferenceBridge {
    config: BridgeConfig,
    format: AudioFormat,
    samples_per_frame: usize,
    topology: RwLock<Topology>,
    scratch: Mutex<TickScratch>,
    tick_count: AtomicU64,
}

impl ConferenceBridge {
    /// Create a bridge from a validated configuration
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let format = config.validate()?;
        let samples_per_frame = config.samples_per_frame();
        info!(
            "Created conference bridge: {}, {}ms frames, {} ports max",
            format.description(),
            config.ptime_ms,
            config.max_ports
        );

        Ok(Self {
            config,
            format,
            samples_per_frame,
            topology: RwLock::new(Topology::default()),
            scratch: Mutex::new(TickScratch::default()),
            tick_count: AtomicU64::new(0),
        })
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bridge audio format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Samples per frame every port must use
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Register a port and return its id
    pub fn add_port(&self, port: Box<dyn MediaPort>) -> Result<PortId> {
        let info = port.info().clone();
        if info.format != self.format {
            return Err(Error::UnsupportedFormat(format!(
                "port {} uses {}, bridge runs {}",
                info.name,
                info.format.description(),
                self.format.description()
            )));
        }
        if info.samples_per_frame != self.samples_per_frame {
            return Err(Error::UnsupportedFormat(format!(
                "port {} uses {} samples per frame, bridge uses {}",
                info.name, info.samples_per_frame, self.samples_per_frame
            )));
        }

        let mut topology = self.topology.write();
        let slot = topology
            .free_slot(self.config.max_ports)
            .ok_or(Error::TooManyPorts(self.config.max_ports))?;
        let id = PortId(slot);
        debug!("Added port {} ({}) as {}", info.name, info.signature_text(), id);
        topology.slots.insert(
            slot,
            Slot {
                cell: Arc::new(Mutex::new(Some(port))),
                info,
            },
        );
        Ok(id)
    }

    /// Create a file-descriptor port clocked by this bridge and register it
    pub fn create_fd_port(&self, options: FdPortOptions) -> Result<PortId> {
        let port = FdPort::new(options, self.format, self.samples_per_frame)?;
        self.add_port(Box::new(port))
    }

    /// Remove a port, its edges, and release it
    ///
    /// If a tick is using the port, this waits for the port's current
    /// callback to return; the rest of that tick skips it. The id becomes
    /// reusable once the tick has completed.
    pub fn destroy_port(&self, id: PortId) -> Result<()> {
        let (slot, edges_removed) = {
            let mut topology = self.topology.write();
            let slot = topology.slots.remove(&id.0).ok_or(Error::UnknownPort(id))?;
            let edges_removed = topology.remove_edges_of(id);
            topology.ever_connected.remove(&id);
            if topology.tick_in_progress {
                topology.retired.push(id.0);
            }
            (slot, edges_removed)
        };

        // Outside the table lock: may wait for an in-flight callback
        let port = slot.cell.lock().take();
        drop(port);
        debug!(
            "Destroyed {} ({}), removed {} edge(s)",
            id, slot.info.name, edges_removed
        );
        Ok(())
    }

    /// Add a directed edge; connecting an existing edge again is a no-op
    pub fn connect(&self, src: PortId, dst: PortId) -> Result<()> {
        let mut topology = self.topology.write();
        topology.require(src)?;
        topology.require(dst)?;
        if topology.edges.insert((src, dst)) {
            topology.ever_connected.insert(src);
            topology.ever_connected.insert(dst);
            debug!("Connected {} -> {}", src, dst);
        } else {
            trace!("Edge {} -> {} already present", src, dst);
        }
        Ok(())
    }

    /// Remove a directed edge; a missing edge is a no-op
    pub fn disconnect(&self, src: PortId, dst: PortId) -> Result<()> {
        let mut topology = self.topology.write();
        topology.require(src)?;
        topology.require(dst)?;
        if topology.edges.remove(&(src, dst)) {
            debug!("Disconnected {} -> {}", src, dst);
        }
        Ok(())
    }

    /// Remove every edge touching a port, returning how many were removed
    pub fn disconnect_all(&self, id: PortId) -> Result<usize> {
        let mut topology = self.topology.write();
        topology.require(id)?;
        let removed = topology.remove_edges_of(id);
        if removed > 0 {
            debug!("Disconnected {} edge(s) of {}", removed, id);
        }
        Ok(removed)
    }

    /// Whether the edge exists
    pub fn is_connected(&self, src: PortId, dst: PortId) -> bool {
        self.topology.read().edges.contains(&(src, dst))
    }

    /// All edges, ordered by source then sink
    pub fn connections(&self) -> Vec<(PortId, PortId)> {
        self.topology.read().edges.iter().copied().collect()
    }

    /// Ids of the registered ports in slot order
    pub fn port_ids(&self) -> Vec<PortId> {
        self.topology.read().slots.keys().map(|&slot| PortId(slot)).collect()
    }

    /// Number of registered ports
    pub fn port_count(&self) -> usize {
        self.topology.read().slots.len()
    }

    /// Whether a port is registered
    pub fn contains_port(&self, id: PortId) -> bool {
        self.topology.read().contains(id)
    }

    /// Static description of a port
    pub fn port_info(&self, id: PortId) -> Result<PortInfo> {
        Ok(self.topology.read().require(id)?.info.clone())
    }

    /// Degradation status of a port
    pub fn port_status(&self, id: PortId) -> Result<PortStatus> {
        let cell = self.topology.read().require(id)?.cell.clone();
        let guard = cell.lock();
        guard
            .as_ref()
            .map(|port| port.status())
            .ok_or(Error::UnknownPort(id))
    }

    /// Connection state of a port
    pub fn port_state(&self, id: PortId) -> Result<PortState> {
        let topology = self.topology.read();
        topology.require(id)?;
        Ok(if topology.has_edges(id) {
            PortState::Connected
        } else if topology.ever_connected.contains(&id) {
            PortState::Disconnected
        } else {
            PortState::Created
        })
    }

    /// Ticks completed so far
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Run one mixing cycle
    ///
    /// Port failures are logged and counted in the report; they never stop
    /// the tick.
    pub fn tick(&self) -> TickReport {
        let started = Instant::now();
        let mut scratch = self.scratch.lock();
        let tick = self.tick_count.load(Ordering::Acquire);
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        let (sources, sinks, edges) = self.snapshot();
        let spf = self.samples_per_frame;

        let TickScratch {
            frame,
            mixed,
            accumulators,
        } = &mut *scratch;
        frame.samples.resize(spf, 0);
        mixed.samples.resize(spf, 0);
        accumulators.retain(|id, _| sinks.iter().any(|(sink, _)| sink == id));
        for (sink, _) in &sinks {
            let acc = accumulators.entry(*sink).or_default();
            acc.clear();
            acc.resize(spf, 0);
        }

        // Pull phase
        for (src, cell) in &sources {
            frame.clear();
            let mut guard = cell.lock();
            let Some(port) = guard.as_mut() else {
                continue;
            };
            if let Err(e) = port.get_frame(frame) {
                report.errors += 1;
                debug!("get_frame failed on {}: {}", src, e);
                continue;
            }
            drop(guard);

            if frame.frame_type != FrameType::Audio {
                continue;
            }
            report.frames_pulled += 1;
            for &(_, dst) in edges.iter().filter(|(s, _)| s == src) {
                if let Some(acc) = accumulators.get_mut(&dst) {
                    accumulate(acc, &frame.samples);
                }
            }
        }

        // Push phase
        for (dst, cell) in &sinks {
            let Some(acc) = accumulators.get(dst) else {
                continue;
            };
            saturate(acc, &mut mixed.samples);
            mixed.frame_type = FrameType::Audio;
            mixed.timestamp = tick * spf as u64;

            let mut guard = cell.lock();
            let Some(port) = guard.as_mut() else {
                continue;
            };
            match port.put_frame(mixed) {
                Ok(()) => report.frames_pushed += 1,
                Err(e) => {
                    report.errors += 1;
                    debug!("put_frame failed on {}: {}", dst, e);
                }
            }
        }
        drop(scratch);

        {
            let mut topology = self.topology.write();
            topology.tick_in_progress = false;
            topology.retired.clear();
        }
        self.tick_count.fetch_add(1, Ordering::AcqRel);

        report.elapsed = started.elapsed();
        trace!(
            "Tick {}: pulled {}, pushed {}, errors {}",
            tick,
            report.frames_pulled,
            report.frames_pushed,
            report.errors
        );
        report
    }

    /// Copy the ports and edges a tick needs and mark the tick as running
    #[allow(clippy::type_complexity)]
    fn snapshot(&self) -> (Vec<(PortId, PortCell)>, Vec<(PortId, PortCell)>, Vec<(PortId, PortId)>) {
        let mut topology = self.topology.write();
        topology.tick_in_progress = true;

        let edges: Vec<(PortId, PortId)> = topology.edges.iter().copied().collect();
        let mut source_ids: Vec<PortId> = edges.iter().map(|&(src, _)| src).collect();
        let mut sink_ids: Vec<PortId> = edges.iter().map(|&(_, dst)| dst).collect();
        source_ids.dedup();
        sink_ids.sort();
        sink_ids.dedup();

        let lookup = |ids: Vec<PortId>| -> Vec<(PortId, PortCell)> {
            ids.into_iter()
                .filter_map(|id| topology.slots.get(&id.0).map(|slot| (id, slot.cell.clone())))
                .collect()
        };
        let sources = lookup(source_ids);
        let sinks = lookup(sink_ids);
        (sources, sinks, edges)
    }
}

impl std::fmt::Debug for ConferenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topology = self.topology.read();
        f.debug_struct("ConferenceBridge")
            .field("format", &self.format)
            .field("samples_per_frame", &self.samples_per_frame)
            .field("ports", &topology.slots.len())
            .field("edges", &topology.edges.len())
            .field("ticks", &self.tick_count())
            .finish()
    }
}

impl Drop for ConferenceBridge {
    fn drop(&mut self) {
        let topology = self.topology.get_mut();
        for (slot, entry) in std::mem::take(&mut topology.slots) {
            warn!(
                "Port {} ({}) still registered at bridge shutdown, releasing it",
                PortId(slot),
                entry.info.name
            );
        }
        topology.edges.clear();
        debug!("Conference bridge destroyed after {} ticks", self.tick_count());
    }
}
