//! Scoped port registration

use std::sync::Arc;

use tracing::debug;

use super::ConferenceBridge;
use crate::error::Result;
use crate::port::{FdPortOptions, MediaPort, PortId};

/// A port registered with a bridge for as long as this value lives
///
/// Dropping it destroys the port (removing its edges). It holds the bridge
/// alive, so a bridge is never torn down before the ports registered this
/// way.
#[derive(Debug)]
pub struct OwnedPort {
    bridge: Arc<ConferenceBridge>,
    id: PortId,
}

impl OwnedPort {
    /// Port id
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Bridge the port is registered with
    pub fn bridge(&self) -> &Arc<ConferenceBridge> {
        &self.bridge
    }
}

impl Drop for OwnedPort {
    fn drop(&mut self) {
        if let Err(e) = self.bridge.destroy_port(self.id) {
            debug!("Owned port {} already gone: {}", self.id, e);
        }
    }
}

impl ConferenceBridge {
    /// Register a port, destroyed when the returned handle is dropped
    pub fn add_port_owned(self: &Arc<Self>, port: Box<dyn MediaPort>) -> Result<OwnedPort> {
        let id = self.add_port(port)?;
        Ok(OwnedPort {
            bridge: Arc::clone(self),
            id,
        })
    }

    /// Create a file-descriptor port, destroyed when the returned handle is dropped
    pub fn create_fd_port_owned(self: &Arc<Self>, options: FdPortOptions) -> Result<OwnedPort> {
        let id = self.create_fd_port(options)?;
        Ok(OwnedPort {
            bridge: Arc::clone(self),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BridgeConfig;
    use crate::port::MemoryPort;

    #[test]
    fn test_drop_destroys_port_and_edges() {
        let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default()).unwrap());
        let (a, _) = MemoryPort::new("a", bridge.format(), 160);
        let (b, _) = MemoryPort::new("b", bridge.format(), 160);
        let b = bridge.add_port(Box::new(b)).unwrap();

        {
            let a = bridge.add_port_owned(Box::new(a)).unwrap();
            bridge.connect(a.id(), b).unwrap();
            bridge.connect(b, a.id()).unwrap();
            assert_eq!(Arc::strong_count(&bridge), 2);
        }

        assert_eq!(bridge.port_ids(), vec![b]);
        assert!(bridge.connections().is_empty());
        assert_eq!(Arc::strong_count(&bridge), 1);
    }

    #[test]
    fn test_drop_after_explicit_destroy_is_harmless() {
        let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default()).unwrap());
        let (port, _) = MemoryPort::new("a", bridge.format(), 160);
        let owned = bridge.add_port_owned(Box::new(port)).unwrap();

        bridge.destroy_port(owned.id()).unwrap();
        drop(owned);
        assert_eq!(bridge.port_count(), 0);
    }
}
