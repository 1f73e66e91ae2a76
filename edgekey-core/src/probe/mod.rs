//! VPN connectivity probing
//!
//! A probe answers one question, "is the VPN connected right now?", from the
//! client's visible state. It is polled inside an authentication attempt and,
//! through [`StatusMonitor`], on a steady timer between attempts.

pub mod monitor;

pub use monitor::{Connectivity, StatusMonitor};

use crate::driver::{ControlPredicate, ExternalAppDriver};
use crate::error::ProbeError;
use async_trait::async_trait;
use std::sync::Arc;

/// Point-in-time connectivity check
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> Result<bool, ProbeError>;
}

/// Probe that treats the presence of a control as "connected"
///
/// The VPN client only offers a disconnect affordance while a tunnel is up,
/// so its presence is the connected signal.
pub struct ControlProbe {
    driver: Arc<dyn ExternalAppDriver>,
    indicator: ControlPredicate,
}

impl ControlProbe {
    pub fn new(driver: Arc<dyn ExternalAppDriver>, indicator: ControlPredicate) -> Self {
        Self { driver, indicator }
    }
}

#[async_trait]
impl ConnectivityProbe for ControlProbe {
    async fn is_connected(&self) -> Result<bool, ProbeError> {
        Ok(self.driver.find_control(&self.indicator).await?.is_some())
    }
}
