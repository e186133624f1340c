//! Network bring-up before the first channel connect.
//!
//! On the reference hardware this is the Wi-Fi association step. On a host
//! the link is already up, so [`HostNetwork`] only checks that the broker
//! name resolves. Either way the driver bounds the step with a timeout and
//! carries on if it fails.

use crate::error::{ChannelError, Result};
use crate::transport::BrokerAddress;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Brings up connectivity.
pub trait NetworkLink: Send {
    /// Bring the link up.
    ///
    /// # Errors
    ///
    /// Returns an error if the link could not be established.
    fn bring_up(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Host network: resolves the broker address.
#[derive(Debug, Clone)]
pub struct HostNetwork {
    broker: BrokerAddress,
}

impl HostNetwork {
    pub fn new(broker: BrokerAddress) -> Self {
        Self { broker }
    }
}

impl NetworkLink for HostNetwork {
    fn bring_up(&mut self) -> impl Future<Output = Result<()>> + Send {
        let target = self.broker.to_string();

        async move {
            let mut addresses = tokio::net::lookup_host(target.as_str()).await?;
            match addresses.next() {
                Some(address) => {
                    info!(broker = %target, %address, "broker address resolved");
                    Ok(())
                }
                None => Err(ChannelError::Transport(format!(
                    "no address found for {target}"
                ))),
            }
        }
    }
}

/// Run `link.bring_up()` bounded by `timeout`.
///
/// Returns `true` on success. Failures and timeouts are logged, never
/// returned: the kiosk must start without a network.
pub async fn bring_up_with_timeout<L: NetworkLink>(link: &mut L, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, link.bring_up()).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            warn!(%error, "network bring-up failed, continuing offline");
            false
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "network bring-up timed out, continuing offline"
            );
            false
        }
    }
}
