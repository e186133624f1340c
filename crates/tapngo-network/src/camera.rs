//! HTTP trigger for the camera streaming server.

use crate::error::Result;
use std::time::Duration;
use tapngo_hardware::{CameraCommand, CameraTrigger};
use tracing::{debug, warn};

/// Starts and stops the remote stream with `GET {base_url}/control?stream=on|off`.
///
/// Each request is spawned on the current Tokio runtime and bounded by the
/// client timeout. Failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct HttpCameraTrigger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCameraTrigger {
    /// Create a trigger for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL requested for `command`.
    pub fn control_url(&self, command: CameraCommand) -> String {
        format!("{}/control?stream={}", self.base_url, command.stream_param())
    }

    fn fire(&self, command: CameraCommand) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%command, "no async runtime, camera command dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.control_url(command);

        runtime.spawn(async move {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%command, %url, "camera command accepted");
                }
                Ok(response) => {
                    warn!(%command, status = %response.status(), "camera command rejected");
                }
                Err(error) => {
                    warn!(%command, %error, "camera command failed");
                }
            }
        });
    }
}

impl CameraTrigger for HttpCameraTrigger {
    fn start(&mut self) {
        self.fire(CameraCommand::Start);
    }

    fn stop(&mut self) {
        self.fire(CameraCommand::Stop);
    }
}
