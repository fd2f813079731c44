//! # Script Bridge
//!
//! Forwards steering updates to the embedded web view that renders the wheel.
//!
//! The page listens for a DOM event named `axis-update` whose `detail` is the
//! numeric steering offset. The exact script evaluated in the page is:
//!
//! ```text
//! const event = new CustomEvent('axis-update', { detail: <offset> }); document.dispatchEvent(event);
//! ```
//!
//! [`JsonLinesBridge`] hands each request to the host process embedding the
//! web view as one JSON object per line. A `navigate` request points the view
//! at the page once; every `eval` request after that carries one script.

use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

use crate::error::{Result, WheelTrackerError};

/// DOM event name the page listens for.
pub const AXIS_UPDATE_EVENT: &str = "axis-update";

/// Builds the script that dispatches an `axis-update` event.
///
/// # Examples
///
/// ```
/// use wheel_tracker::telemetry::bridge::axis_update_script;
///
/// assert_eq!(
///     axis_update_script(0.0003),
///     "const event = new CustomEvent('axis-update', { detail: 0.0003 }); document.dispatchEvent(event);"
/// );
/// ```
#[must_use]
pub fn axis_update_script(steering_offset: f64) -> String {
    format!(
        "const event = new CustomEvent('{}', {{ detail: {} }}); document.dispatchEvent(event);",
        AXIS_UPDATE_EVENT, steering_offset
    )
}

/// Something that can evaluate script inside the display page.
pub trait ScriptBridge: Send {
    fn evaluate(&mut self, script: &str) -> Result<()>;

    /// Loads the display page. Bridges without a page accept and ignore it.
    fn navigate(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One request as written on the wire.
#[derive(Debug, Serialize)]
struct ScriptCall<'a> {
    url: &'a str,
    function: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<&'a str>,
    sent_at: String,
}

/// Writes evaluation requests as JSON lines for the web view host.
pub struct JsonLinesBridge<W: Write + Send> {
    url: String,
    writer: W,
}

impl JsonLinesBridge<std::io::Stdout> {
    /// Bridge writing to standard output.
    pub fn stdout(url: impl Into<String>) -> Self {
        Self::new(url, std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesBridge<W> {
    pub fn new(url: impl Into<String>, writer: W) -> Self {
        Self {
            url: url.into(),
            writer,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, function: &'static str, script: Option<&str>) -> Result<()> {
        let call = ScriptCall {
            url: &self.url,
            function,
            script,
            sent_at: Utc::now().to_rfc3339(),
        };
        let line = serde_json::to_string(&call)?;

        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| WheelTrackerError::Publish(format!("script bridge write failed: {}", e)))
    }
}

impl<W: Write + Send> ScriptBridge for JsonLinesBridge<W> {
    fn evaluate(&mut self, script: &str) -> Result<()> {
        self.send("eval", Some(script))?;
        debug!("Dispatched script to {}", self.url);
        Ok(())
    }

    fn navigate(&mut self) -> Result<()> {
        self.send("navigate", None)?;
        info!("Display page requested at {}", self.url);
        Ok(())
    }
}

/// Bridge used when the web view is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl ScriptBridge for NullBridge {
    fn evaluate(&mut self, _script: &str) -> Result<()> {
        Ok(())
    }
}
