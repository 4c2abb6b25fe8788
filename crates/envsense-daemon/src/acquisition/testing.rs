//! In-memory adapters for exercising acquisition without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use envsense_hw::{Error, RawSample, Result, SensorAdapter, SensorKind};
use tokio::time::Instant;

/// Replays a fixed script of results, recording when each read happened.
///
/// Once the script runs out every read times out, unless the adapter was
/// built with [`ScriptedAdapter::then_stall`], in which case the next read
/// never completes.
pub struct ScriptedAdapter {
    script: VecDeque<std::result::Result<RawSample, String>>,
    stall_when_done: bool,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedAdapter {
    pub fn new(script: impl IntoIterator<Item = std::result::Result<RawSample, String>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            stall_when_done: false,
            calls: Arc::default(),
        }
    }

    /// An adapter whose every read times out.
    pub fn failing() -> Self {
        Self::new(std::iter::empty())
    }

    /// An adapter whose first read never completes.
    pub fn stalled() -> Self {
        Self::failing().then_stall()
    }

    /// Hangs instead of failing once the script is used up. Loops over such
    /// an adapter cannot be joined after shutdown.
    pub fn then_stall(mut self) -> Self {
        self.stall_when_done = true;
        self
    }

    /// Timestamps of every read attempt.
    pub fn calls(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.calls.clone()
    }
}

impl SensorAdapter for ScriptedAdapter {
    fn kind(&self) -> SensorKind {
        SensorKind::Mcp3008
    }

    async fn read_sample(&mut self) -> Result<RawSample> {
        self.calls.lock().unwrap().push(Instant::now());
        match self.script.pop_front() {
            Some(Ok(sample)) => Ok(sample),
            Some(Err(reason)) => Err(Error::InvalidFrame(reason)),
            None if self.stall_when_done => std::future::pending().await,
            None => Err(Error::Timeout(Duration::from_secs(2))),
        }
    }
}
