//! The per-sensor acquisition loop.

use std::time::Duration;

use envsense_hw::SensorAdapter;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::buffer::SensorRecord;
use super::cell::SensorWriter;
use super::fault::BackoffPolicy;

/// Interval at which an ongoing fault streak is summarized in the log.
const FAULT_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Polls one adapter and publishes its samples.
pub struct AcquisitionLoop<A> {
    sensor_id: String,
    adapter: A,
    writer: SensorWriter,
    policy: BackoffPolicy,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    next_sequence: u64,
}

impl<A: SensorAdapter> AcquisitionLoop<A> {
    /// Creates a loop reading `adapter` no more often than every `interval`.
    pub fn new(
        sensor_id: &str,
        adapter: A,
        writer: SensorWriter,
        policy: BackoffPolicy,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            adapter,
            writer,
            policy,
            interval,
            shutdown,
            next_sequence: 0,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs until shutdown is signalled.
    ///
    /// Read errors never leave this function: they are counted, logged and
    /// retried after the backoff delay while the last good samples stay
    /// visible to readers. Retries never come sooner than the polling
    /// interval.
    pub async fn run(mut self) {
        let mut streak_logged_at = Instant::now();
        info!(
            "Acquisition started for {} ({}, every {:?})",
            self.sensor_id,
            self.adapter.kind(),
            self.interval
        );

        loop {
            if self.shutdown_requested() {
                break;
            }

            let cycle_start = Instant::now();
            let resume_at = match self.adapter.read_sample().await {
                Ok(sample) => {
                    let record = SensorRecord {
                        sample,
                        acquired_at: Instant::now(),
                        sequence: self.next_sequence,
                    };
                    self.next_sequence += 1;

                    let ended = self.writer.update(|state| {
                        state.buffer.append(record);
                        state.fault.record_success()
                    });
                    if ended > 0 {
                        info!(
                            "Sensor {} recovered after {} failed reads",
                            self.sensor_id, ended
                        );
                    }

                    cycle_start + self.interval
                }
                Err(e) => {
                    let now = Instant::now();
                    let policy = self.policy;
                    let earliest = cycle_start + self.interval;
                    let (consecutive, retry_at) = self.writer.update(|state| {
                        state.buffer.record_fault();
                        state.fault.record_fault(e.to_string(), &policy, now);
                        (state.fault.consecutive(), state.fault.postpone_retry(earliest))
                    });

                    if consecutive == 1 {
                        warn!("Sensor {} read failed: {}", self.sensor_id, e);
                        streak_logged_at = now;
                    } else if now.duration_since(streak_logged_at) >= FAULT_LOG_INTERVAL {
                        warn!(
                            "Sensor {} still failing ({} in a row): {}",
                            self.sensor_id, consecutive, e
                        );
                        streak_logged_at = now;
                    } else {
                        debug!(
                            "Sensor {} read failed ({} in a row), retrying in {:?}: {}",
                            self.sensor_id,
                            consecutive,
                            retry_at - now,
                            e
                        );
                    }

                    retry_at
                }
            };

            tokio::select! {
                _ = tokio::time::sleep_until(resume_at) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Acquisition stopped for {}", self.sensor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::buffer::RingBuffer;
    use crate::acquisition::cell::{sensor_cell, SensorReader};
    use crate::acquisition::testing::ScriptedAdapter;
    use envsense_hw::RawSample;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn start(adapter: ScriptedAdapter) -> (SensorReader, watch::Sender<bool>) {
        let (writer, reader) = sensor_cell(RingBuffer::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let acquisition = AcquisitionLoop::new(
            "test",
            adapter,
            writer,
            BackoffPolicy::default(),
            INTERVAL,
            shutdown_rx,
        );
        tokio::spawn(acquisition.run());
        (reader, shutdown_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_successes_fill_buffer_at_interval() {
        let adapter = ScriptedAdapter::new((0..12).map(|i| Ok(RawSample::Analog(i as f64))));
        let calls = adapter.calls();
        let (reader, _shutdown) = start(adapter);

        tokio::time::sleep(Duration::from_secs(5)).await;

        let state = reader.load();
        let values: Vec<_> = state.buffer.iter().map(|r| r.sample).collect();
        let expected: Vec<_> = (2..12).map(|i| RawSample::Analog(i as f64)).collect();
        assert_eq!(values, expected);

        let calls = calls.lock().unwrap();
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule() {
        let adapter = ScriptedAdapter::failing();
        let calls = adapter.calls();
        let (reader, _shutdown) = start(adapter);

        tokio::time::sleep(Duration::from_secs(200)).await;

        let calls = calls.lock().unwrap();
        let gaps: Vec<u64> = calls
            .windows(2)
            .take(7)
            .map(|pair| (pair[1] - pair[0]).as_secs_f64().round() as u64)
            .collect();
        assert_eq!(gaps, vec![1, 2, 4, 8, 16, 30, 30]);

        let state = reader.load();
        assert_eq!(state.fault.consecutive() as usize, calls.len());
        assert_eq!(state.buffer.total_faults() as usize, calls.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_retries_respect_interval() {
        let adapter = ScriptedAdapter::failing();
        let calls = adapter.calls();
        let (writer, reader) = sensor_cell(RingBuffer::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(
            AcquisitionLoop::new(
                "test",
                adapter,
                writer,
                BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(20)),
                INTERVAL,
                shutdown_rx,
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;

        let calls = calls.lock().unwrap();
        assert!(calls.len() >= 5);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= INTERVAL, "retried after {:?}", pair[1] - pair[0]);
        }

        let state = reader.load();
        let retry_at = state.fault.retry_at().unwrap();
        assert!(retry_at - *calls.last().unwrap() >= INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_sensor_stays_empty() {
        let (reader, _shutdown) = start(ScriptedAdapter::failing());

        tokio::time::sleep(Duration::from_millis(1)).await;
        let state = reader.load();
        assert!(state.buffer.is_empty());
        assert!(state.buffer.last_success().is_none());
        assert_eq!(state.fault.consecutive(), 1);
        assert_eq!(state.fault.last_reason(), Some("Read timed out after 2s"));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        let state = reader.load();
        assert!(state.buffer.is_empty());
        assert!(!state.fault.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_faults_keep_previous_samples() {
        let adapter = ScriptedAdapter::new([
            Ok(RawSample::Analog(0.1)),
            Ok(RawSample::Analog(0.2)),
            Err("checksum".to_string()),
            Err("checksum".to_string()),
            Ok(RawSample::Analog(0.3)),
        ]);
        let (reader, _shutdown) = start(adapter);

        // Two successes then the first fault at 200ms
        tokio::time::sleep(Duration::from_millis(250)).await;
        let state = reader.load();
        assert_eq!(state.buffer.len(), 2);
        assert_eq!(state.fault.consecutive(), 1);

        // 1s and 2s backoff later the read succeeds at 3.2s
        tokio::time::sleep(Duration::from_secs(3)).await;
        let state = reader.load();
        assert_eq!(state.buffer.len(), 3);
        assert!(state.fault.is_healthy());
        assert_eq!(state.buffer.total_faults(), 2);
        let sequences: Vec<u64> = state.buffer.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let adapter = ScriptedAdapter::failing();
        let calls = adapter.calls();
        let (writer, _reader) = sensor_cell(RingBuffer::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            AcquisitionLoop::new(
                "test",
                adapter,
                writer,
                BackoffPolicy::default(),
                INTERVAL,
                shutdown_rx,
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        let before = calls.lock().unwrap().len();
        shutdown_tx.send_replace(true);
        handle.await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_stops_loop() {
        let (writer, _reader) = sensor_cell(RingBuffer::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            AcquisitionLoop::new(
                "test",
                ScriptedAdapter::failing(),
                writer,
                BackoffPolicy::default(),
                INTERVAL,
                shutdown_rx,
            )
            .run(),
        );

        drop(shutdown_tx);
        handle.await.unwrap();
    }
}
