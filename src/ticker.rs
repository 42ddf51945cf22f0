// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use log::*;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

use crate::Error;
use crate::Result;

/// A periodic task running on the current tokio runtime.
///
/// The callback runs once per period, starting one period after spawning.
/// Ticks missed because the runtime was busy are delayed rather than
/// replayed in a burst.
///
/// `stop()` signals the task and waits for it to finish. Dropping a running
/// ticker signals and aborts it.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn `on_tick` to be called every `period`.
    ///
    /// Fails with `Error::InvalidState` when called outside a tokio runtime.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Result<Ticker>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(Error::InvalidConfig("tick_interval".into()));
        }

        let handle = Handle::try_current()
            .map_err(|e| Error::InvalidState(format!("no tokio runtime: {}", e)))?;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = handle.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => on_tick(),
                }
            }
            debug!("ticker with period {:?} stopped", period);
        });

        debug!("ticker with period {:?} started", period);
        Ok(Ticker {
            period,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }

    /// Return the tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop the task and wait until it exits.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("ticker task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn counting_ticker(period: Duration) -> (Ticker, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(period, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (ticker, count)
    }

    #[test]
    fn ticker_without_runtime() {
        let ret = Ticker::spawn(Duration::from_millis(20), || {});
        assert!(matches!(ret, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn ticker_zero_period() {
        let ret = Ticker::spawn(Duration::ZERO, || {});
        assert_eq!(
            ret.err(),
            Some(Error::InvalidConfig("tick_interval".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_periodic() {
        let (ticker, count) = counting_ticker(Duration::from_millis(20));
        assert!(ticker.is_running());
        assert_eq!(ticker.period(), Duration::from_millis(20));

        // No immediate tick.
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(105)).await;
        let ticks = count.load(Ordering::SeqCst);
        assert!((4..=6).contains(&ticks), "ticks {}", ticks);

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stop() {
        let (ticker, count) = counting_ticker(Duration::from_millis(10));
        time::sleep(Duration::from_millis(55)).await;
        ticker.stop().await;

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks > 0);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drop() {
        let (ticker, count) = counting_ticker(Duration::from_millis(10));
        time::sleep(Duration::from_millis(35)).await;
        drop(ticker);

        let ticks = count.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }
}
