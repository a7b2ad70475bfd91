// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-client pacing of status pushes.

use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Paces one client's outbound frames.
///
/// Every send is followed by at least `period`. With acknowledgement
/// throttling on, a send is also held back until fewer than `max_in_flight`
/// frames are unacknowledged.
pub struct ThrottledTimer {
    period: Duration,
    throttle: bool,
    max_in_flight: u64,
    acked: watch::Sender<u64>,
}

impl ThrottledTimer {
    pub fn new(period: Duration, throttle: bool, max_in_flight: u64) -> Self {
        let (acked, _) = watch::channel(0);
        Self {
            period,
            throttle,
            max_in_flight,
            acked,
        }
    }

    /// Record a client acknowledgement. Stale or repeated sequence numbers
    /// are ignored.
    pub fn ack(&self, seq: u64) {
        self.acked.send_if_modified(|acked| {
            if seq > *acked {
                *acked = seq;
                true
            } else {
                false
            }
        });
    }

    pub fn acked(&self) -> u64 {
        *self.acked.borrow()
    }

    /// Wait until the frame after `sent` may go out, where `sent` counts the
    /// frames sent so far.
    pub async fn wait(&self, sent: u64) {
        if self.throttle {
            let mut acked = self.acked.subscribe();
            // The sender lives in `self`, so the channel cannot close here.
            let _ = acked
                .wait_for(|acked| sent.saturating_sub(*acked) < self.max_in_flight)
                .await;
        }
        sleep(self.period).await;
    }
}
