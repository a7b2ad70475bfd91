// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::client::ModbusClient;
use crate::transport::ModbusFuture;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A Modbus device polled on a fixed cadence.
pub trait Peripheral: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn client(&self) -> &Mutex<ModbusClient>;

    /// Read the device once and publish its status.
    fn poll_once<'a>(&'a self, client: &'a mut ModbusClient) -> ModbusFuture<'a, ()>;
}

/// Connect, poll until the link fails, then retry after a fixed delay.
pub async fn run<P: Peripheral>(
    peripheral: Arc<P>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let name = peripheral.name();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let delay = {
            let mut client = peripheral.client().lock().await;
            if !client.is_connected() {
                match client.connect().await {
                    Ok(()) => info!("{}: connected to {}", name, client.describe()),
                    Err(e) => warn!("{}: opening {}: {}", name, client.describe(), e),
                }
            }
            if client.is_connected() {
                match peripheral.poll_once(&mut client).await {
                    Ok(()) => interval,
                    Err(e) => {
                        warn!("{}: polling {}: {}", name, client.describe(), e);
                        client.close();
                        RECONNECT_DELAY
                    }
                }
            } else {
                RECONNECT_DELAY
            }
        };

        tokio::select! {
            _ = sleep(delay) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    peripheral.client().lock().await.close();
    info!("{}: poll loop stopped", name);
}
