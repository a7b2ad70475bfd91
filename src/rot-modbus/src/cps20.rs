// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::client::ModbusClient;
use crate::error::ModbusError;
use crate::poller::{self, Peripheral};
use crate::transport::ModbusFuture;

/// Azimuth and elevation amplidyne relays.
const AMPLIDYNE_RELAYS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AmplidyneStatus {
    pub command_spinup_delay: u16,
    pub command_az_enabled: bool,
    pub command_el_enabled: bool,
    pub amplidynes_active: bool,
    pub az_active: bool,
    pub el_active: bool,
}

impl AmplidyneStatus {
    pub fn commanded_on(&self) -> bool {
        self.command_az_enabled || self.command_el_enabled
    }
}

pub type AmplidyneCallback = Arc<dyn Fn(AmplidyneStatus) + Send + Sync>;

pub fn parse_status(delay: u16, coils: &[bool], inputs: &[bool]) -> AmplidyneStatus {
    let bit = |bits: &[bool], i: usize| bits.get(i).copied().unwrap_or(false);
    AmplidyneStatus {
        command_spinup_delay: delay,
        command_az_enabled: bit(coils, 0),
        command_el_enabled: bit(coils, 1),
        amplidynes_active: bit(inputs, 0),
        az_active: bit(inputs, 1),
        el_active: bit(inputs, 2),
    }
}

struct Shared {
    client: Mutex<ModbusClient>,
    relays: AtomicUsize,
    callback: AmplidyneCallback,
}

impl Peripheral for Shared {
    fn name(&self) -> &'static str {
        "cps20"
    }

    fn client(&self) -> &Mutex<ModbusClient> {
        &self.client
    }

    fn poll_once<'a>(&'a self, client: &'a mut ModbusClient) -> ModbusFuture<'a, ()> {
        Box::pin(async move {
            let relays = client
                .read_input_registers(0, 1)
                .await?
                .first()
                .copied()
                .unwrap_or(0);
            let delay = client
                .read_holding_registers(0, 1)
                .await?
                .first()
                .copied()
                .unwrap_or(0);
            let input_count = relays.checked_add(1).ok_or(ModbusError::OutOfRange {
                index: relays as usize,
                limit: (u16::MAX - 1) as usize,
            })?;
            let coils = client.read_coils(0, relays).await?;
            let inputs = client.read_discrete_inputs(0, input_count).await?;
            self.relays.store(relays as usize, Ordering::SeqCst);
            (self.callback)(parse_status(delay, &coils, &inputs));
            Ok(())
        })
    }
}

/// CPS20 amplidyne power controller.
#[derive(Clone)]
pub struct Cps20 {
    shared: Arc<Shared>,
}

impl Cps20 {
    pub fn new(client: ModbusClient, callback: AmplidyneCallback) -> Self {
        Self {
            shared: Arc::new(Shared {
                client: Mutex::new(client),
                relays: AtomicUsize::new(0),
                callback,
            }),
        }
    }

    pub fn spawn(&self, interval: Duration, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(poller::run(self.shared.clone(), interval, shutdown_rx))
    }

    pub fn relays(&self) -> usize {
        self.shared.relays.load(Ordering::SeqCst)
    }

    /// Switch both amplidyne relays.
    pub async fn set_amplidynes_enabled(&self, enabled: bool) -> Result<(), ModbusError> {
        let mut client = self.shared.client.lock().await;
        let relays = self.relays();
        if relays < AMPLIDYNE_RELAYS {
            return Err(ModbusError::OutOfRange {
                index: AMPLIDYNE_RELAYS - 1,
                limit: relays,
            });
        }
        client.write_single_coil(0, enabled).await?;
        client.write_single_coil(1, enabled).await
    }

    #[cfg(test)]
    async fn poll_now(&self) -> Result<(), ModbusError> {
        let mut client = self.shared.client.lock().await;
        client.connect().await?;
        self.shared.poll_once(&mut client).await
    }
}
