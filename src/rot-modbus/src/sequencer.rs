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

/// Commanded and actual state of one RF band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandStatus {
    #[serde(rename = "CommandTX")]
    pub command_tx: bool,
    #[serde(rename = "CommandRX")]
    pub command_rx: bool,
    #[serde(rename = "TX")]
    pub tx: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SequencerStatus {
    pub error: bool,
    pub bands: Vec<BandStatus>,
}

pub type SequencerCallback = Arc<dyn Fn(SequencerStatus) + Send + Sync>;

/// Coils hold `CommandTX` for every band followed by `CommandRX`; discrete
/// input 0 is the error line followed by the per-band TX sense inputs.
pub fn parse_status(bands: usize, coils: &[bool], inputs: &[bool]) -> SequencerStatus {
    let bit = |bits: &[bool], i: usize| bits.get(i).copied().unwrap_or(false);
    SequencerStatus {
        error: bit(inputs, 0),
        bands: (0..bands)
            .map(|i| BandStatus {
                command_tx: bit(coils, i),
                command_rx: bit(coils, bands + i),
                tx: bit(inputs, i + 1),
            })
            .collect(),
    }
}

struct Shared {
    client: Mutex<ModbusClient>,
    bands: AtomicUsize,
    callback: SequencerCallback,
}

/// Coil and discrete input counts covering `bands` bands.
fn band_spans(bands: u16) -> Result<(u16, u16), ModbusError> {
    match (bands.checked_mul(2), bands.checked_add(1)) {
        (Some(coils), Some(inputs)) => Ok((coils, inputs)),
        _ => Err(ModbusError::OutOfRange {
            index: bands as usize,
            limit: (u16::MAX / 2) as usize,
        }),
    }
}

impl Peripheral for Shared {
    fn name(&self) -> &'static str {
        "sequencer"
    }

    fn client(&self) -> &Mutex<ModbusClient> {
        &self.client
    }

    fn poll_once<'a>(&'a self, client: &'a mut ModbusClient) -> ModbusFuture<'a, ()> {
        Box::pin(async move {
            let bands = client
                .read_input_registers(0, 1)
                .await?
                .first()
                .copied()
                .unwrap_or(0);
            let (coil_count, input_count) = band_spans(bands)?;
            let coils = client.read_coils(0, coil_count).await?;
            let inputs = client.read_discrete_inputs(0, input_count).await?;
            self.bands.store(bands as usize, Ordering::SeqCst);
            (self.callback)(parse_status(bands as usize, &coils, &inputs));
            Ok(())
        })
    }
}

/// RF path band sequencer.
#[derive(Clone)]
pub struct Sequencer {
    shared: Arc<Shared>,
}

impl Sequencer {
    pub fn new(client: ModbusClient, callback: SequencerCallback) -> Self {
        Self {
            shared: Arc::new(Shared {
                client: Mutex::new(client),
                bands: AtomicUsize::new(0),
                callback,
            }),
        }
    }

    /// Start the connect and poll loop.
    pub fn spawn(&self, interval: Duration, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(poller::run(self.shared.clone(), interval, shutdown_rx))
    }

    /// Band count reported by the last successful poll.
    pub fn bands(&self) -> usize {
        self.shared.bands.load(Ordering::SeqCst)
    }

    async fn write_band_coil(&self, band: usize, offset: bool, value: bool) -> Result<(), ModbusError> {
        let mut client = self.shared.client.lock().await;
        let bands = self.bands();
        if band >= bands {
            return Err(ModbusError::OutOfRange {
                index: band,
                limit: bands,
            });
        }
        let coil = if offset { bands + band } else { band };
        client.write_single_coil(coil as u16, value).await
    }

    pub async fn set_band_tx(&self, band: usize, tx: bool) -> Result<(), ModbusError> {
        self.write_band_coil(band, false, tx).await
    }

    pub async fn set_band_rx(&self, band: usize, rx: bool) -> Result<(), ModbusError> {
        self.write_band_coil(band, true, rx).await
    }

    #[cfg(test)]
    async fn poll_now(&self) -> Result<(), ModbusError> {
        let mut client = self.shared.client.lock().await;
        client.connect().await?;
        self.shared.poll_once(&mut client).await
    }
}
