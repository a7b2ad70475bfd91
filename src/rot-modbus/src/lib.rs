// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Modbus RTU peripherals of the antenna mount: the RF band sequencer and
//! the CPS20 amplidyne controller, reached over a local serial bus or an
//! HTTP tunnel.

pub mod client;
pub mod cps20;
pub mod error;
pub mod poller;
pub mod sequencer;
pub mod transport;

pub use client::{bytes_to_bits, ModbusClient};
pub use cps20::{AmplidyneCallback, AmplidyneStatus, Cps20};
pub use error::ModbusError;
pub use sequencer::{BandStatus, Sequencer, SequencerCallback, SequencerStatus};
pub use transport::{HttpTunnel, ModbusFuture, ModbusTransport, RtuSerial};
