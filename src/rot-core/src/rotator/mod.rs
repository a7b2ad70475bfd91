// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

pub mod error;
pub mod status;

use error::RotatorError;
use status::RotatorStatus;

/// Callback through which drivers push status snapshots upward.
pub type StatusCallback = Arc<dyn Fn(RotatorStatus) + Send + Sync>;

/// How a rotator backend reaches its hardware.
#[derive(Debug, Clone, Serialize)]
pub enum RotatorAccessMethod {
    Serial { path: String, baud: u32 },
    Tcp { addr: String },
    Simulated,
}

/// Static info describing a rotator backend.
#[derive(Debug, Clone, Serialize)]
pub struct RotatorInfo {
    pub manufacturer: String,
    pub model: String,
    pub access: RotatorAccessMethod,
}

/// Raw register writes, for drivers that expose a register map.
pub trait RegisterWriter: Send + Sync {
    fn write(&self, register: usize, values: &[u16]) -> Result<(), RotatorError>;
}

/// Control over the device's shutdown state machine.
pub trait ShutdownControl: Send + Sync {
    /// Shutdown codes that are cleared automatically when they appear.
    fn set_acceptable_shutdowns(&self, codes: HashSet<u8>);
    /// Stop and run the exit-shutdown sequence.
    fn exit_shutdown(&self);
}

/// Administrative block of motion commands.
pub trait MoveBlocker: Send + Sync {
    fn set_moving_disabled(&self, disabled: bool);
}

/// Angular position correction.
pub trait Offsetter: Send + Sync {
    fn set_azimuth_offset(&self, offset: f64);
    fn set_elevation_offset(&self, offset: f64);
    fn offsets(&self) -> (f64, f64);
}

/// Common command surface of every rotator driver and decorator.
///
/// Commands are fire-and-forget: drivers queue them on their link and report
/// the outcome through the status callback. Optional features are exposed
/// through the `as_*` accessors, which return `None` when unsupported.
pub trait Rotator: Send + Sync {
    fn info(&self) -> &RotatorInfo;

    fn stop(&self);

    fn set_azimuth_position(&self, angle: f64);

    fn set_elevation_position(&self, angle: f64);

    fn set_azimuth_velocity(&self, velocity: f64);

    fn set_elevation_velocity(&self, velocity: f64);

    fn as_register_writer(&self) -> Option<&dyn RegisterWriter> {
        None
    }

    fn as_shutdown_control(&self) -> Option<&dyn ShutdownControl> {
        None
    }

    fn as_move_blocker(&self) -> Option<&dyn MoveBlocker> {
        None
    }

    fn as_offsetter(&self) -> Option<&dyn Offsetter> {
        None
    }
}
