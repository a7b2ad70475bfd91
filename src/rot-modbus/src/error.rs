// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("index {index} out of range (limit {limit})")]
    OutOfRange { index: usize, limit: usize },

    #[error("modbus exception: {0}")]
    Exception(String),

    #[error("tunnel error: {0}")]
    Tunnel(String),

    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("timed out waiting for response")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("cannot open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ModbusError {
    pub(crate) fn exception(err: impl std::fmt::Display) -> Self {
        ModbusError::Exception(err.to_string())
    }

    pub(crate) fn tunnel(err: impl std::fmt::Display) -> Self {
        ModbusError::Tunnel(err.to_string())
    }
}
