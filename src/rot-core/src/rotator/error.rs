// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Errors returned by rotator capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotatorError {
    #[error("{0} is not supported by this rotator")]
    NotSupported(&'static str),

    #[error("write of {count} value(s) at register {register} exceeds {limit} writable registers")]
    RegisterOutOfRange {
        register: usize,
        count: usize,
        limit: usize,
    },

    #[error("rotator is not connected")]
    NotConnected,
}
