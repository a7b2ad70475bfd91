// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rotators that wrap another rotator and reshape its commands and status.

pub mod offset;
pub mod transform;
