// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod angle;
pub mod decorator;
pub mod rotator;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use angle::normalize;
pub use decorator::offset::Offset;
pub use decorator::transform::Transformer;
pub use rotator::error::RotatorError;
pub use rotator::status::{CommandMode, RotatorStatus};
pub use rotator::{Rotator, StatusCallback};
