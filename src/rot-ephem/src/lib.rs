// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Topocentric positions of solar-system bodies and fixed stars.
//!
//! Precision is a fraction of a degree, which is well inside the beam of the
//! dishes this crate points.

pub mod body;
mod coords;
pub mod ephemeris;
mod solar;
mod time;

pub use body::{default_catalog, Body, Planet, Star};
pub use ephemeris::{Ephemeris, Horizontal, LowPrecision, Observer};
