// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

/// Major planets other than Earth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Planet {
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

impl Planet {
    pub const ALL: [Planet; 8] = [
        Planet::Mercury,
        Planet::Venus,
        Planet::Mars,
        Planet::Jupiter,
        Planet::Saturn,
        Planet::Uranus,
        Planet::Neptune,
        Planet::Pluto,
    ];
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Catalog star, ICRS at epoch J2000.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub name: String,
    pub catalog: String,
    pub number: i64,
    /// Right ascension in hours.
    pub ra_hours: f64,
    /// Declination in degrees.
    pub dec_deg: f64,
    /// Proper motion in RA (times cos dec), mas/yr.
    pub pm_ra: f64,
    /// Proper motion in declination, mas/yr.
    pub pm_dec: f64,
    /// Parallax, mas.
    pub parallax: f64,
    /// Radial velocity, km/s.
    pub radial_velocity: f64,
}

/// Anything the tracking loop can point at.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Sun,
    Moon,
    Planet(Planet),
    Star(Star),
}

impl Body {
    pub fn name(&self) -> String {
        match self {
            Body::Sun => "Sun".to_string(),
            Body::Moon => "Moon".to_string(),
            Body::Planet(p) => p.to_string(),
            Body::Star(s) => s.name.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn star(
    name: &str,
    catalog: &str,
    number: i64,
    ra_hours: f64,
    dec_deg: f64,
    pm_ra: f64,
    pm_dec: f64,
    parallax: f64,
    radial_velocity: f64,
) -> Body {
    Body::Star(Star {
        name: name.to_string(),
        catalog: catalog.to_string(),
        number,
        ra_hours,
        dec_deg,
        pm_ra,
        pm_dec,
        parallax,
        radial_velocity,
    })
}

/// Built-in catalog: Sun, Moon, the planets, then a few calibration sources.
pub fn default_catalog() -> Vec<Body> {
    let mut bodies = vec![Body::Sun, Body::Moon];
    bodies.extend(Planet::ALL.iter().copied().map(Body::Planet));
    bodies.push(star(
        "Polaris",
        "HR",
        424,
        37.954_560_67 / 15.0,
        89.264_108_97,
        44.48,
        -11.85,
        7.54,
        -16.42,
    ));
    bodies.push(star(
        "Vega",
        "HR",
        7001,
        279.234_734_79 / 15.0,
        38.783_688_96,
        200.94,
        286.23,
        130.23,
        -20.60,
    ));
    bodies.push(star(
        "Cygnus A",
        "W",
        57,
        299.868_152_63 / 15.0,
        40.733_915_83,
        0.0,
        0.0,
        0.0,
        16360.0,
    ));
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order() {
        let names: Vec<String> = default_catalog().iter().map(Body::name).collect();
        assert_eq!(
            names,
            [
                "Sun", "Moon", "Mercury", "Venus", "Mars", "Jupiter", "Saturn", "Uranus",
                "Neptune", "Pluto", "Polaris", "Vega", "Cygnus A"
            ]
        );
    }
}
