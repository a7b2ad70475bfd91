// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use chrono::{DateTime, Utc};

use crate::body::{Body, Star};
use crate::coords::{cos_d, equatorial_to_horizontal, precess_from_j2000, tan_d};
use crate::solar::{self, Place};
use crate::time::{centuries, gmst, julian_day};

/// Observing site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    /// Geodetic latitude, degrees north.
    pub latitude: f64,
    /// Longitude, degrees east.
    pub longitude: f64,
    /// Height above sea level, metres.
    pub height: f64,
    /// Ambient temperature, Celsius.
    pub temperature: f64,
    /// Ambient pressure, millibar.
    pub pressure: f64,
}

/// Topocentric horizon coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    /// Azimuth from north through east, `[0, 360)`.
    pub azimuth: f64,
    /// Elevation above the horizon, refraction included.
    pub elevation: f64,
}

/// Source of topocentric body positions.
pub trait Ephemeris: Send + Sync {
    fn topocentric(&self, body: &Body, observer: &Observer, time: DateTime<Utc>) -> Horizontal;
}

/// Built-in analytic ephemeris.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPrecision;

impl Ephemeris for LowPrecision {
    fn topocentric(&self, body: &Body, observer: &Observer, time: DateTime<Utc>) -> Horizontal {
        let jd = julian_day(time);
        let place = match body {
            Body::Sun => solar::sun(jd),
            Body::Moon => solar::moon(jd),
            Body::Planet(p) => solar::planet(*p, jd),
            Body::Star(star) => star_place(star, jd),
        };

        let lst = gmst(jd) + observer.longitude;
        let hour_angle = (lst - place.ra).rem_euclid(360.0);
        let (azimuth, geocentric_el) =
            equatorial_to_horizontal(hour_angle, place.dec, observer.latitude);

        // Parallax lowers the body by roughly HP * cos(el).
        let elevation = geocentric_el - place.parallax * cos_d(geocentric_el);
        let elevation = elevation + refraction(elevation, observer.temperature, observer.pressure);

        Horizontal {
            azimuth,
            elevation,
        }
    }
}

fn star_place(star: &Star, jd: f64) -> Place {
    let t = centuries(jd);
    let years = t * 100.0;
    let dec0 = star.dec_deg;
    let cos_dec = cos_d(dec0).max(1e-9);
    let ra = star.ra_hours * 15.0 + star.pm_ra / 3.6e6 / cos_dec * years;
    let dec = dec0 + star.pm_dec / 3.6e6 * years;
    let (ra, dec) = precess_from_j2000(ra, dec, t);
    Place {
        ra,
        dec,
        parallax: 0.0,
    }
}

/// Atmospheric refraction in degrees for a true elevation (Saemundsson).
fn refraction(elevation: f64, temperature: f64, pressure: f64) -> f64 {
    if elevation < -1.0 {
        return 0.0;
    }
    let arcmin = 1.02 / tan_d(elevation + 10.3 / (elevation + 5.11));
    let scale = (pressure / 1010.0) * (283.0 / (273.0 + temperature));
    arcmin * scale / 60.0
}
