/*
    planetor - A live visualizer for the sounds playing on a remote audio engine.
    Copyright (C) 2022  Ryan Andersen

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Pure mappings from audio parameters to visual attributes.
//!
//! Nothing here validates its bounds. A [`Domain`] is checked once when the
//! configuration is loaded, after which the mappings are free to assume
//! `min != max`.

use serde::Deserialize;

/// A closed interval of a scalar parameter, e.g. the audible frequency band a
/// deployment cares about.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Domain {
    pub min: f32,
    pub max: f32,
}
impl Domain {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> anyhow::Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            anyhow::bail!(
                "`{}` bounds must be finite, was given: [{}, {}]",
                name,
                self.min,
                self.max
            );
        }
        if self.min == self.max {
            anyhow::bail!(
                "`{}` bounds must be distinct, was given: [{}, {}]",
                name,
                self.min,
                self.max
            );
        }
        Ok(())
    }

    // Rescale `value` from `self` onto `out`
    pub fn map_to(&self, value: f32, out: &Domain) -> f32 {
        map_range(value, self.min, self.max, out.min, out.max)
    }
}

/// Affine rescale of `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Values outside the input range extrapolate. Equal input bounds yield a
/// non-finite result.
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    ((value - in_min) * (out_max - out_min)) / (in_max - in_min) + out_min
}

/// Hue in degrees for a frequency, wrapped into `[0, 360)`.
pub fn frequency_to_hue(frequency: f32, domain_min: f32, domain_max: f32) -> f32 {
    let hue = map_range(frequency, domain_min, domain_max, 0., 360.).rem_euclid(360.);
    // `rem_euclid` can round up to exactly 360 for tiny negative inputs
    if hue >= 360. {
        0.
    } else {
        hue
    }
}

/// HSL to RGB with every component in `[0, 1]` and hue in degrees.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let c = (1. - (2. * lightness - 1.).abs()) * saturation;
    let h = hue.rem_euclid(360.) / 60.;
    let x = c * (1. - (h % 2. - 1.).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.),
        1 => (x, c, 0.),
        2 => (0., c, x),
        3 => (0., x, c),
        4 => (x, 0., c),
        _ => (c, 0., x),
    };
    let m = lightness - c / 2.;
    [r + m, g + m, b + m]
}
