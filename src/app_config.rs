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

use std::num::NonZeroUsize;
use std::time::Duration;

use css_color_parser::Color as CssColor;
use serde::Deserialize;

use crate::animation::{AnimationConfig, FrameStep};
use crate::entity::{MotionLaw, VisualConfig};
use crate::input::TouchConfig;
use crate::mapper::Domain;
use crate::reconciler::{IdentityPolicy, LifecycleMode, ReconcileConfig};
use crate::transport::TransportConfig;

/// Deployment presets. Every option in the file overrides the preset value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Markers keyed by frequency riding a ring around the torus.
    Classic,
    /// Every snapshot spawns a fresh generation drifting over the torus.
    Drift,
    /// Drift visuals plus touch control of an oscillator on the engine.
    Mobile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FrameStepKind {
    Fixed,
    Scaled,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlData {
    pub profile: Option<Profile>,

    pub launch_fullscreen: Option<bool>,
    pub interactive: Option<bool>,

    pub endpoint: Option<String>,
    pub request_interval_ms: Option<u64>,

    pub capacity: Option<NonZeroUsize>,
    pub decay_rate: Option<f32>,
    pub max_lifetime_s: Option<f32>,
    pub identity_policy: Option<IdentityPolicy>,
    pub lifecycle_mode: Option<LifecycleMode>,

    pub motion_law: Option<MotionLaw>,
    pub orbit_rate: Option<f32>,
    pub frequency_domain: Option<Domain>,
    pub size_range: Option<Domain>,

    pub frame_step: Option<FrameStepKind>,
    pub reference_hz: Option<f32>,
    pub move_speed: Option<f32>,
    pub rotate_speed: Option<f32>,
    pub camera_distance: Option<f32>,
    pub ambient_color: Option<String>,

    pub touch: Option<TouchConfig>,
}

// Hardcoded default values
const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765";
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);
const MIN_REQUEST_INTERVAL_MS: u64 = 30;
const MAX_REQUEST_INTERVAL_MS: u64 = 1000;
const DEFAULT_REFERENCE_HZ: f32 = 60.;
const DEFAULT_MOVE_SPEED: f32 = 0.05;
const DEFAULT_RING_ORBIT_RATE: f32 = 0.005;
const DEFAULT_AMBIENT_RATE: f32 = 0.01;
const DEFAULT_AMBIENT_COLOR: [f32; 3] = [0.25, 0.25, 0.25]; // #404040

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("capacity must be non-zero"),
    }
}
const CLASSIC_CAPACITY: NonZeroUsize = non_zero(100);
const DRIFT_CAPACITY: NonZeroUsize = non_zero(1000);

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub profile: Profile,
    pub launch_fullscreen: bool,

    pub capacity: NonZeroUsize,
    pub transport: TransportConfig,
    pub reconcile: ReconcileConfig,
    pub visual: VisualConfig,
    pub animation: AnimationConfig,
    pub touch: TouchConfig,
}
impl Default for AppConfig {
    fn default() -> Self {
        Profile::Classic.preset()
    }
}

impl AppConfig {
    /// Whether touches start sounds on the engine.
    pub fn interactive(&self) -> bool {
        self.transport.interactive
    }
}

impl Profile {
    pub fn preset(self) -> AppConfig {
        let classic = AppConfig {
            profile: self,
            launch_fullscreen: false,

            capacity: CLASSIC_CAPACITY,
            transport: TransportConfig {
                endpoint: DEFAULT_ENDPOINT.to_owned(),
                request_interval: Duration::from_millis(100),
                interactive: false,
                poll_timeout: DEFAULT_POLL_TIMEOUT,
            },
            reconcile: ReconcileConfig {
                identity_policy: IdentityPolicy::ByFrequency,
                lifecycle_mode: LifecycleMode::SinceMatch,
                decay_rate: 0.2 / 60.,
                max_lifetime_s: 5.,
            },
            visual: VisualConfig {
                frequency_domain: Domain::new(30., 200.),
                size_range: Domain::new(0.1, 1.),
                motion_law: MotionLaw::Ring,
                orbit_rate: DEFAULT_RING_ORBIT_RATE,
            },
            animation: AnimationConfig {
                frame_step: FrameStep::Fixed,
                move_speed: DEFAULT_MOVE_SPEED,
                rotate_speed: 0.01,
                ambient_rate: DEFAULT_AMBIENT_RATE,
                camera_distance: 10.,
                ambient_color: DEFAULT_AMBIENT_COLOR,
            },
            touch: TouchConfig::default(),
        };

        let drift = |interactive: bool, interval_ms: u64, decay_rate: f32| AppConfig {
            capacity: DRIFT_CAPACITY,
            transport: TransportConfig {
                request_interval: Duration::from_millis(interval_ms),
                interactive,
                ..classic.transport.clone()
            },
            reconcile: ReconcileConfig {
                identity_policy: IdentityPolicy::Generational,
                lifecycle_mode: LifecycleMode::SinceSpawn,
                decay_rate,
                max_lifetime_s: 12.,
            },
            visual: VisualConfig {
                frequency_domain: Domain::new(30., 600.),
                size_range: Domain::new(0.1, 3.),
                motion_law: MotionLaw::Drift,
                ..classic.visual.clone()
            },
            animation: AnimationConfig {
                rotate_speed: 0.001,
                camera_distance: 15.,
                ..classic.animation.clone()
            },
            ..classic.clone()
        };

        match self {
            Self::Classic => classic,
            Self::Drift => drift(false, 30, 0.1),
            Self::Mobile => drift(true, 150, 1.),
        }
    }
}

fn u8_to_f32_color(uc: u8) -> f32 {
    f32::from(uc) / 255.
}
fn css_to_rgb(css_color: &str) -> anyhow::Result<[f32; 3]> {
    let c = css_color
        .parse::<CssColor>()
        .map_err(|e| anyhow::anyhow!("`ambient_color` is not a CSS color: {:?}", e))?;
    Ok([
        u8_to_f32_color(c.r),
        u8_to_f32_color(c.g),
        u8_to_f32_color(c.b),
    ])
}

// Positive, finite override of a preset value
fn positive(name: &str, value: Option<f32>, preset: f32) -> anyhow::Result<f32> {
    match value {
        Some(v) if v.is_finite() && v > 0. => Ok(v),
        Some(v) => anyhow::bail!("`{}` must be a positive number, was given: {}", name, v),
        None => Ok(preset),
    }
}

fn non_negative(name: &str, value: Option<f32>, preset: f32) -> anyhow::Result<f32> {
    match value {
        Some(v) if v.is_finite() && v >= 0. => Ok(v),
        Some(v) => anyhow::bail!("`{}` must not be negative, was given: {}", name, v),
        None => Ok(preset),
    }
}

pub fn parse_str(text: &str) -> anyhow::Result<AppConfig> {
    let config: TomlData = toml::from_str(text)?;
    let preset = config.profile.unwrap_or(Profile::Classic).preset();

    let endpoint = match config.endpoint {
        Some(endpoint) if endpoint.trim().is_empty() => {
            anyhow::bail!("`endpoint` must not be empty")
        }
        Some(endpoint) => endpoint,
        None => preset.transport.endpoint,
    };
    let request_interval = config.request_interval_ms.map_or(
        preset.transport.request_interval,
        |ms| Duration::from_millis(ms.clamp(MIN_REQUEST_INTERVAL_MS, MAX_REQUEST_INTERVAL_MS)),
    );
    let interactive = config.interactive.unwrap_or(preset.transport.interactive);

    let reconcile = ReconcileConfig {
        identity_policy: config
            .identity_policy
            .unwrap_or(preset.reconcile.identity_policy),
        lifecycle_mode: config
            .lifecycle_mode
            .unwrap_or(preset.reconcile.lifecycle_mode),
        decay_rate: positive("decay_rate", config.decay_rate, preset.reconcile.decay_rate)?,
        max_lifetime_s: positive(
            "max_lifetime_s",
            config.max_lifetime_s,
            preset.reconcile.max_lifetime_s,
        )?,
    };

    let frequency_domain = config
        .frequency_domain
        .unwrap_or(preset.visual.frequency_domain);
    frequency_domain.validate("frequency_domain")?;
    let size_range = config.size_range.unwrap_or(preset.visual.size_range);
    size_range.validate("size_range")?;
    if size_range.min <= 0. || size_range.max <= 0. {
        anyhow::bail!(
            "`size_range` bounds must be positive, was given: [{}, {}]",
            size_range.min,
            size_range.max
        );
    }
    let visual = VisualConfig {
        frequency_domain,
        size_range,
        motion_law: config.motion_law.unwrap_or(preset.visual.motion_law),
        orbit_rate: non_negative("orbit_rate", config.orbit_rate, preset.visual.orbit_rate)?,
    };

    let frame_step = match config.frame_step {
        None if config.reference_hz.is_none() => preset.animation.frame_step,
        None | Some(FrameStepKind::Scaled) => FrameStep::Scaled {
            reference_hz: positive("reference_hz", config.reference_hz, DEFAULT_REFERENCE_HZ)?,
        },
        Some(FrameStepKind::Fixed) => FrameStep::Fixed,
    };
    let ambient_color = match config.ambient_color {
        Some(css_color) => css_to_rgb(&css_color)?,
        None => preset.animation.ambient_color,
    };
    let camera_distance = config
        .camera_distance
        .unwrap_or(preset.animation.camera_distance);
    if !camera_distance.is_finite() {
        anyhow::bail!("`camera_distance` must be finite, was given: {}", camera_distance);
    }
    let animation = AnimationConfig {
        frame_step,
        move_speed: non_negative("move_speed", config.move_speed, preset.animation.move_speed)?,
        rotate_speed: non_negative(
            "rotate_speed",
            config.rotate_speed,
            preset.animation.rotate_speed,
        )?,
        ambient_rate: preset.animation.ambient_rate,
        camera_distance,
        ambient_color,
    };

    let touch = config.touch.unwrap_or(preset.touch);
    touch.validate()?;

    Ok(AppConfig {
        profile: preset.profile,
        launch_fullscreen: config
            .launch_fullscreen
            .unwrap_or(preset.launch_fullscreen),

        capacity: config.capacity.unwrap_or(preset.capacity),
        transport: TransportConfig {
            endpoint,
            request_interval,
            interactive,
            poll_timeout: preset.transport.poll_timeout,
        },
        reconcile,
        visual,
        animation,
        touch,
    })
}

pub fn parse_file(filepath: &str) -> anyhow::Result<AppConfig> {
    parse_str(&std::fs::read_to_string(filepath)?)
}
