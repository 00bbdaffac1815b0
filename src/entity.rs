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

use std::f32::consts::TAU;
use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::mapper::{frequency_to_hue, hsl_to_rgb, Domain};
use crate::my_math::Vector3;
use crate::protocol::SoundEntry;
use crate::scene::VisualHandle;

// Pan assumed by the audio engine when a client does not send one
pub const DEFAULT_PAN: f32 = 0.5;

const MARKER_ROTATION_SPEED: f32 = 0.02;
const DRIFT_ORBIT_DIVISOR: f32 = 15.;

/// Continuous motion law applied to every marker of a deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionLaw {
    /// Markers sit on evenly spaced tube angles and orbit at a shared rate.
    Ring,
    /// Tube angle comes from the frequency, orbit rate from the pan and the
    /// height breathes with the marker's age.
    Drift,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisualConfig {
    pub frequency_domain: Domain,
    pub size_range: Domain,
    pub motion_law: MotionLaw,
    pub orbit_rate: f32,
}

/// Stable identity of a sound, its exact frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SoundKey(u64);
impl SoundKey {
    pub fn of(entry: &SoundEntry) -> Self {
        Self(entry.frequency.to_bits())
    }
}

/// Monotonic id handed out per spawn, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Visual attributes fixed at spawn time.
#[derive(Clone, Debug, PartialEq)]
pub struct Visual {
    pub frequency: f32,
    pub lfo_frequency: f32,
    pub pan: f32,
    pub hue: f32,
    pub color: [f32; 3],
    pub size: f32,
    pub law: MotionLaw,
    pub tube_angle: f32,
    pub orbit_rate: f32,
    pub spin: Vector3,
}
impl Visual {
    /// Derive the attributes of the marker for `entry`, about to occupy
    /// position `index` of a pool holding at most `capacity` markers.
    pub fn derive(
        entry: &SoundEntry,
        index: usize,
        capacity: NonZeroUsize,
        config: &VisualConfig,
    ) -> Self {
        let frequency = entry.frequency as f32;
        let lfo_frequency = entry.lfo_frequency as f32;
        let pan = entry.pan.map_or(DEFAULT_PAN, |p| p as f32);

        let domain = &config.frequency_domain;
        let hue = frequency_to_hue(frequency, domain.min, domain.max);
        let (size_lo, size_hi) = if config.size_range.min <= config.size_range.max {
            (config.size_range.min, config.size_range.max)
        } else {
            (config.size_range.max, config.size_range.min)
        };
        let size = domain
            .map_to(frequency, &config.size_range)
            .clamp(size_lo, size_hi);

        let (tube_angle, orbit_rate, spin) = match config.motion_law {
            MotionLaw::Ring => (
                TAU / capacity.get() as f32 * index as f32,
                config.orbit_rate,
                Vector3::new(
                    MARKER_ROTATION_SPEED * (frequency / 100.),
                    MARKER_ROTATION_SPEED * (lfo_frequency / 200.),
                    0.,
                ),
            ),
            MotionLaw::Drift => (
                frequency,
                (1. - pan) / DRIFT_ORBIT_DIVISOR,
                Vector3::new(frequency / 1000., lfo_frequency / 100., pan * 0.001),
            ),
        };

        Self {
            frequency,
            lfo_frequency,
            pan,
            hue,
            color: hsl_to_rgb(hue, 1., 0.5),
            size,
            law: config.motion_law,
            tube_angle,
            orbit_rate,
            spin,
        }
    }
}

/// Per-frame state owned by the animation driver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Motion {
    pub orbit_angle: f32,
    pub rotation: Vector3,
}

#[derive(Clone, Debug)]
pub struct VisualEntity {
    id: EntityId,
    key: SoundKey,
    handle: VisualHandle,
    spawn_time: f32,
    last_match: f32,
    opacity: f32,
    visual: Visual,
    motion: Motion,
}
impl VisualEntity {
    pub(crate) fn spawn(
        id: EntityId,
        key: SoundKey,
        handle: VisualHandle,
        visual: Visual,
        now: f32,
    ) -> Self {
        Self {
            id,
            key,
            handle,
            spawn_time: now,
            last_match: now,
            opacity: 1.,
            visual,
            motion: Motion::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }
    pub fn key(&self) -> SoundKey {
        self.key
    }
    pub fn handle(&self) -> VisualHandle {
        self.handle
    }
    pub fn spawn_time(&self) -> f32 {
        self.spawn_time
    }
    pub fn last_match(&self) -> f32 {
        self.last_match
    }
    pub fn opacity(&self) -> f32 {
        self.opacity
    }
    pub fn visual(&self) -> &Visual {
        &self.visual
    }
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub(crate) fn refresh(&mut self, now: f32) {
        self.opacity = 1.;
        self.last_match = now;
    }

    // Returns the opacity left after one decay step
    pub(crate) fn decay(&mut self, rate: f32) -> f32 {
        self.opacity = (self.opacity - rate).max(0.);
        self.opacity
    }
}

/// Mutable window onto a pooled entity, handed to the animation driver.
/// Only the motion fields can be written through it.
pub struct MotionView<'a> {
    pub handle: VisualHandle,
    pub spawn_time: f32,
    pub opacity: f32,
    pub visual: &'a Visual,
    pub motion: &'a mut Motion,
}

/// Bounded pool of live markers, kept in insertion order.
///
/// Once full, new markers are refused; existing ones are never pre-empted.
pub struct EntityPool {
    entities: Vec<VisualEntity>,
    capacity: NonZeroUsize,
}
impl EntityPool {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity.get()),
            capacity,
        }
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.entities.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.entities.len() >= self.capacity.get()
    }
    pub fn iter(&self) -> impl Iterator<Item = &VisualEntity> {
        self.entities.iter()
    }
    pub fn total_opacity(&self) -> f32 {
        self.entities.iter().map(VisualEntity::opacity).sum()
    }

    pub fn motion_iter_mut(&mut self) -> impl Iterator<Item = MotionView<'_>> {
        self.entities.iter_mut().map(|e| MotionView {
            handle: e.handle,
            spawn_time: e.spawn_time,
            opacity: e.opacity,
            visual: &e.visual,
            motion: &mut e.motion,
        })
    }

    // Hands the entity back when the pool is already full
    pub(crate) fn try_insert(&mut self, entity: VisualEntity) -> Result<(), VisualEntity> {
        if self.is_full() {
            return Err(entity);
        }
        self.entities.push(entity);
        Ok(())
    }

    pub(crate) fn retain_mut<F>(&mut self, keep: F)
    where
        F: FnMut(&mut VisualEntity) -> bool,
    {
        self.entities.retain_mut(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(law: MotionLaw) -> VisualConfig {
        VisualConfig {
            frequency_domain: Domain::new(30., 200.),
            size_range: Domain::new(0.1, 1.),
            motion_law: law,
            orbit_rate: 0.005,
        }
    }

    fn entry(frequency: f64, lfo_frequency: f64, pan: Option<f64>) -> SoundEntry {
        SoundEntry {
            frequency,
            lfo_frequency,
            pan,
        }
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn ring_law_spaces_tube_angles_by_index() {
        let cfg = config(MotionLaw::Ring);
        let a = Visual::derive(&entry(100., 2., None), 0, capacity(4), &cfg);
        let b = Visual::derive(&entry(100., 2., None), 1, capacity(4), &cfg);
        assert_eq!(a.tube_angle, 0.);
        assert!((b.tube_angle - TAU / 4.).abs() < 1e-6);
        assert_eq!(a.orbit_rate, 0.005);
        assert!((a.spin.x - 0.02).abs() < 1e-6);
        assert!((a.spin.y - 0.0002).abs() < 1e-7);
    }

    #[test]
    fn drift_law_uses_pan_and_frequency() {
        let cfg = config(MotionLaw::Drift);
        let v = Visual::derive(&entry(150., 20., Some(0.25)), 3, capacity(4), &cfg);
        assert_eq!(v.tube_angle, 150.);
        assert!((v.orbit_rate - 0.05).abs() < 1e-6);
        assert!((v.spin.z - 0.00025).abs() < 1e-7);

        // Missing pan falls back to center
        let centered = Visual::derive(&entry(150., 20., None), 0, capacity(4), &cfg);
        assert_eq!(centered.pan, DEFAULT_PAN);
    }

    #[test]
    fn size_is_clamped_to_range() {
        let cfg = config(MotionLaw::Ring);
        let low = Visual::derive(&entry(1., 0., None), 0, capacity(1), &cfg);
        let high = Visual::derive(&entry(10_000., 0., None), 0, capacity(1), &cfg);
        assert_eq!(low.size, 0.1);
        assert_eq!(high.size, 1.);
    }

    #[test]
    fn pool_refuses_past_capacity() {
        let cfg = config(MotionLaw::Ring);
        let mut pool = EntityPool::new(capacity(1));
        let visual = Visual::derive(&entry(100., 0., None), 0, capacity(1), &cfg);
        let make = |id| {
            VisualEntity::spawn(
                EntityId(id),
                SoundKey(id),
                VisualHandle::from_raw(id),
                visual.clone(),
                0.,
            )
        };
        assert!(pool.try_insert(make(1)).is_ok());
        let rejected = pool.try_insert(make(2)).unwrap_err();
        assert_eq!(rejected.id(), EntityId(2));
        assert_eq!(pool.len(), 1);
        assert!(pool.is_full());
    }

    #[test]
    fn decay_never_goes_negative() {
        let cfg = config(MotionLaw::Ring);
        let visual = Visual::derive(&entry(100., 0., None), 0, capacity(1), &cfg);
        let mut e = VisualEntity::spawn(
            EntityId(0),
            SoundKey(0),
            VisualHandle::from_raw(0),
            visual,
            0.,
        );
        assert_eq!(e.decay(0.75), 0.25);
        assert_eq!(e.decay(0.75), 0.);
        e.refresh(3.);
        assert_eq!(e.opacity(), 1.);
        assert_eq!(e.last_match(), 3.);
    }
}
