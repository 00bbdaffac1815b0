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

//! Turns each snapshot of active sounds into spawn, refresh, fade and evict
//! decisions on the entity pool.

use std::collections::HashSet;

use serde::Deserialize;

use crate::app_config::AppConfig;
use crate::entity::{EntityId, EntityPool, SoundKey, Visual, VisualConfig, VisualEntity};
use crate::protocol::Snapshot;
use crate::scene::{RenderSubstrate, VisualHandle};

/// How a marker is recognised as the same sound across snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Same exact frequency means same sound. A match restores full opacity.
    ByFrequency,
    /// Every snapshot is a new generation; previous markers only fade.
    Generational,
}

/// What a marker's age is measured from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleMode {
    SinceMatch,
    SinceSpawn,
}

impl LifecycleMode {
    pub fn age(self, entity: &VisualEntity, now: f32) -> f32 {
        match self {
            Self::SinceMatch => now - entity.last_match(),
            Self::SinceSpawn => now - entity.spawn_time(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileConfig {
    pub identity_policy: IdentityPolicy,
    pub lifecycle_mode: LifecycleMode,
    pub decay_rate: f32,
    pub max_lifetime_s: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Spawn { id: EntityId, handle: VisualHandle },
    Evict { id: EntityId, handle: VisualHandle },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: usize,
    pub spawned: usize,
    pub evicted: usize,
    /// Entries refused because the pool was full.
    pub dropped: usize,
    /// Entries the decoder could not use.
    pub malformed: usize,
}

pub struct Reconciliation {
    pub effects: Vec<Effect>,
    pub report: ReconcileReport,
}

pub struct Reconciler {
    config: ReconcileConfig,
    visual: VisualConfig,
    next_id: u64,
}

impl Reconciler {
    pub fn new(app_config: &AppConfig) -> Self {
        Self::with_parts(app_config.reconcile.clone(), app_config.visual.clone())
    }

    pub fn with_parts(config: ReconcileConfig, visual: VisualConfig) -> Self {
        Self {
            config,
            visual,
            next_id: 0,
        }
    }

    /// Apply one snapshot to `pool`, mirroring every membership change onto
    /// `scene` before returning.
    pub fn reconcile<R: RenderSubstrate>(
        &mut self,
        pool: &mut EntityPool,
        snapshot: &Snapshot,
        now: f32,
        scene: &mut R,
    ) -> Reconciliation {
        let mut effects = Vec::new();
        let mut report = ReconcileReport {
            malformed: snapshot.malformed,
            ..ReconcileReport::default()
        };

        let by_frequency = self.config.identity_policy == IdentityPolicy::ByFrequency;
        let live: HashSet<SoundKey> = if by_frequency {
            snapshot.entries.iter().map(SoundKey::of).collect()
        } else {
            HashSet::new()
        };

        // Refresh matches, fade and evict everything else
        let ReconcileConfig {
            lifecycle_mode,
            decay_rate,
            max_lifetime_s,
            ..
        } = self.config;
        pool.retain_mut(|entity| {
            let matched = live.contains(&entity.key());
            let faded = if matched {
                entity.refresh(now);
                false
            } else {
                entity.decay(decay_rate) <= 0.
            };

            // Lifetime applies whether or not the sound is still heard
            if faded || lifecycle_mode.age(entity, now) > max_lifetime_s {
                scene.remove_visual(entity.handle());
                effects.push(Effect::Evict {
                    id: entity.id(),
                    handle: entity.handle(),
                });
                report.evicted += 1;
                return false;
            }
            if matched {
                report.matched += 1;
            }
            true
        });

        // Spawn whatever is not represented yet, while there is room
        let mut present: HashSet<SoundKey> = if by_frequency {
            pool.iter().map(VisualEntity::key).collect()
        } else {
            HashSet::new()
        };
        for entry in &snapshot.entries {
            let key = SoundKey::of(entry);
            if by_frequency && !present.insert(key) {
                continue;
            }
            if pool.is_full() {
                report.dropped += 1;
                continue;
            }

            let visual = Visual::derive(entry, pool.len(), pool.capacity(), &self.visual);
            let handle = scene.create_visual(&visual);
            let id = EntityId(self.next_id);
            self.next_id += 1;

            match pool.try_insert(VisualEntity::spawn(id, key, handle, visual, now)) {
                Ok(()) => {
                    effects.push(Effect::Spawn { id, handle });
                    report.spawned += 1;
                }
                Err(rejected) => {
                    scene.remove_visual(rejected.handle());
                    report.dropped += 1;
                }
            }
        }

        log::trace!("Reconciled snapshot: {report:?}, {} live", pool.len());
        Reconciliation { effects, report }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::num::NonZeroUsize;

    use super::*;
    use crate::entity::MotionLaw;
    use crate::mapper::Domain;
    use crate::protocol::SoundEntry;
    use crate::scene::Scene;

    const DECAY: f32 = 0.25;

    fn reconciler(policy: IdentityPolicy, mode: LifecycleMode, max_lifetime_s: f32) -> Reconciler {
        Reconciler::with_parts(
            ReconcileConfig {
                identity_policy: policy,
                lifecycle_mode: mode,
                decay_rate: DECAY,
                max_lifetime_s,
            },
            VisualConfig {
                frequency_domain: Domain::new(30., 200.),
                size_range: Domain::new(0.1, 1.),
                motion_law: MotionLaw::Ring,
                orbit_rate: 0.005,
            },
        )
    }

    fn pool(capacity: usize) -> EntityPool {
        EntityPool::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn snapshot(frequencies: &[f64]) -> Snapshot {
        Snapshot::new(
            frequencies
                .iter()
                .map(|&frequency| SoundEntry {
                    frequency,
                    lfo_frequency: 1.,
                    pan: None,
                })
                .collect(),
        )
    }

    fn ids(pool: &EntityPool) -> BTreeSet<EntityId> {
        pool.iter().map(VisualEntity::id).collect()
    }

    #[test]
    fn fills_an_empty_pool() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        let mut pool = pool(3);
        let mut scene = Scene::new();

        let pass = r.reconcile(&mut pool, &snapshot(&[100., 150., 300.]), 0., &mut scene);

        assert_eq!(pool.len(), 3);
        assert!(pool.iter().all(|e| e.opacity() == 1.));
        assert_eq!(pass.report.spawned, 3);
        assert_eq!(pass.effects.len(), 3);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn generational_pass_decays_by_exactly_the_rate() {
        let mut r = reconciler(IdentityPolicy::Generational, LifecycleMode::SinceSpawn, 5.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100.]), 0., &mut scene);

        r.reconcile(&mut pool, &Snapshot::empty(), 0.1, &mut scene);

        assert_eq!(pool.len(), 1);
        let opacity = pool.iter().next().unwrap().opacity();
        assert_eq!(opacity, 1. - DECAY);
    }

    #[test]
    fn full_pool_drops_new_entries_quietly() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        let mut pool = pool(2);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100., 150.]), 0., &mut scene);
        let before = ids(&pool);

        let pass = r.reconcile(&mut pool, &snapshot(&[100., 150., 40., 60.]), 0.1, &mut scene);

        assert_eq!(pool.len(), 2);
        assert_eq!(ids(&pool), before);
        assert_eq!(pass.report.dropped, 2);
        assert_eq!(pass.report.matched, 2);
        assert!(pass.effects.is_empty());
    }

    #[test]
    fn matching_frequency_restores_opacity() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100., 150.]), 0., &mut scene);
        r.reconcile(&mut pool, &snapshot(&[100.]), 0.1, &mut scene);

        let opacity_of = |pool: &EntityPool, f: f32| {
            pool.iter()
                .find(|e| e.visual().frequency == f)
                .map(VisualEntity::opacity)
        };
        assert_eq!(opacity_of(&pool, 100.), Some(1.));
        assert_eq!(opacity_of(&pool, 150.), Some(1. - DECAY));

        // The faded one comes back to full when heard again
        let pass = r.reconcile(&mut pool, &snapshot(&[150.]), 0.2, &mut scene);
        assert_eq!(opacity_of(&pool, 150.), Some(1.));
        assert_eq!(pass.report.spawned, 0);
    }

    #[test]
    fn duplicate_frequencies_share_one_marker() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100., 100., 100.]), 0., &mut scene);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn generational_spawns_a_new_marker_every_pass() {
        let mut r = reconciler(IdentityPolicy::Generational, LifecycleMode::SinceSpawn, 5.);
        let mut pool = pool(10);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100.]), 0., &mut scene);
        let pass = r.reconcile(&mut pool, &snapshot(&[100.]), 0.1, &mut scene);
        assert_eq!(pool.len(), 2);
        assert_eq!(pass.report.matched, 0);
        assert_eq!(pass.report.spawned, 1);
    }

    #[test]
    fn empty_snapshots_drain_the_pool_monotonically() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 100.);
        let mut pool = pool(8);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[50., 60., 70., 80.]), 0., &mut scene);

        let mut previous = pool.total_opacity();
        let mut passes = 0;
        while !pool.is_empty() {
            passes += 1;
            assert!(passes <= 8, "pool never drained");
            r.reconcile(&mut pool, &Snapshot::empty(), passes as f32 * 0.1, &mut scene);
            let total = pool.total_opacity();
            assert!(total < previous);
            previous = total;
        }
        assert_eq!(passes, 4);
        assert!(scene.is_empty());
    }

    #[test]
    fn nothing_outlives_max_lifetime() {
        for mode in [LifecycleMode::SinceMatch, LifecycleMode::SinceSpawn] {
            let mut r = reconciler(IdentityPolicy::ByFrequency, mode, 1.);
            let mut pool = pool(4);
            let mut scene = Scene::new();
            r.reconcile(&mut pool, &snapshot(&[100.]), 0., &mut scene);

            // Not heard again, tiny decay would keep it alive for long otherwise
            r.config.decay_rate = 0.001;
            r.reconcile(&mut pool, &Snapshot::empty(), 0.5, &mut scene);
            assert_eq!(pool.len(), 1);
            r.reconcile(&mut pool, &Snapshot::empty(), 1.5, &mut scene);
            assert!(pool.is_empty(), "{mode:?} kept an expired marker");
        }
    }

    #[test]
    fn since_spawn_ignores_matches_for_lifetime() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceSpawn, 1.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100.]), 0., &mut scene);
        r.reconcile(&mut pool, &snapshot(&[100.]), 0.9, &mut scene);

        // Heard at 0.9, but born at 0: one miss past a second evicts it
        let pass = r.reconcile(&mut pool, &Snapshot::empty(), 1.2, &mut scene);
        assert_eq!(pass.report.evicted, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn heard_sounds_still_expire_since_spawn() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceSpawn, 1.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100.]), 0., &mut scene);
        let first = ids(&pool);

        let mut expiries = 0;
        for step in 1..=12 {
            let now = step as f32 * 0.25;
            let pass = r.reconcile(&mut pool, &snapshot(&[100.]), now, &mut scene);
            if pass.report.evicted > 0 {
                // Expired while still playing: replaced, not matched
                expiries += 1;
                assert_eq!(pass.report.matched, 0);
                assert_eq!(pass.report.spawned, 1);
            }
            assert_eq!(pool.len(), 1);
            assert_eq!(scene.len(), 1);
            assert!(pool.iter().all(|e| now - e.spawn_time() <= 1.));
        }
        assert_eq!(expiries, 2);
        assert!(ids(&pool).is_disjoint(&first));
    }

    #[test]
    fn effects_account_for_every_membership_change() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        r.config.decay_rate = 0.6;
        let mut pool = pool(5);
        let mut scene = Scene::new();

        let script: [&[f64]; 6] = [
            &[100., 110., 120.],
            &[110., 130.],
            &[140., 150., 160., 170.],
            &[],
            &[100., 200., 300., 400., 500., 600.],
            &[],
        ];
        for (i, frequencies) in script.iter().enumerate() {
            let before = ids(&pool);
            let pass = r.reconcile(&mut pool, &snapshot(frequencies), i as f32 * 0.1, &mut scene);
            let after = ids(&pool);

            let mut spawned = BTreeSet::new();
            let mut evicted = BTreeSet::new();
            for effect in &pass.effects {
                match *effect {
                    Effect::Spawn { id, .. } => assert!(spawned.insert(id)),
                    Effect::Evict { id, .. } => assert!(evicted.insert(id)),
                }
            }

            assert!(pool.len() <= 5);
            assert!(spawned.is_disjoint(&evicted));
            assert_eq!(after.difference(&before).copied().collect::<BTreeSet<_>>(), spawned);
            assert_eq!(before.difference(&after).copied().collect::<BTreeSet<_>>(), evicted);
            assert_eq!(scene.len(), pool.len());
        }
    }

    #[test]
    fn lost_connection_keeps_decaying() {
        use crate::transport::{ConnectionState, TransportAdapter, TransportConfig};
        use std::time::{Duration, Instant};

        let mut r = reconciler(IdentityPolicy::Generational, LifecycleMode::SinceSpawn, 100.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        r.reconcile(&mut pool, &snapshot(&[100., 150.]), 0., &mut scene);
        r.reconcile(&mut pool, &Snapshot::empty(), 0.1, &mut scene);
        assert_eq!(pool.len(), 2);

        let mut transport = TransportAdapter::connect(&TransportConfig {
            endpoint: "http://127.0.0.1:1".into(),
            ..TransportConfig::default()
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.state() != ConnectionState::Closed {
            assert!(Instant::now() < deadline, "transport never closed");
            transport.poll();
            std::thread::sleep(Duration::from_millis(5));
        }

        // With the engine gone only empty passes remain
        let mut now = 0.1;
        let mut previous = pool.total_opacity();
        while !pool.is_empty() {
            now += 0.1;
            r.reconcile(&mut pool, &Snapshot::empty(), now, &mut scene);
            assert!(pool.total_opacity() < previous);
            previous = pool.total_opacity();
        }
        assert!(scene.is_empty());
    }

    #[test]
    fn malformed_count_is_reported() {
        let mut r = reconciler(IdentityPolicy::ByFrequency, LifecycleMode::SinceMatch, 5.);
        let mut pool = pool(4);
        let mut scene = Scene::new();
        let mut snap = snapshot(&[100.]);
        snap.malformed = 2;
        let pass = r.reconcile(&mut pool, &snap, 0., &mut scene);
        assert_eq!(pass.report.malformed, 2);
        assert_eq!(pass.report.spawned, 1);
    }
}
