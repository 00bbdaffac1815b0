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

use crate::app_config::AppConfig;
use crate::entity::{EntityPool, MotionLaw, MotionView};
use crate::input::{InputSampler, Key};
use crate::my_math::{torus_point, Vector3};
use crate::scene::RenderSubstrate;

pub const TORUS_RADIUS: f32 = 2.;
pub const RING_RADIUS: f32 = 5.;

const LIGHT_ORBIT_RADIUS: f32 = 5.;

/// How per-frame increments relate to elapsed time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameStep {
    /// Every increment is applied once per presented frame, so speed follows
    /// the display refresh rate.
    Fixed,
    /// Increments are scaled by `dt * reference_hz`, matching `Fixed` at a
    /// display running at `reference_hz`.
    Scaled { reference_hz: f32 },
}
impl FrameStep {
    pub fn factor(self, dt: f32) -> f32 {
        match self {
            Self::Fixed => 1.,
            Self::Scaled { reference_hz } => dt.max(0.) * reference_hz,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationConfig {
    pub frame_step: FrameStep,
    pub move_speed: f32,
    pub rotate_speed: f32,
    pub ambient_rate: f32,
    pub camera_distance: f32,
    pub ambient_color: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vector3,
    pub pitch: f32,
    pub yaw: f32,
}
impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector3::new(0., 0., 10.),
            pitch: 0.,
            yaw: 0.,
        }
    }
}
impl Camera {
    fn apply_input(&mut self, input: &InputSampler, move_speed: f32, rotate_speed: f32) {
        for key in input.held_keys() {
            match key {
                Key::W => self.position.z -= move_speed,
                Key::S => self.position.z += move_speed,
                Key::A => self.position.x -= move_speed,
                Key::D => self.position.x += move_speed,
                Key::Up => self.pitch -= rotate_speed,
                Key::Down => self.pitch += rotate_speed,
                Key::Left => self.yaw -= rotate_speed,
                Key::Right => self.yaw += rotate_speed,
            }
        }

        // A held touch steers toward its offset from the screen center
        let touch = input.current_touch();
        if touch.active {
            self.yaw += rotate_speed * (touch.x - 0.5) * 2.;
            self.pitch += rotate_speed * (touch.y - 0.5) * 2.;
        }
    }
}

/// Background effect state: a shader clock and an orbiting light.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ambient {
    pub time: f32,
    pub light_position: Vector3,
    pub color: [f32; 3],
}

pub struct AnimationDriver {
    config: AnimationConfig,
    camera: Camera,
    ambient: Ambient,
    last_frame: Option<f32>,
}

impl AnimationDriver {
    pub fn new(app_config: &AppConfig) -> Self {
        Self::with_config(app_config.animation.clone())
    }

    pub fn with_config(config: AnimationConfig) -> Self {
        let camera = Camera {
            position: Vector3::new(0., 0., config.camera_distance),
            ..Camera::default()
        };
        let ambient = Ambient {
            color: config.ambient_color,
            ..Ambient::default()
        };
        Self {
            config,
            camera,
            ambient,
            last_frame: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }
    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }

    /// Advance every marker, the background and the camera by one frame and
    /// present it. `now` is seconds on the same clock the reconciler uses.
    pub fn frame<R: RenderSubstrate>(
        &mut self,
        pool: &mut EntityPool,
        input: &InputSampler,
        now: f32,
        scene: &mut R,
    ) {
        let step = match self.last_frame.replace(now) {
            Some(last) => self.config.frame_step.factor(now - last),
            // The first frame counts as one reference frame
            None => 1.,
        };

        for view in pool.motion_iter_mut() {
            advance_marker(view, now, step, scene);
        }

        self.ambient.time += self.config.ambient_rate * step;
        self.ambient.light_position = Vector3::new(
            now.sin() * LIGHT_ORBIT_RADIUS,
            now.cos() * LIGHT_ORBIT_RADIUS,
            now.sin() * LIGHT_ORBIT_RADIUS,
        );
        scene.set_ambient(&self.ambient);

        self.camera.apply_input(
            input,
            self.config.move_speed * step,
            self.config.rotate_speed * step,
        );
        scene.set_camera(&self.camera);

        scene.present_frame();
    }
}

fn advance_marker<R: RenderSubstrate>(view: MotionView<'_>, now: f32, step: f32, scene: &mut R) {
    let MotionView {
        handle,
        spawn_time,
        opacity,
        visual,
        motion,
    } = view;

    motion.orbit_angle += visual.orbit_rate * step;
    motion.rotation += step * visual.spin;

    let position = match visual.law {
        MotionLaw::Ring => torus_point(
            TORUS_RADIUS,
            RING_RADIUS,
            visual.tube_angle,
            motion.orbit_angle,
        ),
        MotionLaw::Drift => {
            let mut p = torus_point(
                TORUS_RADIUS,
                RING_RADIUS,
                visual.tube_angle,
                motion.orbit_angle,
            );
            p.y = TORUS_RADIUS + RING_RADIUS * (now - spawn_time).sin() * motion.orbit_angle.cos();
            p
        }
    };

    scene.set_transform(
        handle,
        position,
        motion.rotation,
        Vector3::new(visual.size, visual.size, 1.),
    );
    scene.set_opacity(handle, opacity);
}
