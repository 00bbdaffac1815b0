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

use std::collections::HashSet;

use serde::Deserialize;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{
    ElementState, KeyboardInput, MouseButton, Touch as WinitTouch, TouchPhase, VirtualKeyCode,
    WindowEvent,
};

use crate::mapper::Domain;
use crate::my_math::Vector2;
use crate::protocol::{ClientMsg, LfoShape};

// Touch id used when the left mouse button stands in for a finger
const MOUSE_TOUCH_ID: u64 = u64::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
}
impl Key {
    pub fn from_virtual(code: VirtualKeyCode) -> Option<Self> {
        Some(match code {
            VirtualKeyCode::W => Self::W,
            VirtualKeyCode::A => Self::A,
            VirtualKeyCode::S => Self::S,
            VirtualKeyCode::D => Self::D,
            VirtualKeyCode::Up => Self::Up,
            VirtualKeyCode::Down => Self::Down,
            VirtualKeyCode::Left => Self::Left,
            VirtualKeyCode::Right => Self::Right,
            _ => return None,
        })
    }
}

/// Touch state in window coordinates normalized to `[0, 1]`, origin top left.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Touch {
    pub x: f32,
    pub y: f32,
    pub active: bool,
}

/// Edges of the single tracked touch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchGesture {
    Began(Touch),
    Ended,
}

/// How a touch point becomes an oscillator on the audio engine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TouchConfig {
    #[serde(default = "TouchConfig::default_frequency")]
    pub frequency_domain: Domain,
    #[serde(default = "TouchConfig::default_lfo")]
    pub lfo_domain: Domain,
    #[serde(default = "TouchConfig::default_pan")]
    pub pan_domain: Domain,
    #[serde(default = "TouchConfig::default_shape")]
    pub lfo_shape: LfoShape,
}
impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            frequency_domain: Self::default_frequency(),
            lfo_domain: Self::default_lfo(),
            pan_domain: Self::default_pan(),
            lfo_shape: Self::default_shape(),
        }
    }
}
impl TouchConfig {
    fn default_frequency() -> Domain {
        Domain::new(30., 600.)
    }
    fn default_lfo() -> Domain {
        Domain::new(-200., 200.)
    }
    fn default_pan() -> Domain {
        Domain::new(0., 1.)
    }
    fn default_shape() -> LfoShape {
        LfoShape::Sine
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.frequency_domain.validate("touch.frequency_domain")?;
        self.lfo_domain.validate("touch.lfo_domain")?;
        self.pan_domain.validate("touch.pan_domain")
    }

    /// Oscillator started by touching `touch`. Higher on screen is higher in
    /// pitch; horizontal position drives both modulation rate and pan.
    pub fn play_command(&self, touch: Touch) -> ClientMsg {
        let unit = Domain::new(0., 1.);
        let inverted = Domain::new(1., 0.);
        ClientMsg::PlaySignalOscillator {
            frequency: inverted.map_to(touch.y, &self.frequency_domain),
            lfo_frequency: unit.map_to(touch.x, &self.lfo_domain),
            lfo_shape: self.lfo_shape,
            pan: unit.map_to(touch.x, &self.pan_domain),
        }
    }
}

/// Keeps the modal input state the animation driver samples every frame.
#[derive(Default)]
pub struct InputSampler {
    held: HashSet<Key>,
    touch: Touch,
    touch_id: Option<u64>,
    cursor: Vector2,
    window_size: Vector2,
}

impl InputSampler {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        let mut sampler = Self::default();
        sampler.resize(size);
        sampler
    }

    pub fn held_keys(&self) -> &HashSet<Key> {
        &self.held
    }
    pub fn current_touch(&self) -> Touch {
        self.touch
    }

    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }
    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.window_size = Vector2::new(size.width as f32, size.height as f32);
    }

    fn normalize(&self, position: PhysicalPosition<f64>) -> (f32, f32) {
        let clamp = |v: f64, extent: f32| {
            if extent > 0. {
                (v as f32 / extent).clamp(0., 1.)
            } else {
                0.5
            }
        };
        (
            clamp(position.x, self.window_size.x),
            clamp(position.y, self.window_size.y),
        )
    }

    /// Start tracking a touch. Ignored while another touch is held.
    pub fn touch_start(&mut self, id: u64, x: f32, y: f32) -> Option<TouchGesture> {
        if self.touch_id.is_some() {
            return None;
        }
        self.touch_id = Some(id);
        self.touch = Touch { x, y, active: true };
        Some(TouchGesture::Began(self.touch))
    }

    pub fn touch_move(&mut self, id: u64, x: f32, y: f32) {
        if self.touch_id == Some(id) {
            self.touch.x = x;
            self.touch.y = y;
        }
    }

    pub fn touch_end(&mut self, id: u64) -> Option<TouchGesture> {
        if self.touch_id != Some(id) {
            return None;
        }
        self.touch_id = None;
        self.touch.active = false;
        Some(TouchGesture::Ended)
    }

    /// Fold a window event into the sampled state, reporting touch edges.
    pub fn handle_window_event(&mut self, event: &WindowEvent<'_>) -> Option<TouchGesture> {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(code),
                        ..
                    },
                ..
            } => {
                if let Some(key) = Key::from_virtual(*code) {
                    match state {
                        ElementState::Pressed => self.press(key),
                        ElementState::Released => self.release(key),
                    }
                }
                None
            }

            // Key-up events are lost while unfocused
            WindowEvent::Focused(false) => {
                self.release_all();
                None
            }

            WindowEvent::Resized(size) => {
                self.resize(*size);
                None
            }

            WindowEvent::Touch(WinitTouch {
                id,
                phase,
                location,
                ..
            }) => {
                let (x, y) = self.normalize(*location);
                match phase {
                    TouchPhase::Started => self.touch_start(*id, x, y),
                    TouchPhase::Moved => {
                        self.touch_move(*id, x, y);
                        None
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => self.touch_end(*id),
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = self.normalize(*position);
                self.cursor = Vector2::new(x, y);
                self.touch_move(MOUSE_TOUCH_ID, x, y);
                None
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.touch_start(MOUSE_TOUCH_ID, self.cursor.x, self.cursor.y)
                }
                ElementState::Released => self.touch_end(MOUSE_TOUCH_ID),
            },

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_held_until_released() {
        let mut input = InputSampler::default();
        input.press(Key::A);
        input.press(Key::A);
        input.press(Key::Up);
        assert_eq!(input.held_keys().len(), 2);
        input.release(Key::A);
        assert!(input.held_keys().contains(&Key::Up));
        input.release_all();
        assert!(input.held_keys().is_empty());
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(Key::from_virtual(VirtualKeyCode::W), Some(Key::W));
        assert_eq!(Key::from_virtual(VirtualKeyCode::F11), None);
    }

    #[test]
    fn only_one_touch_is_tracked() {
        let mut input = InputSampler::default();
        assert!(matches!(
            input.touch_start(1, 0.2, 0.3),
            Some(TouchGesture::Began(_))
        ));
        assert_eq!(input.touch_start(2, 0.9, 0.9), None);

        input.touch_move(2, 0.0, 0.0);
        input.touch_move(1, 0.4, 0.6);
        assert_eq!(
            input.current_touch(),
            Touch {
                x: 0.4,
                y: 0.6,
                active: true
            }
        );

        assert_eq!(input.touch_end(2), None);
        assert_eq!(input.touch_end(1), Some(TouchGesture::Ended));
        assert!(!input.current_touch().active);
    }

    #[test]
    fn touch_maps_to_oscillator() {
        let config = TouchConfig::default();
        let msg = config.play_command(Touch {
            x: 1.,
            y: 0.,
            active: true,
        });
        assert_eq!(
            msg,
            ClientMsg::PlaySignalOscillator {
                frequency: 600.,
                lfo_frequency: 200.,
                lfo_shape: LfoShape::Sine,
                pan: 1.,
            }
        );

        let ClientMsg::PlaySignalOscillator {
            frequency,
            lfo_frequency,
            pan,
            ..
        } = config.play_command(Touch {
            x: 0.5,
            y: 1.,
            active: true,
        })
        else {
            panic!("expected an oscillator");
        };
        assert_eq!(frequency, 30.);
        assert_eq!(lfo_frequency, 0.);
        assert_eq!(pan, 0.5);
    }

    #[test]
    fn positions_are_normalized_to_the_window() {
        let input = InputSampler::new(PhysicalSize::new(200, 100));
        assert_eq!(input.normalize(PhysicalPosition::new(50., 25.)), (0.25, 0.25));
        assert_eq!(input.normalize(PhysicalPosition::new(-5., 500.)), (0., 1.));
    }
}
