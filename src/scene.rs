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

use std::collections::HashMap;

use crate::animation::{Ambient, Camera};
use crate::entity::Visual;
use crate::my_math::Vector3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualHandle(u64);
impl VisualHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Whatever draws the markers. The reconciler adds and removes visuals, the
/// animation driver moves them and presents once per frame.
pub trait RenderSubstrate {
    fn create_visual(&mut self, visual: &Visual) -> VisualHandle;
    fn remove_visual(&mut self, handle: VisualHandle);
    fn set_transform(
        &mut self,
        handle: VisualHandle,
        position: Vector3,
        rotation: Vector3,
        scale: Vector3,
    );
    fn set_opacity(&mut self, handle: VisualHandle, opacity: f32);
    fn present_frame(&mut self);

    fn set_camera(&mut self, _camera: &Camera) {}
    fn set_ambient(&mut self, _ambient: &Ambient) {}
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub color: [f32; 3],
    pub position: Vector3,
    pub rotation: Vector3,
    pub scale: Vector3,
    pub opacity: f32,
}

/// In-memory scene graph. Keeps the latest state of every visual so a
/// presenter (or a test) can inspect exactly what would be drawn.
#[derive(Default)]
pub struct Scene {
    nodes: HashMap<VisualHandle, SceneNode>,
    next_handle: u64,
    frames_presented: u64,
    camera: Camera,
    ambient: Ambient,
}
impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, handle: VisualHandle) -> Option<&SceneNode> {
        self.nodes.get(&handle)
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
    pub fn camera(&self) -> &Camera {
        &self.camera
    }
    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }
}

impl RenderSubstrate for Scene {
    fn create_visual(&mut self, visual: &Visual) -> VisualHandle {
        let handle = VisualHandle(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            SceneNode {
                color: visual.color,
                position: Vector3::ZERO,
                rotation: Vector3::ZERO,
                scale: Vector3::new(visual.size, visual.size, 1.),
                opacity: 1.,
            },
        );
        handle
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        if self.nodes.remove(&handle).is_none() {
            log::warn!("Removing unknown visual {handle:?}");
        }
    }

    fn set_transform(
        &mut self,
        handle: VisualHandle,
        position: Vector3,
        rotation: Vector3,
        scale: Vector3,
    ) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.position = position;
            node.rotation = rotation;
            node.scale = scale;
        }
    }

    fn set_opacity(&mut self, handle: VisualHandle, opacity: f32) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.opacity = opacity;
        }
    }

    fn present_frame(&mut self) {
        self.frames_presented += 1;
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
    }

    fn set_ambient(&mut self, ambient: &Ambient) {
        self.ambient = *ambient;
    }
}
