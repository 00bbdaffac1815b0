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

//! Markers on a torus for every sound a remote audio engine is playing.
//!
//! Snapshots of the engine's active sounds arrive over a WebSocket, are
//! reconciled into a bounded pool of markers and animated every frame
//! independently of how often snapshots arrive.

pub mod animation;
pub mod app_config;
pub mod entity;
pub mod input;
pub mod mapper;
pub mod my_math;
pub mod overlay;
pub mod protocol;
pub mod reconciler;
pub mod scene;
pub mod transport;
