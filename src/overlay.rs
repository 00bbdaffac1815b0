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

use serde_json::Value;

use crate::reconciler::ReconcileReport;
use crate::transport::{ConnectionState, TransportError};

const APP_NAME: &str = "planetor";

// Longest `debug_info` payload shown in the title
const MAX_DEBUG_CHARS: usize = 80;

/// Diagnostics rendered into the window title.
pub struct DiagnosticOverlay {
    state: ConnectionState,
    active_markers: usize,
    debug_info: Option<String>,
    last_error: Option<String>,
    dirty: bool,
}

impl Default for DiagnosticOverlay {
    fn default() -> Self {
        Self {
            state: ConnectionState::Connecting,
            active_markers: 0,
            debug_info: None,
            last_error: None,
            dirty: true,
        }
    }
}

impl DiagnosticOverlay {
    pub fn active_markers(&self) -> usize {
        self.active_markers
    }
    pub fn debug_info(&self) -> Option<&str> {
        self.debug_info.as_deref()
    }
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            log::info!("Connection state: {state:?}");
            self.state = state;
            self.dirty = true;
        }
    }

    pub fn record_pass(&mut self, report: &ReconcileReport, active_markers: usize) {
        if self.active_markers != active_markers {
            self.active_markers = active_markers;
            self.dirty = true;
        }
        if report.dropped > 0 {
            log::debug!("Pool full, {} sounds not shown", report.dropped);
        }
    }

    pub fn record_debug_info(&mut self, data: &Value) {
        let text = data.to_string();
        log::info!("Engine debug info: {text}");
        self.debug_info = Some(text);
        self.dirty = true;
    }

    pub fn record_error(&mut self, error: &TransportError) {
        self.last_error = Some(error.to_string());
        self.dirty = true;
    }

    /// The title to show, if anything changed since the last call.
    pub fn take_title(&mut self) -> Option<String> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        Some(self.title())
    }

    pub fn title(&self) -> String {
        let state = match self.state {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "connected",
            ConnectionState::Closed => "disconnected",
        };
        let mut title = format!("{APP_NAME} | {state} | markers: {}", self.active_markers);
        if let Some(error) = &self.last_error {
            title += &format!(" | error: {error}");
        }
        if let Some(info) = &self.debug_info {
            let mut chars = info.chars();
            let shown: String = chars.by_ref().take(MAX_DEBUG_CHARS).collect();
            let ellipsis = if chars.next().is_some() { "..." } else { "" };
            title += &format!(" | debug: {shown}{ellipsis}");
        }
        title
    }
}
