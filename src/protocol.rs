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

//! Messages exchanged with the audio engine.
//!
//! Every message is one JSON object per WebSocket text frame, discriminated
//! by its `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Waveform of the oscillator modulating a started sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfoShape {
    Sine,
    Triangle,
    Square,
}

/// Commands sent to the audio engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask for a snapshot of every sound currently playing.
    GetAllPlayingSounds,
    /// Start an oscillator, replacing this client's previous one.
    PlaySignalOscillator {
        frequency: f32,
        lfo_frequency: f32,
        lfo_shape: LfoShape,
        pan: f32,
    },
    /// Stop the sound this client started last.
    StopAudio,
    /// Stop everything this client is responsible for.
    StopAllAudio,
}
impl ClientMsg {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One active sound as reported by the engine. Extra fields sent by the
/// engine (client id, shape, volume, ...) are ignored.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SoundEntry {
    pub frequency: f64,
    pub lfo_frequency: f64,
    #[serde(default)]
    pub pan: Option<f64>,
}
impl SoundEntry {
    fn is_finite(&self) -> bool {
        self.frequency.is_finite()
            && self.lfo_frequency.is_finite()
            && self.pan.map_or(true, f64::is_finite)
    }
}

/// The sounds active at the moment the engine answered, in engine order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub entries: Vec<SoundEntry>,
    /// Entries dropped while decoding because a required number was missing
    /// or unusable.
    pub malformed: usize,
}
impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: Vec<SoundEntry>) -> Self {
        Self {
            entries,
            malformed: 0,
        }
    }

    /// Decode the `data` payload of an `active_sounds` message, skipping bad
    /// entries one by one. A payload that is not a list decodes as empty.
    pub fn from_value(data: Value) -> Self {
        let Value::Array(items) = data else {
            log::debug!("`active_sounds` payload is not a list, treating as empty");
            return Self {
                entries: Vec::new(),
                malformed: 1,
            };
        };

        let mut snapshot = Self {
            entries: Vec::with_capacity(items.len()),
            malformed: 0,
        };
        for item in items {
            match serde_json::from_value::<SoundEntry>(item) {
                Ok(entry) if entry.is_finite() => snapshot.entries.push(entry),
                Ok(entry) => {
                    log::debug!("Skipping sound with non-finite parameters: {entry:?}");
                    snapshot.malformed += 1;
                }
                Err(e) => {
                    log::debug!("Skipping malformed sound entry: {e}");
                    snapshot.malformed += 1;
                }
            }
        }
        snapshot
    }
}

/// Messages pushed by the audio engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMsg {
    ActiveSounds(Snapshot),
    /// Opaque diagnostics, surfaced verbatim.
    DebugInfo(Value),
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ServerMsg {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let Envelope { kind, data } = serde_json::from_str(text)?;
        Ok(match kind.as_str() {
            "active_sounds" => Self::ActiveSounds(Snapshot::from_value(data)),
            "debug_info" => Self::DebugInfo(data),
            _ => Self::Unknown(kind),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_match_wire_format() {
        assert_eq!(
            ClientMsg::GetAllPlayingSounds.to_json().unwrap(),
            r#"{"type":"get_all_playing_sounds"}"#
        );
        assert_eq!(
            ClientMsg::StopAllAudio.to_json().unwrap(),
            r#"{"type":"stop_all_audio"}"#
        );

        let play = ClientMsg::PlaySignalOscillator {
            frequency: 220.,
            lfo_frequency: -12.5,
            lfo_shape: LfoShape::Sine,
            pan: 0.25,
        };
        let value: Value = serde_json::from_str(&play.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "play_signal_oscillator",
                "frequency": 220.0,
                "lfo_frequency": -12.5,
                "lfo_shape": "sine",
                "pan": 0.25,
            })
        );
    }

    #[test]
    fn active_sounds_skip_bad_entries() {
        let text = json!({
            "type": "active_sounds",
            "data": [
                {"frequency": 100.0, "lfo_frequency": 2.0, "pan": 0.5, "client_id": 7, "volume": 0.7},
                {"lfo_frequency": 2.0},
                {"frequency": "loud", "lfo_frequency": 2.0},
                {"frequency": 150.0, "lfo_frequency": -3.0},
            ]
        })
        .to_string();

        let ServerMsg::ActiveSounds(snapshot) = ServerMsg::parse(&text).unwrap() else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.malformed, 2);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].pan, Some(0.5));
        assert_eq!(snapshot.entries[1].frequency, 150.);
        assert_eq!(snapshot.entries[1].pan, None);
    }

    #[test]
    fn non_list_payload_is_an_empty_snapshot() {
        let msg = ServerMsg::parse(r#"{"type":"active_sounds","data":{"oops":1}}"#).unwrap();
        assert_eq!(
            msg,
            ServerMsg::ActiveSounds(Snapshot {
                entries: vec![],
                malformed: 1
            })
        );
    }

    #[test]
    fn debug_info_is_passed_through() {
        let msg = ServerMsg::parse(r#"{"type":"debug_info","data":{"clients":[1,2]}}"#).unwrap();
        assert_eq!(msg, ServerMsg::DebugInfo(json!({"clients": [1, 2]})));
    }

    #[test]
    fn unknown_types_are_reported() {
        let msg = ServerMsg::parse(r#"{"type":"other_clients_actions","data":[]}"#).unwrap();
        assert_eq!(msg, ServerMsg::Unknown("other_clients_actions".into()));
        assert!(ServerMsg::parse("not json").is_err());
    }
}
