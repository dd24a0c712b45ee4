use serde::{Deserialize, Serialize};

/// Host-side settings applied when an engine is created.
///
/// Every field has a default so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master volume, 0-255.
    pub master_volume: u8,
    /// Music volume, 0-255. Muted while the engine is paused.
    pub music_volume: u8,
    /// The backend is a real MT-32, so Roland data needs no emulation.
    pub native_mt32: bool,
    /// Overrides [`Driver::base_tempo`](crate::Driver::base_tempo).
    pub base_tempo: Option<u32>,
    /// Number of player slots sounds may use, 1-8.
    pub limit_players: usize,
    /// Restart a sound that is already playing on its own player, and let a
    /// new sound take the lowest priority player even at equal priority.
    pub recycle_players: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_volume: 255,
            music_volume: 255,
            native_mt32: false,
            base_tempo: None,
            limit_players: 8,
            recycle_players: false,
        }
    }
}
