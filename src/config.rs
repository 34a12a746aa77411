//! Compile-time defaults and the runtime server configuration.

use std::time::Duration;

pub const BOARD_ROWS: usize = 10;
pub const BOARD_COLUMNS: usize = 10;

/// Largest row or column count accepted from a submitted board.
pub const MAX_BOARD_DIMENSION: usize = 32;

/// Ship lengths of the standard fleet: one 4, two 3s, three 2s, four 1s.
pub const STANDARD_FLEET: [usize; 10] = [4, 3, 3, 2, 2, 2, 1, 1, 1, 1];

/// Random anchors tried per ship before `random_shuffle` gives up.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

/// Per-turn budget used by the networked server.
pub const DEFAULT_TIME_PER_TURN: Duration = Duration::from_secs(60);

pub const DEFAULT_PORT: u16 = 5555;

/// Maximum length of a single newline-delimited frame (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Connections silent for longer than this are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Room ids are drawn uniformly from this range and rendered as 6 digits.
pub const ROOM_ID_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Runtime knobs for a [`GameServer`](crate::GameServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `None` disables turn deadlines (offline play).
    pub time_per_turn: Option<Duration>,
    /// Only accept 10x10 boards carrying exactly [`STANDARD_FLEET`].
    pub strict_fleet: bool,
    /// Fixed seed for room id generation.
    pub seed: Option<u64>,
    pub max_frame_size: usize,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            time_per_turn: None,
            strict_fleet: false,
            seed: None,
            max_frame_size: MAX_FRAME_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Configuration used by the TCP server: timed turns.
    pub fn networked() -> Self {
        Self {
            time_per_turn: Some(DEFAULT_TIME_PER_TURN),
            ..Self::default()
        }
    }

    /// Untimed configuration used for in-process games.
    pub fn offline() -> Self {
        Self::default()
    }
}
