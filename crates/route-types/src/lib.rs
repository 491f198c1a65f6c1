//! Audio Stream Route Vocabulary
//!
//! This crate provides the shared types used to match active audio streams
//! against a static topology of audio routes:
//!
//! - **Direction**: playback (output) or capture (input), plus a two-slot
//!   [`DirectionMap`] for per-direction state
//! - **Masks**: [`RouteMask`] (one bit per route) and [`DeviceMask`]
//!   (devices a route can reach)
//! - **Capabilities**: the [`StreamRoute`] and [`IoStream`] traits implemented
//!   by the device layer and the audio I/O layer
//!
//! # Example
//!
//! ```rust
//! use route_types::{Direction, DirectionMap, RouteMask};
//!
//! let speaker = RouteMask::from_bit(0);
//! let headset = RouteMask::from_bit(3);
//!
//! let mut enabled: DirectionMap<RouteMask> = DirectionMap::default();
//! enabled[Direction::Output] |= speaker | headset;
//!
//! assert_eq!(enabled[Direction::Output].bits(), 0b1001);
//! assert!(enabled[Direction::Input].is_empty());
//! ```

pub mod error;
pub mod mask;
pub mod route;
pub mod stream;

pub use error::RouteError;
pub use mask::{DeviceMask, RouteMask};
pub use route::{RouteKey, StreamRoute};
pub use stream::{same_stream, IoStream};

use std::ops::{Index, IndexMut};

/// Direction of an audio route or stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Capture path (microphone, line in, modem uplink)
    Input,
    /// Playback path (speaker, headset, modem downlink)
    Output,
}

impl Direction {
    /// Both directions, input first
    pub const ALL: [Direction; 2] = [Direction::Input, Direction::Output];

    /// Returns true for playback
    pub fn is_out(&self) -> bool {
        matches!(self, Direction::Output)
    }

    /// Build a direction from an "is output" flag
    pub fn from_is_out(is_out: bool) -> Self {
        if is_out {
            Direction::Output
        } else {
            Direction::Input
        }
    }

    /// Suffix appended to a route name to form its registry key
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Direction::Output => "_Playback",
            Direction::Input => "_Capture",
        }
    }

    /// Returns a human-readable name for the direction
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Output => "Output",
            Direction::Input => "Input",
        }
    }

    fn index(&self) -> usize {
        match self {
            Direction::Input => 0,
            Direction::Output => 1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed two-slot storage indexed by [`Direction`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectionMap<T> {
    slots: [T; 2],
}

impl<T> DirectionMap<T> {
    /// Create a map from explicit input and output values
    pub fn new(input: T, output: T) -> Self {
        Self {
            slots: [input, output],
        }
    }

    /// Iterate over `(direction, value)` pairs, input first
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.slots.iter())
    }

    /// Iterate mutably over `(direction, value)` pairs, input first
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Direction, &mut T)> {
        Direction::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.slots[direction.index()]
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.slots[direction.index()]
    }
}
