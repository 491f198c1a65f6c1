//! Bit-pattern masks for routes and devices
//!
//! A [`RouteMask`] carries exactly one bit per route when it identifies a
//! route, and any number of bits when it is an aggregate (enabled routes,
//! routes to mute, ...). Aggregates are built by OR-ing route masks together,
//! which caps a direction at 32 distinct routes.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Set of routes, one bit per route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RouteMask(pub u32);

impl RouteMask {
    /// The empty set
    pub const EMPTY: RouteMask = RouteMask(0);

    /// Number of distinct routes a mask can represent
    pub const CAPACITY: u32 = u32::BITS;

    /// Mask with only bit `index` set
    ///
    /// Returns the empty mask when `index` is out of range.
    pub fn from_bit(index: u32) -> Self {
        RouteMask(1u32.checked_shl(index).unwrap_or(0))
    }

    /// Get the raw mask value
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if no route is in the set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if exactly one bit is set (a valid route identity)
    pub fn is_single_route(&self) -> bool {
        self.0.is_power_of_two()
    }

    /// Returns true if every bit of `other` is also set in `self`
    pub fn contains(&self, other: RouteMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if the two sets share at least one route
    pub fn intersects(&self, other: RouteMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Number of routes in the set
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over the single-bit masks contained in this set, lowest first
    pub fn routes(&self) -> impl Iterator<Item = RouteMask> {
        let bits = self.0;
        (0..Self::CAPACITY)
            .map(RouteMask::from_bit)
            .filter(move |m| bits & m.0 != 0)
    }
}

impl BitOr for RouteMask {
    type Output = RouteMask;

    fn bitor(self, rhs: RouteMask) -> RouteMask {
        RouteMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for RouteMask {
    fn bitor_assign(&mut self, rhs: RouteMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RouteMask {
    type Output = RouteMask;

    fn bitand(self, rhs: RouteMask) -> RouteMask {
        RouteMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for RouteMask {
    fn bitand_assign(&mut self, rhs: RouteMask) {
        self.0 &= rhs.0;
    }
}

impl Not for RouteMask {
    type Output = RouteMask;

    fn not(self) -> RouteMask {
        RouteMask(!self.0)
    }
}

impl fmt::Display for RouteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for RouteMask {
    fn from(bits: u32) -> Self {
        RouteMask(bits)
    }
}

/// Set of audio devices (speaker, headset, BT SCO, ...) a route can reach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceMask(pub u32);

impl DeviceMask {
    /// No device
    pub const NONE: DeviceMask = DeviceMask(0);

    /// Get the raw mask value
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every device of `devices` is supported
    ///
    /// An empty `devices` set is trivially contained.
    pub fn contains(&self, devices: DeviceMask) -> bool {
        self.0 & devices.0 == devices.0
    }
}

impl BitOr for DeviceMask {
    type Output = DeviceMask;

    fn bitor(self, rhs: DeviceMask) -> DeviceMask {
        DeviceMask(self.0 | rhs.0)
    }
}

impl fmt::Display for DeviceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for DeviceMask {
    fn from(bits: u32) -> Self {
        DeviceMask(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_bit() {
        assert_eq!(RouteMask::from_bit(0).bits(), 0x1);
        assert_eq!(RouteMask::from_bit(31).bits(), 0x8000_0000);
        assert!(RouteMask::from_bit(32).is_empty());
    }

    #[test]
    fn test_single_route() {
        assert!(RouteMask(0x4).is_single_route());
        assert!(!RouteMask(0x6).is_single_route());
        assert!(!RouteMask::EMPTY.is_single_route());
    }

    #[test]
    fn test_routes_iteration() {
        let set = RouteMask(0b1010_0001);
        let routes: Vec<u32> = set.routes().map(|m| m.bits()).collect();
        assert_eq!(routes, vec![0x01, 0x20, 0x80]);
        assert_eq!(set.count(), 3);
    }

    #[test]
    fn test_device_containment() {
        let supported = DeviceMask(0x4 | 0x8);
        assert!(supported.contains(DeviceMask(0x4)));
        assert!(supported.contains(DeviceMask(0xC)));
        assert!(!supported.contains(DeviceMask(0x5)));
        assert!(supported.contains(DeviceMask::NONE));
    }

    #[test]
    fn test_display() {
        assert_eq!(RouteMask(0x10).to_string(), "0x00000010");
    }

    proptest! {
        #[test]
        fn routes_recompose_to_original(bits: u32) {
            let set = RouteMask(bits);
            let rebuilt = set.routes().fold(RouteMask::EMPTY, |acc, m| acc | m);
            prop_assert_eq!(rebuilt, set);
            prop_assert!(set.routes().all(|m| m.is_single_route()));
        }
    }
}
