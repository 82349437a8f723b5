//! Road-sign class table.
//!
//! The detector reports integer class ids. This module maps them to a fixed
//! enumeration; ids outside the table map to [`SignClass::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of classes the reference model was trained on.
pub const SIGN_CLASS_COUNT: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignClass {
    BumpAhead,
    GiveWay,
    GoSlow,
    NarrowBridgeAhead,
    NoOvertaking,
    NoParking,
    NoUturn,
    SchoolAhead,
    SideRoadAhead,
    SpeedLimit,
    Stop,
    PedestrianCrossing,
    Unknown,
}

impl SignClass {
    /// All known classes in model id order. `Unknown` is not included.
    pub const KNOWN: [SignClass; SIGN_CLASS_COUNT] = [
        SignClass::BumpAhead,
        SignClass::GiveWay,
        SignClass::GoSlow,
        SignClass::NarrowBridgeAhead,
        SignClass::NoOvertaking,
        SignClass::NoParking,
        SignClass::NoUturn,
        SignClass::SchoolAhead,
        SignClass::SideRoadAhead,
        SignClass::SpeedLimit,
        SignClass::Stop,
        SignClass::PedestrianCrossing,
    ];

    /// Map a model class id to a sign. Never fails.
    pub fn from_class_id(id: i64) -> Self {
        usize::try_from(id)
            .ok()
            .and_then(|idx| Self::KNOWN.get(idx).copied())
            .unwrap_or(SignClass::Unknown)
    }

    /// Model class id, or `None` for `Unknown`.
    pub fn class_id(self) -> Option<usize> {
        Self::KNOWN.iter().position(|class| *class == self)
    }

    /// Human-readable label, also the text handed to the announcer.
    pub fn label(self) -> &'static str {
        match self {
            SignClass::BumpAhead => "Bump Ahead",
            SignClass::GiveWay => "Give Way",
            SignClass::GoSlow => "Go Slow",
            SignClass::NarrowBridgeAhead => "Narrow Bridge Ahead",
            SignClass::NoOvertaking => "No Overtaking",
            SignClass::NoParking => "No Parking",
            SignClass::NoUturn => "No Uturn",
            SignClass::SchoolAhead => "School Ahead",
            SignClass::SideRoadAhead => "Side Road Ahead",
            SignClass::SpeedLimit => "Speed Limit",
            SignClass::Stop => "Stop",
            SignClass::PedestrianCrossing => "Pedestrian Crossing",
            SignClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SignClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_map_in_model_order() {
        assert_eq!(SignClass::from_class_id(0), SignClass::BumpAhead);
        assert_eq!(SignClass::from_class_id(1), SignClass::GiveWay);
        assert_eq!(SignClass::from_class_id(10), SignClass::Stop);
        assert_eq!(SignClass::from_class_id(11), SignClass::PedestrianCrossing);
    }

    #[test]
    fn out_of_table_ids_are_unknown() {
        assert_eq!(SignClass::from_class_id(12), SignClass::Unknown);
        assert_eq!(SignClass::from_class_id(-1), SignClass::Unknown);
        assert_eq!(SignClass::from_class_id(i64::MAX), SignClass::Unknown);
        assert_eq!(SignClass::Unknown.label(), "Unknown");
    }

    #[test]
    fn class_id_round_trips_for_known_signs() {
        for (idx, class) in SignClass::KNOWN.iter().enumerate() {
            assert_eq!(class.class_id(), Some(idx));
        }
        assert_eq!(SignClass::Unknown.class_id(), None);
    }
}
