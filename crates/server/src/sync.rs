//! Movement delta classification.
//!
//! Picks the cheapest packet that carries an entity from the last broadcast
//! pose to its current one. Relative packets hold one signed byte per axis
//! (±4 units at 1/32 precision), so any single-axis jump beyond
//! [`TELEPORT_THRESHOLD`] falls back to an absolute teleport.

use bytes::Bytes;
use classic_engine::world::position::Location;

use crate::net::protocol::{
    to_angle, to_delta, OrientationUpdate, Packet, PlayerTeleport, PositionOrientationUpdate,
    PositionUpdate, WirePose, SELF_ID,
};

/// Per-axis displacement (world units) above which an absolute packet is used.
pub const TELEPORT_THRESHOLD: f64 = 1.0;

/// The synchronization packet chosen for one entity on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPacket {
    Teleport(PlayerTeleport),
    PositionOrientation(PositionOrientationUpdate),
    Position(PositionUpdate),
    Orientation(OrientationUpdate),
}

impl SyncPacket {
    /// Copy of this packet addressed to a different wire id.
    pub fn with_id(self, id: u8) -> Self {
        match self {
            SyncPacket::Teleport(p) => SyncPacket::Teleport(PlayerTeleport { id, ..p }),
            SyncPacket::PositionOrientation(p) => {
                SyncPacket::PositionOrientation(PositionOrientationUpdate { id, ..p })
            }
            SyncPacket::Position(p) => SyncPacket::Position(PositionUpdate { id, ..p }),
            SyncPacket::Orientation(p) => SyncPacket::Orientation(OrientationUpdate { id, ..p }),
        }
    }

    /// Encoded frame addressed to `viewer`'s own entity id; the wire id
    /// becomes [`SELF_ID`] when the viewer is the subject.
    pub fn encode_for(self, subject: u8, viewer: Option<u8>) -> Bytes {
        let packet = if viewer == Some(subject) {
            self.with_id(SELF_ID)
        } else {
            self
        };
        match packet {
            SyncPacket::Teleport(p) => p.encode(),
            SyncPacket::PositionOrientation(p) => p.encode(),
            SyncPacket::Position(p) => p.encode(),
            SyncPacket::Orientation(p) => p.encode(),
        }
    }
}

/// Classify the move from `last` to `now`. `None` means nothing changed.
pub fn classify(id: u8, last: &Location, now: &Location) -> Option<SyncPacket> {
    let position_dirty = !now.same_position(last);
    let rotation_dirty = !now.same_rotation(last);

    let (dx, dy, dz) = (now.x - last.x, now.y - last.y, now.z - last.z);
    let teleport = [dx, dy, dz].iter().any(|d| d.abs() > TELEPORT_THRESHOLD);

    let packet = if teleport {
        SyncPacket::Teleport(PlayerTeleport {
            id,
            pose: WirePose::from_location(now),
        })
    } else if position_dirty && rotation_dirty {
        SyncPacket::PositionOrientation(PositionOrientationUpdate {
            id,
            dx: to_delta(dx),
            dy: to_delta(dy),
            dz: to_delta(dz),
            yaw: to_angle(now.yaw),
            pitch: to_angle(now.pitch),
        })
    } else if position_dirty {
        SyncPacket::Position(PositionUpdate {
            id,
            dx: to_delta(dx),
            dy: to_delta(dy),
            dz: to_delta(dz),
        })
    } else if rotation_dirty {
        SyncPacket::Orientation(OrientationUpdate {
            id,
            yaw: to_angle(now.yaw),
            pitch: to_angle(now.pitch),
        })
    } else {
        return None;
    };
    Some(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64, z: f64) -> Location {
        Location::new(x, y, z, 0.0, 0.0)
    }

    #[test]
    fn large_jump_is_a_teleport() {
        let packet = classify(3, &at(0.0, 0.0, 0.0), &at(2.0, 0.0, 0.0));
        assert!(matches!(packet, Some(SyncPacket::Teleport(p)) if p.pose.x == 64 && p.id == 3));
    }

    #[test]
    fn exactly_one_unit_still_uses_a_delta() {
        let packet = classify(3, &at(0.0, 0.0, 0.0), &at(0.0, -1.0, 0.0));
        assert!(matches!(packet, Some(SyncPacket::Position(p)) if p.dy == -32));
    }

    #[test]
    fn small_step_is_position_only() {
        let packet = classify(3, &at(0.0, 0.0, 0.0), &at(0.5, 0.0, 0.0));
        assert_eq!(
            packet,
            Some(SyncPacket::Position(PositionUpdate {
                id: 3,
                dx: 16,
                dy: 0,
                dz: 0
            }))
        );
    }

    #[test]
    fn turning_in_place_is_orientation_only() {
        let last = at(5.0, 5.0, 5.0);
        let now = Location { yaw: 90.0, ..last };
        assert_eq!(
            classify(3, &last, &now),
            Some(SyncPacket::Orientation(OrientationUpdate {
                id: 3,
                yaw: 64,
                pitch: 0
            }))
        );
    }

    #[test]
    fn step_and_turn_is_combined() {
        let last = at(0.0, 0.0, 0.0);
        let now = Location::new(0.25, 0.0, -0.25, 180.0, 0.0);
        assert!(matches!(
            classify(3, &last, &now),
            Some(SyncPacket::PositionOrientation(p)) if p.dx == 8 && p.dz == -8 && p.yaw == 128
        ));
    }

    #[test]
    fn no_movement_no_packet() {
        let loc = Location::new(1.0, 2.0, 3.0, 45.0, 10.0);
        assert_eq!(classify(3, &loc, &loc), None);
    }

    #[test]
    fn viewer_sees_itself_as_self_id() {
        let packet = classify(3, &at(0.0, 0.0, 0.0), &at(0.5, 0.0, 0.0)).unwrap();
        assert_eq!(packet.encode_for(3, Some(3))[1], SELF_ID);
        assert_eq!(packet.encode_for(3, Some(4))[1], 3);
        assert_eq!(packet.encode_for(3, None)[1], 3);
    }
}
