//! Message identifiers
//!
//! The first byte of every packet. Values below [`MessageId::USER_PACKET_ENUM`]
//! belong to the transport library; application identifiers are allocated in
//! contiguous blocks above it so they can never collide with the library's own.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u8);

impl MessageId {
    // Transport range
    pub const CONNECTION_REQUEST: Self = Self(9);
    pub const CONNECTION_REQUEST_ACCEPTED: Self = Self(16);
    pub const CONNECTION_ATTEMPT_FAILED: Self = Self(17);
    pub const NEW_INCOMING_CONNECTION: Self = Self(19);
    pub const NO_FREE_INCOMING_CONNECTIONS: Self = Self(20);
    pub const DISCONNECTION_NOTIFICATION: Self = Self(21);
    pub const CONNECTION_LOST: Self = Self(22);
    pub const TIMESTAMP: Self = Self(27);
    pub const USER_PACKET_ENUM: Self = Self(134);

    // Common block
    pub const COMMON_BEGIN: Self = Self::USER_PACKET_ENUM;
    pub const SPATIAL_DATA_RECEIVE: Self = Self(Self::COMMON_BEGIN.0 + 1);
    pub const SPATIAL_DATA_SEND: Self = Self(Self::COMMON_BEGIN.0 + 2);
    pub const COMMON_END: Self = Self(Self::COMMON_BEGIN.0 + 3);

    // Server block
    pub const SERVER_BEGIN: Self = Self::COMMON_END;
    pub const CLIENT_MASTER_CONNECT: Self = Self(Self::SERVER_BEGIN.0 + 1);
    pub const CLIENT_SERVER_CONNECT: Self = Self(Self::SERVER_BEGIN.0 + 2);
    pub const CLIENT_SERVER_DISCONNECT: Self = Self(Self::SERVER_BEGIN.0 + 3);
    pub const SERVER_END: Self = Self(Self::SERVER_BEGIN.0 + 4);

    /// True for identifiers every role understands.
    pub fn is_common(self) -> bool {
        self >= Self::COMMON_BEGIN && self < Self::COMMON_END
    }

    /// True for identifiers only server and master roles act on.
    pub fn is_server(self) -> bool {
        self > Self::SERVER_BEGIN && self < Self::SERVER_END
    }

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::CONNECTION_REQUEST => "CONNECTION_REQUEST",
            Self::CONNECTION_REQUEST_ACCEPTED => "CONNECTION_REQUEST_ACCEPTED",
            Self::CONNECTION_ATTEMPT_FAILED => "CONNECTION_ATTEMPT_FAILED",
            Self::NEW_INCOMING_CONNECTION => "NEW_INCOMING_CONNECTION",
            Self::NO_FREE_INCOMING_CONNECTIONS => "NO_FREE_INCOMING_CONNECTIONS",
            Self::DISCONNECTION_NOTIFICATION => "DISCONNECTION_NOTIFICATION",
            Self::CONNECTION_LOST => "CONNECTION_LOST",
            Self::TIMESTAMP => "TIMESTAMP",
            Self::COMMON_BEGIN => "COMMON_BEGIN",
            Self::SPATIAL_DATA_RECEIVE => "SPATIAL_DATA_RECEIVE",
            Self::SPATIAL_DATA_SEND => "SPATIAL_DATA_SEND",
            Self::SERVER_BEGIN => "SERVER_BEGIN",
            Self::CLIENT_MASTER_CONNECT => "CLIENT_MASTER_CONNECT",
            Self::CLIENT_SERVER_CONNECT => "CLIENT_SERVER_CONNECT",
            Self::CLIENT_SERVER_DISCONNECT => "CLIENT_SERVER_DISCONNECT",
            Self::SERVER_END => "SERVER_END",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_block_follows_reserved_base() {
        assert_eq!(MessageId::COMMON_BEGIN, MessageId::USER_PACKET_ENUM);
        assert_eq!(MessageId::SPATIAL_DATA_RECEIVE.0, 135);
        assert_eq!(MessageId::SPATIAL_DATA_SEND.0, 136);
        assert_eq!(MessageId::COMMON_END.0, 137);
    }

    #[test]
    fn test_server_block_is_contiguous_with_common() {
        assert_eq!(MessageId::SERVER_BEGIN, MessageId::COMMON_END);
        assert_eq!(MessageId::CLIENT_MASTER_CONNECT.0, 138);
        assert_eq!(MessageId::CLIENT_SERVER_CONNECT.0, 139);
        assert_eq!(MessageId::CLIENT_SERVER_DISCONNECT.0, 140);
        assert_eq!(MessageId::SERVER_END.0, 141);
    }

    #[test]
    fn test_range_classification() {
        assert!(MessageId::COMMON_BEGIN.is_common());
        assert!(MessageId::SPATIAL_DATA_SEND.is_common());
        assert!(!MessageId::COMMON_END.is_common());
        assert!(!MessageId::TIMESTAMP.is_common());

        assert!(MessageId::CLIENT_MASTER_CONNECT.is_server());
        assert!(MessageId::CLIENT_SERVER_DISCONNECT.is_server());
        assert!(!MessageId::SERVER_BEGIN.is_server());
        assert!(!MessageId::SERVER_END.is_server());
        assert!(!MessageId::SPATIAL_DATA_RECEIVE.is_server());
    }

    #[test]
    fn test_transport_range_stays_below_user_base() {
        let transport_ids = [
            MessageId::CONNECTION_REQUEST,
            MessageId::CONNECTION_REQUEST_ACCEPTED,
            MessageId::NEW_INCOMING_CONNECTION,
            MessageId::NO_FREE_INCOMING_CONNECTIONS,
            MessageId::DISCONNECTION_NOTIFICATION,
            MessageId::CONNECTION_LOST,
            MessageId::TIMESTAMP,
        ];
        for id in transport_ids {
            assert!(id < MessageId::USER_PACKET_ENUM, "{} collides", id);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageId::CLIENT_MASTER_CONNECT.to_string(), "CLIENT_MASTER_CONNECT");
        assert_eq!(MessageId(250).to_string(), "#250");
    }
}
