//! WebSocket signaling relay for two-party WebRTC negotiation

mod actor;
mod messages;
mod registry;
mod server;
mod types;

pub use actor::{MembershipGuard, RoomManagerHandle};
pub use messages::{ClientMessage, ServerMessage};
pub use registry::{JoinOutcome, RoomRegistry};
pub use server::SignalingServer;
pub use types::{ConnectionId, OutboundMessage, RelayError, RoomId};
