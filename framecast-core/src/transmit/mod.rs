//! Frame transfer between nodes.
//!
//! - [`packet`]: transmit and ready packets
//! - [`codec`]: `tokio_util` framing with a blake3 checksum
//! - [`link`]: bandwidth tracking and the compression decision
//! - [`sender`]: producer side, images then ready commit
//! - [`receiver`]: consumer side, packets onto a [`FrameData`](crate::FrameData)

pub mod codec;
pub mod link;
pub mod packet;
pub mod receiver;
pub mod sender;

pub use codec::FrameCodec;
pub use link::LinkEstimator;
pub use packet::{FramePacket, ReadyPacket, TransmitPacket};
pub use receiver::FrameReceiver;
pub use sender::FrameSender;
