// wsload-api: JSON-RPC subscription wire format and WebSocket transport.

pub mod error;
pub mod frame;
pub mod rpc;
pub mod transport;

pub use error::Error;
pub use frame::Frame;
pub use rpc::{RpcResponse, SubscribeRequest, SubscriptionKind};
pub use transport::{DialTarget, Dialer, FrameStream, WsDialer, WsStream};
