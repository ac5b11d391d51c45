//! Tool router integration
//!
//! Session creation, JSON-RPC over event streams, tool discovery and
//! single-tool REST execution.

pub mod execute;
mod models;
pub mod resolver;
pub mod rpc;
pub mod session;
pub mod stream;

pub use execute::{RestToolExecutor, ToolExecutor};
pub use models::*;
pub use resolver::{parse_discovery, ToolResolver, TOOLS_CALL};
pub use rpc::{drain_frames, RpcCaller, StreamingRpcClient};
pub use session::{SessionManager, SessionProvider};
pub use stream::{classify_event, EventDecoder, FrameStream, SseEvent, TERMINAL_MARKER};
