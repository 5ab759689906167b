//! IRC protocol layer: framing, buffering, dispatch and reply correlation
//! over one transport.

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod correlator;
pub mod ctcp;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod event;
pub mod framer;
pub mod session;
pub mod transport;

pub use connection::{Connection, Wire};
pub use correlator::{ExpectOptions, Reply};
pub use errors::ErrorKind;
pub use event::{Event, Hostmask};
pub use session::{ChannelState, LuserStat, MemberModes, SessionState};
