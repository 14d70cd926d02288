//! Outbound ports: what the application needs from the outside world.

pub mod clock_port;
pub mod command_port;

pub use clock_port::ClockPort;
pub use command_port::{CommandSink, SendError};

#[cfg(any(test, feature = "testing"))]
pub use clock_port::MockClockPort;
#[cfg(any(test, feature = "testing"))]
pub use command_port::MockCommandSink;
