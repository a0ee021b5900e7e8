/// Remoting link - one endpoint of a host/client connection, broken into
/// its outbound, inbound and statistics parts
mod core;
mod inbound;
pub(crate) mod outbound;
pub(crate) mod stats;

pub use self::core::RemotingLink;
pub use stats::LinkStats;
