pub mod channel;
pub mod sockets;
