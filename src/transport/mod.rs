//! Wire transports: the HTTP gateway and the stdio bridge.

pub mod gateway;
pub mod stdio;
