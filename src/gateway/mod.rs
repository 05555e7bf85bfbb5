//! Gateway module - Service registry, liveness probing, forwarding and dispatch

pub mod dispatcher;
pub mod forwarder;
pub mod health_check;
pub mod registry;
