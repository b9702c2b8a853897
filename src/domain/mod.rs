// Domain layer: record shapes and the ports (store, converter) the core talks to.

pub mod model;
pub mod ports;
