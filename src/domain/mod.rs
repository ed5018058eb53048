// Domain layer: core models and ports (interfaces). No I/O beyond the traits declared here.

pub mod model;
pub mod ports;
