// Domain layer: the conversion record, artifact descriptions and ports (interfaces).

pub mod model;
pub mod ports;
