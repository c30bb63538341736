pub mod hello_kubernetes;
pub mod hello_world;

pub mod util;
