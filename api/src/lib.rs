#[macro_use]
extern crate enum_primitive_derive;
extern crate num_traits;
extern crate serde;

pub static API_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bytes;
pub mod config;
pub mod dissectors;
pub mod packet;
pub mod sink;
