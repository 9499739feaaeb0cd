pub mod req;
pub mod wire;
