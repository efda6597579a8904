// Backend module - Vulkan bootstrap layer
//
// Design: Thin wrapper around ash, one file per step of the sequence

pub mod debug;
pub mod instance;
pub mod physical;
