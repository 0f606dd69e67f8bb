pub mod agent;
pub mod compiler;
pub mod config;
pub mod console;
pub mod exploit;
pub mod metrics;
pub mod overlay;
pub mod scene;
/// Line-oriented directive grammar shared by the compiler and the agent.
pub mod script;
pub mod transport;
