pub mod actions;
pub mod globals;
pub mod telemetry;

pub mod commands;
pub mod dispatch;

mod console;
mod start;
pub use self::start::start;
