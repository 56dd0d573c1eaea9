//! Process-wide state shared across the serving pipeline.

mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};
