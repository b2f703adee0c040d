// Server module
// Listener setup, the accept loop and per-connection serving

pub mod connection;
pub mod listener;
pub mod server_loop;
pub mod signal;

pub use listener::create_listener;
pub use server_loop::start_server_loop;
pub use signal::shutdown_signal;
