mod server;

pub use server::{BootstrapAdmin, ServerConfig};
