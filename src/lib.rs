// Core layer - errors and state
pub mod error;
pub mod state;

// Command model and its JSON front end
pub mod commands;
pub mod hooks;
pub mod loader;
pub mod resolver;

// Application layer
pub mod bot;
pub mod config;
pub mod runtime;
pub mod transport;

pub use bot::Bot;
pub use commands::{ClassTag, Command, CommandContext, CommandKind, Listener, Step};
pub use config::BotSettings;
pub use error::{BotError, BotResult};
pub use hooks::StateHooks;
pub use loader::{load, load_file, load_str};
pub use resolver::{ClassAliasTable, Environment};
pub use runtime::{Phase, Runtime};
pub use state::StateStore;
pub use transport::{ChatEvent, Connection, TransportKind};
