pub mod command;
pub mod foundry;

pub use command::CommandBackend;
pub use foundry::FoundryBackend;
