mod command;
mod state;
pub mod world;

pub use command::WorldCommand;
pub use state::World;
