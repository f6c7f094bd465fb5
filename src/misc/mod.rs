pub mod pos;
mod settings;

pub use settings::Settings;
