pub mod cache;
pub mod generation;
pub mod history;
pub mod queue;
pub mod settings;
