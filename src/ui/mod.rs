//! Terminal front end: application loop, input composer, transcript view,
//! slash commands.

pub mod app;
pub mod commands;
pub mod composer;
pub mod history;

pub use app::App;
