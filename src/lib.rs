// Library surface for headless/integration tests and reuse.
// The binary in main.rs only adds CLI parsing and terminal setup.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod feedback;
pub mod game;
pub mod ranking;
pub mod runtime;
pub mod store;
pub mod timer;
pub mod ui;
