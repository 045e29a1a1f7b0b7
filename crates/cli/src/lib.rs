//! mbvault CLI library - exports modules for testing

pub mod cmd;
pub mod hooks;
pub mod locks;
pub mod logging;
pub mod system_config;
pub mod tool;
pub mod util;
pub mod workflow;
