//! Appender implementations

pub mod console;
pub mod layout;
pub mod rotating_file;
pub mod rotation_manager;

pub use console::ConsoleAppender;
pub use layout::{BackupFile, FileLayout};
pub use rotating_file::{RotatingFileAppender, RotationPolicy};
pub use rotation_manager::{DestinationWriter, RotationManager};

pub use crate::core::Appender;
