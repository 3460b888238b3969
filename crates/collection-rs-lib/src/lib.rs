pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::Config;

pub mod manifest;
pub use manifest::Manifest;
pub use manifest::Package;

pub mod instance;
pub use instance::HostInstance;

pub mod installation;
pub mod ordering;
pub mod emitter;
pub mod easy_installer;
