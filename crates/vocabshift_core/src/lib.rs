pub mod backup;
pub mod config;
pub mod credentials;
pub mod journal;
pub mod migrate;
pub mod profile;
pub mod report;
pub mod rules;
pub mod runtime;
pub mod verify;
pub mod walk;
