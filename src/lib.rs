// Library entrypoint for integration tests and internal reuse.
pub mod bot;
pub mod config;
pub mod crawler;
pub mod error;
pub mod jobs;
pub mod report;
pub mod sheet;
pub mod state;
pub mod storage;
pub mod telegram;
