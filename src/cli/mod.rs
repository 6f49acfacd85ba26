pub mod config;
pub mod contacts;
pub mod history;
pub mod keywords;
pub mod listen;
pub mod output;
