pub mod app;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod hits;
pub mod http_store;
pub mod layout;
pub mod output;
pub mod progress;
pub mod retry;
pub mod search;
pub mod selection;
pub mod sequences;
pub mod store;
pub mod worker;
