pub mod config;
pub mod diag;
pub mod download;
pub mod feed;
pub mod notify;
pub mod pick;
