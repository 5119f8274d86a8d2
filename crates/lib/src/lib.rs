//! Parley core library: a provider-agnostic conversation engine, its channels,
//! and the intake survey built on it. Used by the `parley` CLI.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod init;
pub mod store;
pub mod survey;
