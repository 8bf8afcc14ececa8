#![allow(clippy::new_without_default)]

pub mod actor;
pub mod connection;
pub mod coordinator;
pub mod effect;
pub mod error;
pub mod lastfm;
pub mod message;
pub mod miniplayer;
pub mod player;
pub mod record;
pub mod scrobble;
pub mod service;
pub mod settings;
pub mod song;
pub mod storage;
pub mod version;
