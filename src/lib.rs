//! A client for driving Lavalink nodes on behalf of many guilds.
//!
//! The [`AudioManager`] owns a set of [`Node`] connections and at most one
//! [`AudioPlayer`] per guild. Voice channel joins are sent through the host's
//! gateway via an [`EventHandler`], and the gateway's voice server updates are
//! handed back to the manager with [`AudioManager::handle_gateway_event`] so
//! they can be relayed to the right node.
//!
//! [`AudioManager`]: struct.AudioManager.html
//! [`AudioManager::handle_gateway_event`]: struct.AudioManager.html#method.handle_gateway_event
//! [`AudioPlayer`]: player/struct.AudioPlayer.html
//! [`EventHandler`]: trait.EventHandler.html
//! [`Node`]: nodes/struct.Node.html

#[macro_use] extern crate log;

pub mod model;
pub mod nodes;
pub mod player;
pub mod track;

mod error;
mod event_handler;
mod listeners;
mod manager;
mod rest;

#[cfg(test)]
mod test_utils;

pub use self::error::Error;
pub use self::event_handler::EventHandler;
pub use self::manager::{AudioManager, ManagerConfig};
