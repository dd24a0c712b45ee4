//! Interactive music sequencing engine.
//!
//! An [`Engine`] plays up to eight music resources at once, sharing a pool of
//! parts (synthesizer channels) between them by priority. Game scripts steer
//! playback through [`Engine::do_command`]; sounds can jump, loop, fade and
//! fire queued commands when they reach markers in their data. Sound output
//! is left to a [`Driver`] implementation.

pub mod config;
pub use config::EngineConfig;

pub mod driver;
pub use driver::{ActiveNotes, ChangeFlags, Driver, SoundSource};

pub mod engine;
pub use engine::{Engine, Part, Player};

pub mod save;
pub use save::{SaveReader, SaveWriter, Serializer};

mod shared;
pub use shared::SharedEngine;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("sound {0} is not loaded")]
    SoundNotFound(u16),
    #[error("track {0} does not exist")]
    TrackNotFound(u16),
    #[error(transparent)]
    Resource(#[from] imres::ResError),
    #[error(transparent)]
    Stream(#[from] imevent::EventError),

    #[error("player is not active")]
    NotActive,
    #[error("position lies past the end of the track")]
    PastEnd,
    #[error("invalid argument {0}")]
    InvalidArgument(i32),
    #[error("command queue is full")]
    QueueFull,
    #[error("unknown command {0}")]
    UnknownCommand(i32),

    #[error("not an engine save")]
    BadMagic,
    #[error("unsupported save version {0}")]
    UnsupportedVersion(u32),
    #[error("save data ends early")]
    SaveTruncated,
    #[error("corrupt save data: {0}")]
    CorruptSave(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
