//! Reflect notes API

mod client;
mod types;

pub use client::{DEFAULT_USER_AGENT, ReflectClient};
pub use types::{
    DailyNoteAppend, NewLink, NewNote, ReflectBook, ReflectBookNote, ReflectGraph, ReflectLink,
    ReflectSuccess, ReflectUser,
};
