//! Shared types for Turnhall.
//!
//! This crate defines the vocabulary the other layers speak:
//!
//! - **Identity and game state** ([`UserId`], [`RoomId`], [`Color`],
//!   [`GameStatus`], [`Resolution`]) — small copyable types with a fixed
//!   JSON shape.
//! - **Actions and events** ([`ClientAction`], [`RoomEvent`]) — what a
//!   connection sends in and what the room fans out.
//! - **Snapshot DTOs** ([`RoomDto`], [`MemberDto`], [`GameStateDto`],
//!   [`TimerState`]) — immutable views suitable for transmission.
//!
//! It knows nothing about connections, timers, or rooms — only shapes.

mod dto;
mod events;
mod types;

pub use dto::{GameRules, GameStateDto, MemberDto, RoomDto};
pub use events::{ClientAction, RoomEvent};
pub use types::{Color, GameStatus, Recipient, Resolution, RoomId, TimerState, User, UserId};
