//! triggerd - Input trigger recognition engine
//!
//! triggerd sits between the input devices and the environment that
//! consumes their events. Every raw event is offered to the engine, which
//! recognizes gestures and shortcuts and answers whether the event should
//! be blocked:
//!
//! - **Keyboard shortcuts** started by a modifier
//! - **Mouse** clicks, presses, wheel and swipe/stroke gestures while a
//!   button is held
//! - **Touchpad** taps, clicks, presses, swipes, pinches and rotations,
//!   with individual contacts read from the evdev node
//! - **Touchscreen** taps, presses, swipes, pinches and rotations
//!
//! # Architecture
//!
//! - [`backend`]: device registry and event routing, plus the libinput and
//!   evdev entry points
//! - [`handlers`]: per-device-class recognizers and the trigger lifecycle
//! - [`trigger`]: trigger definitions, directions and strokes
//! - [`action`]: side effects bound to a trigger's lifecycle
//! - [`config`]: settings file with device rules and motion tuning
//! - [`replay`]: scripted replay of recorded events

#![warn(rust_2018_idioms)]

pub mod action;
pub mod backend;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod handlers;
pub mod input;
pub mod replay;
pub mod timer;
pub mod trigger;
pub mod variables;

pub use backend::{InputBackend, LibinputBackend};
pub use error::{TriggerError, TriggerResult};
