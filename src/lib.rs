//! Live feedback display for a 5DT sensor glove used in rehabilitation.
//!
//! A native bridge process streams gesture ids and scaled sensor values as
//! text lines. [`bridge`] reads them on a background thread, [`protocol`]
//! decodes them, [`session`] applies them in order to the display state and
//! the [`amplitude`] tracker, and [`app`] draws the result.

pub mod amplitude;
pub mod app;
pub mod bridge;
pub mod config;
pub mod gestures;
pub mod protocol;
pub mod session;
