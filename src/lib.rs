// src/lib.rs
//! Internal transfer job search automation: credential handling, talent API
//! clients, job matching, hiring manager outreach and the informational
//! request pipeline.

/// Log through `tracing` at the given level, e.g. `app_log!(info, "x = {}", x)`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

pub mod auth;
pub mod cli;
pub mod core;
pub mod environment;
pub mod mail;
pub mod matching;
pub mod outreach;
pub mod pipeline;
pub mod talent;
