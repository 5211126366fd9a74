//! Core engine: the scan → detect → notify loop and its alert cooldowns.

pub mod cooldown;
pub mod scanner;
