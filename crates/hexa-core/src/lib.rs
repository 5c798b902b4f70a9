//! Core hexa library (session gate, action wrapper, backend client, screens).

pub mod action;
pub mod backend;
pub mod config;
pub mod gate;
pub mod interrupt;
pub mod logging;
pub mod navigation;
pub mod notice;
pub mod profile;
pub mod push;
pub mod screens;
