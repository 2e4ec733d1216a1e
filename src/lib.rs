#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod fetcher;
pub mod namer;
pub mod proxy_gate;
pub mod run_log;
pub mod runner;
pub mod selector;
pub mod types;
pub mod utils;
