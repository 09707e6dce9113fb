//! Cron-like triggers for sets and runs

pub mod action;
pub mod runner;
pub mod schedule;

pub use action::{CustomSlide, GenerateSetAction, JobAction, SlideSource};
pub use runner::{CronRunner, TickReport};
pub use schedule::Schedule;
