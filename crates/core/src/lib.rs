#![forbid(unsafe_code)]

pub mod mastery;
pub mod model;
pub mod plan;
pub mod time;

pub use time::Clock;
