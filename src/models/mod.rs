pub mod api;
pub mod coordinate;
pub mod job;
