pub mod booking;
pub mod completion;
pub mod geo;
pub mod location;
pub mod ranker;
pub mod workflow;
pub mod worklist;
