pub mod energy;
pub mod levels;
pub mod rr;
pub mod static_threshold;
