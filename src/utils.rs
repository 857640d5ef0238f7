pub mod ai;
pub mod helpers;
