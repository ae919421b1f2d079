pub mod controller;
pub mod round;
pub mod share;
