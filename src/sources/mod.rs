//! Auxiliary data sources shown alongside the transport widgets. Each module
//! owns its upstream payload shape and the view the board renders from it.

pub mod news;
pub mod races;
pub mod roadworks;
pub mod velib;
pub mod weather;
