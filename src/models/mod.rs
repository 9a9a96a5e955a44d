pub mod api;
pub mod power;
pub mod site;
pub mod weather;
