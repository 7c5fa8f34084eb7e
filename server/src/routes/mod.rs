pub mod api;
pub mod route;
