//! Management HTTP API: routes, handlers, DTOs and middleware.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
