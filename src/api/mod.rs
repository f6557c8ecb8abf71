//! HTTP surface: the Tool Server router plus shared middleware.

pub mod health;
pub mod request_id;
pub mod server;

pub use server::router;
