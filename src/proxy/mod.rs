//! Request handling and upstream forwarding.

pub mod forwarder;
pub mod handler;
pub mod http_client;
pub mod server;

pub use forwarder::ReverseProxy;
pub use handler::RequestHandler;
pub use server::GatewayServer;
