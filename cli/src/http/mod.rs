pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream;

pub use state::AppState;
