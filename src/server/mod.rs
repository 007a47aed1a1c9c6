mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::csrf_guard;
pub use state::AppState;
