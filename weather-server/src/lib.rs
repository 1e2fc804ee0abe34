//! HTTP surface for the Seniverse weather service.
//!
//! - `GET /` serves the front end
//! - `GET /sse` streams `weather.update` events
//! - `POST /messages` dispatches `{ method, params }` calls

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod subscription;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use subscription::{SubscriptionRegistry, SubscriptionState};
