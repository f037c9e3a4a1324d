//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing with status and latency)
//! 3. Static security headers
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Auth extractors in each handler ([`RequireStaff`], [`RequireAdmin`])

pub mod auth;
pub mod flash;
pub mod session;

pub use auth::{RequireAdmin, RequireStaff, clear_current_staff, set_current_staff};
pub use flash::{push_flash, take_flash};
pub use session::create_session_layer;
