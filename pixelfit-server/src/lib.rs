//! # pixelfit-server — HTTP facade for PixelFit
//!
//! Serves the JSON API the front-end syncs against and the front-end's
//! static files, on top of `pixelfit-core`.
//!
//! ```text
//! ┌──────────────┐   JSON    ┌──────────────────────────┐
//! │  front-end   │ ────────► │  routes (axum)           │
//! │  (browser)   │ ◄──────── │   ├─ /api/*   ─► Store   │
//! └──────────────┘  static   │   └─ /*       ─► ServeDir│
//!                            └────────────┬─────────────┘
//!                                         ▼
//!                              pixelfit-core (decay, pet, SQLite)
//! ```
//!
//! ## Modules
//!
//! - `routes` — router, shared state, handlers, error mapping
//! - `telemetry` — tracing subscriber set-up

pub mod routes;
pub mod telemetry;

pub use routes::{build_router, AppState};
