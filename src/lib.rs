//! keybroker - AI analysis request broker
//!
//! Sits between browser callers and a generative model API. The model
//! credential stays in this process; callers get validated, rate limited
//! and normalized access through `POST /api/ai/analyze`.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod upstream;
pub mod validation;
