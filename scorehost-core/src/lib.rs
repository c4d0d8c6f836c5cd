//! Core of the scoring server: HTTP primitives and the adapter that sits
//! between them and a user-authored scoring script.
//!
//! Per request: [`binding`] picks how the request becomes `run()`
//! arguments, [`input`] parses it, [`invoke`] calls `run()` under a
//! deadline, and [`response`] shapes the result.

pub mod application;
pub mod binding;
pub mod diagnostics;
pub mod error;
pub mod headers;
pub mod http;
pub mod input;
pub mod invoke;
pub mod response;
pub mod routing;
pub mod script;
pub mod status;

pub use application::*;
pub use error::*;
pub use headers::HeaderMap;
pub use http::*;
pub use routing::{HttpMethod, Route, Router};
pub use status::*;

#[doc(hidden)]
pub use inventory;
