#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod bridge;
mod script;
mod support;
