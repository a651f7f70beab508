// SPDX-License-Identifier: BUSL-1.1
//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area; routers
//! are assembled in `lib.rs` into the application.

pub mod actions;
