// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session Auth - Token Lifecycle & Cross-Tab Session Service
//!
//! Password and Google login backed by stateless access/refresh tokens, plus
//! the client-side coordinator that keeps every tab of a browser on one
//! session.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, credential checks, issuance and role extractors
//! - `client` - Refresh coordinator and cross-tab sync
//! - `config` - Environment-driven settings
//! - `store` - Credential store

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
