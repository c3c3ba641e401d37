// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod query;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_app, start_server, AppState};
pub use query::{query_handler, QueryRequest, QueryResponse};
