// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Query API Module
//!
//! POST /query/ answers a question from the knowledge base.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::query_handler;
pub use request::QueryRequest;
pub use response::QueryResponse;
