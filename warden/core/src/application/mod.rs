// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod sql_governance;
pub mod tool_governance;
pub mod policy;
pub mod query_service;

pub use policy::{authorize, AuthorizationRequest, Authorized, PolicyEngine};
pub use query_service::{QueryError, QueryOutcome, QueryService};
