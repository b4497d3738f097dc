// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod sql_classifier;
pub mod db;
pub mod pool_manager;

pub use db::PgPoolBackend;
pub use pool_manager::{Checkout, ConnectionPoolManager};
