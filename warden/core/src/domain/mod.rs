// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure governance and pool types. Nothing in here performs I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Statement and tool vocabularies, profiles, resolved policy,
//!   pool settings and configuration manifest

pub mod statement;
pub mod tool;
pub mod governance;
pub mod policy;
pub mod pool;
pub mod warden_config;
