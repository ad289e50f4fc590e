// Copyright 2026 Prodex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prodex — product extraction pipeline.
//!
//! Turns one e-commerce product URL (or pasted page source) into one
//! normalized [`record::ProductRecord`], or a well-defined escalation
//! signal. The decision flow lives in [`pipeline::Orchestrator`].

pub mod browser;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod record;
