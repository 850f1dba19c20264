// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Reporting helpers for the helmshell binary

pub mod progress;
pub mod reporter;

pub use progress::{stage_bar, stage_callback};
pub use reporter::Reporter;
