// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for submission guard attack simulation.
//!
//! This module provides utilities for driving abusive submission patterns
//! against the guard to validate its limits hold.

pub mod attacks;
pub mod generators;
pub mod metrics;
