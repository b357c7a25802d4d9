// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device backends.
//!
//! The software backend is always available.  The wgpu backend is built with the
//! `backend_wgpu` feature.

pub mod software;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;
