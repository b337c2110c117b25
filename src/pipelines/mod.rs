// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │ PNG data URL │
//! │  (RGBA)      │     │  - Center crop    │     │  224x224     │
//! │              │     │  - Scale          │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │  Image File  │ ──▶ │  Photo Pipeline   │ ──▶ │ JPEG data URL│
//! │              │     │  - Bound size     │     │  ≤ 1024 px   │
//! │              │     │  - Compress       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! Decoding and encoding run off the async runtime so the preview keeps
//! updating while a file is processed.

pub mod photo;
