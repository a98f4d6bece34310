//! # Void Commit - VDOM Commit Phase
//!
//! Applies patch lists to live trees and coordinates user-visible effects
//! around the patch-application boundary.
//!
//! ## Architecture
//!
//! ```text
//! VdomRuntime::reconcile(live, next)
//!     ├── DiffingEngine::diff ──────────► [Patch]
//!     └── TreePatcher::apply
//!             ├── begin_commit
//!             ├── tree mutation + host bindings (per patch)
//!             ├── lifecycle effects queued
//!             └── end_commit ──► EffectScheduler flush (high → normal → idle)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use void_commit::prelude::*;
//!
//! let runtime = VdomRuntime::from_config(&RuntimeConfig::load("vdom.toml")?);
//! let report = runtime.reconcile(&mut live_tree, &next_tree)?;
//! ```

pub mod config;
pub mod lifecycle;
pub mod patcher;
pub mod runtime;
pub mod scheduler;

pub use config::{ConfigError, ConfigResult, RuntimeConfig};
pub use lifecycle::{Component, ComponentFactory, ComponentLifecycle};
pub use patcher::{apply_patches, ApplyReport, TreePatcher};
pub use runtime::VdomRuntime;
pub use scheduler::{
    AsyncEffect, CommitGuard, Effect, EffectPriority, EffectResult, EffectScheduler,
    SchedulerStats,
};

pub mod prelude {
    pub use crate::{
        apply_patches, ApplyReport, Component, ComponentLifecycle, EffectPriority,
        EffectScheduler, RuntimeConfig, TreePatcher, VdomRuntime,
    };
}
