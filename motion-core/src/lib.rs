//! # MotionEdit Core
//!
//! Deterministic editing logic for Lottie animation documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 motion-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Validator         │  Classifier            │
//! │  - Fence stripping │  - Keyword priority    │
//! │  - Shape check     │  - Parameter capture   │
//! ├─────────────────────────────────────────────┤
//! │  Heuristic Operations                       │
//! │  - Delete by text  - Recolor                │
//! │  - Replace token   - Scale up               │
//! ├─────────────────────────────────────────────┤
//! │  Tree Walker (mapping / sequence / scalar)  │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classifier;
pub mod document;
pub mod error;
pub mod heuristic;
pub mod validator;
pub mod walker;

pub use classifier::{classify, HeuristicConfig};
pub use document::AnimationDocument;
pub use error::{CoreError, CoreResult, FailureKind};
pub use heuristic::{apply, HeuristicOperation, HeuristicReport};
pub use validator::validate;
pub use walker::{walk, Visit, VisitContext, Visitor, WalkStats};

/// Motion core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
