//! # RLCF Store
//!
//! Persistence for the Reinforcement-Learning-from-Community-Feedback
//! workflow: users with their credentials and reputation components, tasks,
//! generated responses and the feedback evaluators submit on them.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`models`] | Persisted entities and the task lifecycle |
//! | [`schema`] | Per-task-type feedback field registry |
//! | [`Storage`] | Sled-backed implementation of the store traits |
//! | [`FeedbackStore`] / [`UserStore`] | Handles injected into the aggregation and authority layers |
//!
//! ## Boundary Validation
//!
//! Everything entering the store is checked once, here: quality scores and
//! authority snapshots must lie in `[0, 1]`, credentials must carry a
//! non-negative weight, and feedback payloads must match the schema of their
//! task type. Code downstream treats stored records as well formed.
//!
//! ## Usage
//!
//! ```rust
//! use rlcf_store::{NewUser, Storage, UserStore};
//!
//! let storage = Storage::temporary().unwrap();
//! let user = storage.create_user(NewUser::new("grace")).unwrap();
//! assert_eq!(storage.get_user(user.id).unwrap().unwrap().username, "grace");
//! ```

pub mod error;
pub mod models;
pub mod schema;
pub mod storage;
mod traits;

pub use error::{Result, StoreError};
pub use models::{
    Credential, CredentialLevel, Feedback, NewFeedback, Payload, Response, Task, TaskStatus,
    TaskType, User,
};
pub use schema::{validate_feedback, FeedbackSchema};
pub use storage::{NewUser, Storage, StoreStats};
pub use traits::{FeedbackStore, UserStore};
