//! Store access traits.
//!
//! The aggregation and authority components take a store handle through these
//! traits instead of reaching for a process-wide connection, so tests can hand
//! in a double and production code a [`Storage`](crate::Storage).

use crate::error::Result;
use crate::models::{Feedback, Task, User};

/// Read access to tasks and their feedback sets.
pub trait FeedbackStore {
    /// Looks up a task by id.
    fn get_task(&self, task_id: u64) -> Result<Option<Task>>;

    /// Returns every feedback entry on every response of the task.
    ///
    /// Implementations must return a consistent snapshot ordered by
    /// feedback id.
    fn get_feedback_for_task(&self, task_id: u64) -> Result<Vec<Feedback>>;
}

/// Read and serialized write access to users.
pub trait UserStore {
    /// Looks up a user by id.
    fn get_user(&self, user_id: u64) -> Result<Option<User>>;

    /// Applies `update` to the stored user and persists the result.
    ///
    /// `update` may be invoked more than once if a concurrent writer wins
    /// the race; it must be a pure function of its input. Returns `None`
    /// when the user does not exist.
    fn update_user<F>(&self, user_id: u64, update: F) -> Result<Option<User>>
    where
        F: FnMut(&User) -> Result<User>;
}

impl<T: FeedbackStore + ?Sized> FeedbackStore for &T {
    fn get_task(&self, task_id: u64) -> Result<Option<Task>> {
        (**self).get_task(task_id)
    }

    fn get_feedback_for_task(&self, task_id: u64) -> Result<Vec<Feedback>> {
        (**self).get_feedback_for_task(task_id)
    }
}

impl<T: UserStore> UserStore for &T {
    fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        (**self).get_user(user_id)
    }

    fn update_user<F>(&self, user_id: u64, update: F) -> Result<Option<User>>
    where
        F: FnMut(&User) -> Result<User>,
    {
        (**self).update_user(user_id, update)
    }
}
