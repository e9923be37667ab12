//! # Persistent Storage Layer
//!
//! Sled-backed persistence for users, tasks, responses and feedback.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `users` | user id | JSON [`User`] |
//! | `tasks` | task id | JSON [`Task`] |
//! | `responses` | response id | JSON [`Response`] |
//! | `feedback` | feedback id | JSON [`Feedback`] |
//! | `task_responses` | task id ++ response id | empty |
//! | `response_feedback` | response id ++ feedback id | empty |
//!
//! Ids are allocated with [`sled::Db::generate_id`] and stored big-endian,
//! so every tree iterates in creation order.
//!
//! ## Concurrency
//!
//! Read paths take no locks. Users and tasks are updated with
//! compare-and-swap against the previously read bytes; a lost race re-reads
//! and reapplies the update, so concurrent authority updates to the same
//! user never overwrite each other.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::models::{
    Credential, Feedback, NewFeedback, Payload, Response, Task, TaskStatus, TaskType, User,
};
use crate::schema::validate_feedback;
use crate::traits::{FeedbackStore, UserStore};

const USER_TREE: &str = "users";
const TASK_TREE: &str = "tasks";
const RESPONSE_TREE: &str = "responses";
const FEEDBACK_TREE: &str = "feedback";
const TASK_RESPONSE_INDEX: &str = "task_responses";
const RESPONSE_FEEDBACK_INDEX: &str = "response_feedback";

/// Compare-and-swap attempts before an update gives up with `Conflict`.
const MAX_UPDATE_ATTEMPTS: usize = 64;

/// A user as registered, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub username: String,
    /// Initial credentials.
    #[serde(default)]
    pub credentials: Vec<Credential>,
    /// Initial track record, `[0, 1]`.
    #[serde(default)]
    pub track_record_score: f64,
    /// Initial cached authority, `[0, 1]`.
    #[serde(default)]
    pub authority_score: f64,
}

impl NewUser {
    /// Creates a user registration with no credentials and zeroed scores.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credentials: Vec::new(),
            track_record_score: 0.0,
            authority_score: 0.0,
        }
    }

    /// Adds a credential.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Sets the initial cached authority.
    pub fn with_authority(mut self, authority: f64) -> Self {
        self.authority_score = authority;
        self
    }

    /// Sets the initial track record.
    pub fn with_track_record(mut self, track_record: f64) -> Self {
        self.track_record_score = track_record;
        self
    }
}

/// Record counts across all trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub users: usize,
    pub tasks: usize,
    pub responses: usize,
    pub feedback: usize,
}

/// Sled database holding all persisted RLCF state.
///
/// Cloning is cheap: clones share the same underlying database.
///
/// # Example
///
/// ```rust
/// use rlcf_store::{FeedbackStore, NewFeedback, NewUser, Storage, TaskType};
/// use serde_json::json;
///
/// let storage = Storage::temporary().unwrap();
/// let user = storage.create_user(NewUser::new("ada").with_authority(0.8)).unwrap();
/// let task = storage.create_task(TaskType::Nli, Default::default()).unwrap();
/// let response = storage.create_response(task.id, Default::default(), "m-1").unwrap();
///
/// let data = json!({ "chosen_label": "entail" }).as_object().cloned().unwrap();
/// storage.submit_feedback(NewFeedback::new(response.id, user.id, data)).unwrap();
///
/// assert_eq!(storage.get_feedback_for_task(task.id).unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    users: sled::Tree,
    tasks: sled::Tree,
    responses: sled::Tree,
    feedback: sled::Tree,
    task_responses: sled::Tree,
    response_feedback: sled::Tree,
}

impl Storage {
    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates an in-memory database that is discarded on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Storage {
            users: db.open_tree(USER_TREE)?,
            tasks: db.open_tree(TASK_TREE)?,
            responses: db.open_tree(RESPONSE_TREE)?,
            feedback: db.open_tree(FEEDBACK_TREE)?,
            task_responses: db.open_tree(TASK_RESPONSE_INDEX)?,
            response_feedback: db.open_tree(RESPONSE_FEEDBACK_INDEX)?,
            db,
        })
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    /// Registers a user.
    ///
    /// Credentials are stored as given; B_u and the blended A_u are left to
    /// the authority calculator's `recompute_baseline`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidInput` if a score or credential is out of
    /// range.
    pub fn create_user(&self, new_user: NewUser) -> Result<User> {
        check_unit("track_record_score", new_user.track_record_score)?;
        check_unit("authority_score", new_user.authority_score)?;
        for credential in &new_user.credentials {
            check_credential(credential)?;
        }

        let mut user = User::new(self.next_id()?, new_user.username);
        user.credentials = new_user.credentials;
        user.track_record_score = new_user.track_record_score;
        user.authority_score = new_user.authority_score;

        put(&self.users, user.id, &user)?;
        debug!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Appends a credential to a user.
    ///
    /// The cached baseline score is not recomputed here; that belongs to
    /// the authority calculator.
    pub fn add_credential(&self, user_id: u64, credential: Credential) -> Result<User> {
        check_credential(&credential)?;
        self.update_user(user_id, |user| {
            let mut next = user.clone();
            next.credentials.push(credential.clone());
            Ok(next)
        })?
        .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    // ---------------------------------------------------------------------
    // Tasks and responses
    // ---------------------------------------------------------------------

    /// Creates a task in the `OPEN` state.
    pub fn create_task(&self, task_type: TaskType, input_data: Payload) -> Result<Task> {
        let task = Task {
            id: self.next_id()?,
            task_type,
            input_data,
            status: TaskStatus::Open,
        };
        put(&self.tasks, task.id, &task)?;
        debug!(task_id = task.id, task_type = %task_type, "task created");
        Ok(task)
    }

    /// Moves a task to a new lifecycle state.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the task does not exist
    /// - `StoreError::InvalidTransition` if the lifecycle forbids the move
    #[instrument(skip(self))]
    pub fn set_task_status(&self, task_id: u64, status: TaskStatus) -> Result<Task> {
        let updated = update_record(&self.tasks, "task", task_id, |task: &Task| {
            if !task.status.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    task_id,
                    from: task.status.to_string(),
                    to: status.to_string(),
                });
            }
            let mut next = task.clone();
            next.status = status;
            Ok(next)
        })?
        .ok_or_else(|| StoreError::not_found("task", task_id))?;

        info!(task_id, status = %status, "task status updated");
        Ok(updated)
    }

    /// Lists all tasks in creation order.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(self.tasks.len());
        for entry in self.tasks.iter() {
            let (_, bytes) = entry?;
            tasks.push(serde_json::from_slice(&bytes)?);
        }
        Ok(tasks)
    }

    /// Stores a generated response for an existing task.
    pub fn create_response(
        &self,
        task_id: u64,
        output_data: Payload,
        model_version: impl Into<String>,
    ) -> Result<Response> {
        if !self.tasks.contains_key(key(task_id))? {
            return Err(StoreError::not_found("task", task_id));
        }

        let response = Response {
            id: self.next_id()?,
            task_id,
            output_data,
            model_version: model_version.into(),
        };

        // Record first, then index: a crash in between leaves an orphan
        // response that no task query can reach.
        put(&self.responses, response.id, &response)?;
        self.task_responses
            .insert(index_key(task_id, response.id), Vec::<u8>::new())?;
        Ok(response)
    }

    /// Looks up a response by id.
    pub fn get_response(&self, response_id: u64) -> Result<Option<Response>> {
        get(&self.responses, response_id)
    }

    // ---------------------------------------------------------------------
    // Feedback
    // ---------------------------------------------------------------------

    /// Validates and stores an evaluator's feedback.
    ///
    /// # Arguments
    ///
    /// * `new_feedback` - Payload, scores and optional authority snapshot
    ///
    /// # Returns
    ///
    /// The stored feedback with its assigned id.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rlcf_store::{NewFeedback, NewUser, Storage, TaskType};
    /// use serde_json::json;
    ///
    /// let storage = Storage::temporary().unwrap();
    /// let user = storage.create_user(NewUser::new("ada")).unwrap();
    /// let task = storage.create_task(TaskType::Nli, Default::default()).unwrap();
    /// let response = storage.create_response(task.id, Default::default(), "m1").unwrap();
    ///
    /// let data = json!({ "chosen_label": "neutral" }).as_object().cloned().unwrap();
    /// let feedback = storage
    ///     .submit_feedback(NewFeedback::new(response.id, user.id, data))
    ///     .unwrap();
    /// assert_eq!(feedback.user_id, user.id);
    /// ```
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the response, its task or the user is missing
    /// - `StoreError::InvalidInput` if a score is outside `[0, 1]` or the task
    ///   no longer accepts feedback
    /// - `StoreError::SchemaViolation` if the payload does not fit the task type
    #[instrument(skip(self, new_feedback), fields(response_id = new_feedback.response_id, user_id = new_feedback.user_id))]
    pub fn submit_feedback(&self, new_feedback: NewFeedback) -> Result<Feedback> {
        check_unit("accuracy_score", new_feedback.accuracy_score)?;
        check_unit("utility_score", new_feedback.utility_score)?;
        check_unit("transparency_score", new_feedback.transparency_score)?;
        if let Some(authority) = new_feedback.authority {
            check_unit("authority", authority)?;
        }

        let response = self
            .get_response(new_feedback.response_id)?
            .ok_or_else(|| StoreError::not_found("response", new_feedback.response_id))?;
        let task = self
            .get_task(response.task_id)?
            .ok_or_else(|| StoreError::not_found("task", response.task_id))?;
        if !self.users.contains_key(key(new_feedback.user_id))? {
            return Err(StoreError::not_found("user", new_feedback.user_id));
        }
        if !matches!(task.status, TaskStatus::Open | TaskStatus::BlindEvaluation) {
            return Err(StoreError::InvalidInput(format!(
                "task {} is {} and no longer accepts feedback",
                task.id, task.status
            )));
        }
        validate_feedback(task.task_type, &new_feedback.feedback_data)?;

        let feedback = Feedback {
            id: self.next_id()?,
            response_id: new_feedback.response_id,
            user_id: new_feedback.user_id,
            feedback_data: new_feedback.feedback_data,
            accuracy_score: new_feedback.accuracy_score,
            utility_score: new_feedback.utility_score,
            transparency_score: new_feedback.transparency_score,
            authority: new_feedback.authority,
        };

        put(&self.feedback, feedback.id, &feedback)?;
        self.response_feedback
            .insert(index_key(feedback.response_id, feedback.id), Vec::<u8>::new())?;

        debug!(feedback_id = feedback.id, task_id = task.id, "feedback stored");
        Ok(feedback)
    }

    fn response_ids(&self, task_id: u64) -> Result<Vec<u64>> {
        child_ids(&self.task_responses, task_id)
    }

    // ---------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------

    /// Returns record counts.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            users: self.users.len(),
            tasks: self.tasks.len(),
            responses: self.responses.len(),
            feedback: self.feedback.len(),
        }
    }

    /// Flushes pending writes to disk, returning the number of bytes written.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl FeedbackStore for Storage {
    fn get_task(&self, task_id: u64) -> Result<Option<Task>> {
        get(&self.tasks, task_id)
    }

    fn get_feedback_for_task(&self, task_id: u64) -> Result<Vec<Feedback>> {
        let mut feedback = Vec::new();
        for response_id in self.response_ids(task_id)? {
            for feedback_id in child_ids(&self.response_feedback, response_id)? {
                let entry: Feedback = get(&self.feedback, feedback_id)?.ok_or_else(|| {
                    StoreError::Corrupted(format!(
                        "index references missing feedback {}",
                        feedback_id
                    ))
                })?;
                feedback.push(entry);
            }
        }
        feedback.sort_by_key(|f| f.id);
        Ok(feedback)
    }
}

impl UserStore for Storage {
    fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        get(&self.users, user_id)
    }

    fn update_user<F>(&self, user_id: u64, mut update: F) -> Result<Option<User>>
    where
        F: FnMut(&User) -> Result<User>,
    {
        update_record(&self.users, "user", user_id, |user: &User| {
            let mut next = update(user)?;
            next.id = user.id;
            next.version = user.version + 1;
            Ok(next)
        })
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Storage")
            .field("users", &stats.users)
            .field("tasks", &stats.tasks)
            .field("feedback", &stats.feedback)
            .finish()
    }
}

fn key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn index_key(parent: u64, child: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&parent.to_be_bytes());
    out[8..].copy_from_slice(&child.to_be_bytes());
    out
}

fn child_ids(index: &sled::Tree, parent: u64) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in index.scan_prefix(key(parent)) {
        let (k, _) = entry?;
        let child: [u8; 8] = k
            .get(8..16)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| StoreError::Corrupted(format!("index key of length {}", k.len())))?;
        ids.push(u64::from_be_bytes(child));
    }
    Ok(ids)
}

fn get<T: DeserializeOwned>(tree: &sled::Tree, id: u64) -> Result<Option<T>> {
    match tree.get(key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put<T: Serialize>(tree: &sled::Tree, id: u64, value: &T) -> Result<()> {
    tree.insert(key(id), serde_json::to_vec(value)?)?;
    Ok(())
}

/// Read-modify-write with compare-and-swap, retrying on lost races.
fn update_record<T, F>(
    tree: &sled::Tree,
    entity: &'static str,
    id: u64,
    mut update: F,
) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&T) -> Result<T>,
{
    let k = key(id);
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let current_bytes = match tree.get(k)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let current: T = serde_json::from_slice(&current_bytes)?;
        let next = update(&current)?;
        let next_bytes = serde_json::to_vec(&next)?;

        match tree.compare_and_swap(k, Some(&current_bytes), Some(next_bytes))? {
            Ok(()) => return Ok(Some(next)),
            Err(_) => debug!(entity, id, attempt, "concurrent update detected, retrying"),
        }
    }

    Err(StoreError::Conflict {
        entity,
        id,
        attempts: MAX_UPDATE_ATTEMPTS,
    })
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_credential(credential: &Credential) -> Result<()> {
    check_unit("credential value", credential.value)?;
    if !credential.weight.is_finite() || credential.weight < 0.0 {
        return Err(StoreError::InvalidInput(format!(
            "credential weight must be a non-negative number, got {}",
            credential.weight
        )));
    }
    Ok(())
}
