//! Explicit caller identity for every engine operation.

use chrono::NaiveDateTime;
use database::Role;

/// Who is calling and what time it is for them.
///
/// `now` is wall-clock time in the deployment's single shared zone, the same
/// zone lesson times are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: i64,
    pub role: Role,
    pub now: NaiveDateTime,
}

impl RequestContext {
    pub fn new(user_id: i64, role: Role, now: NaiveDateTime) -> Self {
        Self { user_id, role, now }
    }

    /// Context stamped with the server's local clock.
    pub fn local_now(user_id: i64, role: Role) -> Self {
        Self::new(user_id, role, chrono::Local::now().naive_local())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
