// src/models/enrollment.rs
//! A student's enrollment in a course and their progress through it.

use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::CertificateHash;
use crate::storage::document_store::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding enrollments.
pub const ENROLLMENTS: &str = "user_courses";

/// Highest progress value; reaching it completes the course.
pub const COMPLETE: u8 = 100;

/// Caller-supplied fields of a new enrollment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub user_id: String,
    /// Name printed on the certificate issued at completion
    pub student_name: String,
    pub course_id: String,
    pub title: String,
    pub instructor: String,
}

/// One row of the `user_courses` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default)]
    pub id: u64,
    pub user_id: String,
    pub student_name: String,
    pub course_id: String,
    pub title: String,
    pub instructor: String,
    /// Percentage, `0..=100`
    pub progress: u8,
    pub completed: bool,
    pub last_accessed: DateTime<Utc>,
    /// Set once a certificate has been issued for this enrollment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<CertificateHash>,
}

impl Enrollment {
    /// Fresh enrollment with no progress.
    pub fn new(request: EnrollmentRequest, enrolled_at: DateTime<Utc>) -> Self {
        Enrollment {
            id: 0,
            user_id: request.user_id,
            student_name: request.student_name,
            course_id: request.course_id,
            title: request.title,
            instructor: request.instructor,
            progress: 0,
            completed: false,
            last_accessed: enrolled_at,
            certificate_hash: None,
        }
    }
}

impl Record for Enrollment {
    const COLLECTION: &'static str = ENROLLMENTS;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn validate(&self) -> CertificateResult<()> {
        let reason = if self.user_id.trim().is_empty() {
            "`userId` must not be empty".to_string()
        } else if self.course_id.trim().is_empty() {
            "`courseId` must not be empty".to_string()
        } else if self.progress > COMPLETE {
            format!("progress {} exceeds {COMPLETE}", self.progress)
        } else if self.completed != (self.progress >= COMPLETE) {
            "`completed` disagrees with progress".to_string()
        } else {
            return Ok(());
        };
        Err(CertificateError::Schema {
            collection: ENROLLMENTS.to_string(),
            reason,
        })
    }
}
