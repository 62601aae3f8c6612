// src/services/course_progress.rs
//! Course Progress Service
//!
//! Tracks enrollments in the `user_courses` collection and issues the
//! completion certificate through the [`CertificateRegistry`] once a
//! student's progress reaches 100%.

use crate::error::{CertificateError, CertificateResult};
use crate::models::certificate::{Certificate, CertificateInput};
use crate::models::enrollment::{Enrollment, EnrollmentRequest, COMPLETE, ENROLLMENTS};
use crate::services::certificate_registry::CertificateRegistry;
use crate::storage::document_store::{DocumentStore, Filter, Operation};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::{Arc, Mutex, PoisonError};

/// Service for enrollment and progress tracking
pub struct CourseProgressService {
    /// Store holding the `user_courses` collection
    store: Arc<DocumentStore>,

    /// Issues the certificate on completion
    registry: Arc<CertificateRegistry>,

    /// Makes each lookup-then-write on an enrollment one step
    lock: Mutex<()>,
}

impl CourseProgressService {
    pub fn new(store: Arc<DocumentStore>, registry: Arc<CertificateRegistry>) -> Self {
        CourseProgressService {
            store,
            registry,
            lock: Mutex::new(()),
        }
    }

    /// Enrolls a student in a course
    ///
    /// # Returns
    /// The new enrollment, or the existing one if the student is already
    /// enrolled in the course
    pub fn enroll(&self, request: EnrollmentRequest) -> CertificateResult<Enrollment> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = self.find(&request.user_id, &request.course_id)? {
            info!("{} already enrolled in {}", existing.user_id, existing.course_id);
            return Ok(existing);
        }

        let enrollment = Enrollment::new(request, Utc::now());
        let stored = self
            .store
            .execute(Operation::Insert, enrollment)?
            .ok_or_else(|| CertificateError::corruption(ENROLLMENTS, "insert returned no record"))?;
        info!("Enrolled {} in {} (id {})", stored.user_id, stored.course_id, stored.id);
        Ok(stored)
    }

    /// All enrollments of a student
    pub fn enrollments(&self, user_id: &str) -> CertificateResult<Vec<Enrollment>> {
        self.store.query(&Filter::new().field("userId", user_id))
    }

    /// Enrollments a student has completed
    pub fn completed_courses(&self, user_id: &str) -> CertificateResult<Vec<Enrollment>> {
        self.store
            .query(&Filter::new().field("userId", user_id).field("completed", true))
    }

    /// Records a student's progress in a course
    ///
    /// # Behavior
    /// - `completed` follows `progress >= 100`
    /// - The first time a course is completed, a certificate is issued (or an
    ///   existing one for the student/course pair is reused) and its hash is
    ///   stored on the enrollment; it is kept if progress later drops
    ///
    /// # Errors
    /// - `Validation` if `progress` is above 100
    /// - `NotFound` if the student is not enrolled in the course
    /// - Any registry error raised while issuing; nothing is written then
    pub fn update_progress(
        &self,
        user_id: &str,
        course_id: &str,
        progress: u8,
    ) -> CertificateResult<Enrollment> {
        if progress > COMPLETE {
            return Err(CertificateError::Validation(format!(
                "progress {progress} exceeds {COMPLETE}"
            )));
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut enrollment = self.find(user_id, course_id)?.ok_or_else(|| {
            CertificateError::NotFound(format!("enrollment of `{user_id}` in `{course_id}`"))
        })?;

        let now = Utc::now();
        enrollment.progress = progress;
        enrollment.completed = progress >= COMPLETE;
        enrollment.last_accessed = now;
        if enrollment.completed && enrollment.certificate_hash.is_none() {
            let certificate = self.completion_certificate(&enrollment, now)?;
            enrollment.certificate_hash = Some(certificate.certificate_hash);
        }

        self.store
            .execute(Operation::Update, enrollment)?
            .ok_or_else(|| CertificateError::NotFound(format!("enrollment of `{user_id}` in `{course_id}`")))
    }

    fn find(&self, user_id: &str, course_id: &str) -> CertificateResult<Option<Enrollment>> {
        let matches: Vec<Enrollment> = self
            .store
            .query(&Filter::new().field("userId", user_id).field("courseId", course_id))?;
        Ok(matches.into_iter().next())
    }

    fn completion_certificate(
        &self,
        enrollment: &Enrollment,
        completed_at: DateTime<Utc>,
    ) -> CertificateResult<Certificate> {
        let existing = self
            .registry
            .list_by_student(&enrollment.user_id)?
            .into_iter()
            .find(|certificate| certificate.course_id == enrollment.course_id);
        if let Some(certificate) = existing {
            return Ok(certificate);
        }

        let certificate = self.registry.issue(CertificateInput {
            student_id: enrollment.user_id.clone(),
            course_id: enrollment.course_id.clone(),
            student_name: enrollment.student_name.clone(),
            course_name: enrollment.title.clone(),
            completion_date: completed_at,
            instructor_name: enrollment.instructor.clone(),
        })?;
        info!(
            "{} completed {}; certificate {}",
            enrollment.user_id, enrollment.course_id, certificate.certificate_hash
        );
        Ok(certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::certificate_registry::IssuancePolicy;
    use crate::storage::backend::{MemoryStorage, StorageBackend};
    use serde_json::Value;

    fn request(user_id: &str, course_id: &str) -> EnrollmentRequest {
        EnrollmentRequest {
            user_id: user_id.into(),
            student_name: "Ann".into(),
            course_id: course_id.into(),
            title: "CS101".into(),
            instructor: "Dr. X".into(),
        }
    }

    fn service() -> (CourseProgressService, Arc<CertificateRegistry>, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        let store = Arc::new(DocumentStore::new(backend.clone()));
        let registry = Arc::new(CertificateRegistry::new(store.clone()));
        (CourseProgressService::new(store, registry.clone()), registry, backend)
    }

    #[test]
    fn test_enroll_is_idempotent() {
        let (service, _, _) = service();
        let first = service.enroll(request("s1", "c1")).unwrap();
        let second = service.enroll(request("s1", "c1")).unwrap();

        assert_eq!(first, second);
        assert_eq!(service.enrollments("s1").unwrap().len(), 1);
        assert!(service.enrollments("s2").unwrap().is_empty());
    }

    #[test]
    fn test_progress_updates_in_place() {
        let (service, registry, backend) = service();
        let enrolled = service.enroll(request("s1", "c1")).unwrap();

        let updated = service.update_progress("s1", "c1", 40).unwrap();
        assert_eq!(updated.id, enrolled.id);
        assert_eq!(updated.progress, 40);
        assert!(!updated.completed);
        assert_eq!(updated.certificate_hash, None);
        assert!(registry.list_by_student("s1").unwrap().is_empty());

        let raw: Vec<Value> =
            serde_json::from_str(&backend.get_item("user_courses").unwrap().unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0]["progress"], 40);
    }

    #[test]
    fn test_completion_issues_certificate_once() {
        let (service, registry, _) = service();
        service.enroll(request("s1", "c1")).unwrap();
        service.enroll(request("s1", "c2")).unwrap();

        let done = service.update_progress("s1", "c1", 100).unwrap();
        assert!(done.completed);
        let hash = done.certificate_hash.unwrap();

        let issued = registry.lookup_by_hash(&hash).unwrap().unwrap();
        assert_eq!(issued.student_name, "Ann");
        assert_eq!(issued.course_name, "CS101");
        assert_eq!(issued.instructor_name, "Dr. X");

        // Dropping back and completing again keeps the first certificate.
        let reopened = service.update_progress("s1", "c1", 90).unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.certificate_hash, Some(hash));
        let again = service.update_progress("s1", "c1", 100).unwrap();
        assert_eq!(again.certificate_hash, Some(hash));
        assert_eq!(registry.list_by_student("s1").unwrap().len(), 1);

        let completed: Vec<String> = service
            .completed_courses("s1")
            .unwrap()
            .into_iter()
            .map(|e| e.course_id)
            .collect();
        assert_eq!(completed, vec!["c1".to_string()]);
    }

    #[test]
    fn test_completion_reuses_existing_certificate_under_strict_policy() {
        let backend = Arc::new(MemoryStorage::new());
        let store = Arc::new(DocumentStore::new(backend));
        let registry =
            Arc::new(CertificateRegistry::new(store.clone()).with_policy(IssuancePolicy::Strict));
        let service = CourseProgressService::new(store, registry.clone());

        let prior = registry
            .issue(CertificateInput {
                student_id: "s1".into(),
                course_id: "c1".into(),
                student_name: "Ann".into(),
                course_name: "CS101".into(),
                completion_date: Utc::now(),
                instructor_name: "Dr. X".into(),
            })
            .unwrap();
        service.enroll(request("s1", "c1")).unwrap();

        let done = service.update_progress("s1", "c1", 100).unwrap();
        assert_eq!(done.certificate_hash, Some(prior.certificate_hash));
    }

    #[test]
    fn test_rejected_progress_updates() {
        let (service, _, _) = service();
        service.enroll(request("s1", "c1")).unwrap();

        assert!(matches!(
            service.update_progress("s1", "c1", 101),
            Err(CertificateError::Validation(_))
        ));
        assert!(matches!(
            service.update_progress("s1", "c9", 10),
            Err(CertificateError::NotFound(_))
        ));
        assert_eq!(service.enrollments("s1").unwrap()[0].progress, 0);
    }

    #[test]
    fn test_failed_issuance_leaves_progress_unchanged() {
        let (service, _, backend) = service();
        service.enroll(request("s1", "c1")).unwrap();
        backend.set_item("certificates", "oops").unwrap();

        assert!(matches!(
            service.update_progress("s1", "c1", 100),
            Err(CertificateError::StorageCorruption { .. })
        ));
        let stored = &service.enrollments("s1").unwrap()[0];
        assert_eq!(stored.progress, 0);
        assert!(!stored.completed);
    }
}
