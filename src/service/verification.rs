//! Enrollment check, face match and idempotent ledger write for one request.
//!
//! States run strictly in order: student and course lookup, ownership,
//! enrollment, reference photo, match, ledger. A failure at any step ends the
//! request and nothing after it runs, so an unenrolled student or a missing
//! photo never reaches the encoder.

use std::sync::Arc;

use actix_web::web;
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument};

use crate::error::{AppError, Result};
use crate::face::{FaceEncoding, FaceMatcher, MatchResult};
use crate::model::student::Student;
use crate::repo::Repository;
use crate::service::ledger::{AttendanceLedger, LedgerOutcome};
use crate::utils::reference_cache::{ReferenceCache, ReferenceKey};

pub struct VerifyAttendance {
    /// Caller; must own the course.
    pub instructor_id: u64,
    pub student_id: u64,
    pub course_id: u64,
    pub probe: Vec<u8>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// Distance at or above the threshold; no ledger write.
    Rejected(MatchResult),
    Recorded {
        matched: MatchResult,
        ledger: LedgerOutcome,
    },
}

impl VerificationOutcome {
    pub fn match_result(&self) -> &MatchResult {
        match self {
            VerificationOutcome::Rejected(m) | VerificationOutcome::Recorded { matched: m, .. } => m,
        }
    }
}

pub struct VerificationWorkflow {
    repo: Arc<dyn Repository>,
    matcher: Arc<FaceMatcher>,
    ledger: AttendanceLedger,
    references: ReferenceCache,
}

impl VerificationWorkflow {
    pub fn new(
        repo: Arc<dyn Repository>,
        matcher: Arc<FaceMatcher>,
        references: ReferenceCache,
    ) -> Self {
        Self {
            ledger: AttendanceLedger::new(repo.clone()),
            repo,
            matcher,
            references,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.matcher.threshold()
    }

    #[instrument(
        name = "verify_attendance",
        skip(self, request),
        fields(student_id = request.student_id, course_id = request.course_id)
    )]
    pub async fn verify_and_record(
        &self,
        request: VerifyAttendance,
    ) -> Result<VerificationOutcome> {
        let student = self.load_student(request.student_id).await?;

        let course = self
            .repo
            .find_course(request.course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        course.ensure_owned_by(request.instructor_id).inspect_err(|_| {
            info!(
                instructor_id = request.instructor_id,
                "Course owned by another instructor"
            )
        })?;

        if !self.repo.is_enrolled(student.id, course.id).await? {
            info!("Student not enrolled");
            return Err(AppError::NotEnrolled {
                student_id: student.id,
                course_id: course.id,
            });
        }
        debug!("Enrollment checked");

        let matched = self.match_against_reference(&student, request.probe).await?;
        if !matched.verified {
            info!(distance = matched.distance, "Face did not match");
            return Ok(VerificationOutcome::Rejected(matched));
        }

        let ledger = self
            .ledger
            .record(student.id, course.id, request.at)
            .await?;
        debug!(attendance_id = ledger.record().id, "Ledger updated");

        Ok(VerificationOutcome::Recorded { matched, ledger })
    }

    /// Compares a probe with the stored photo without touching the ledger.
    #[instrument(name = "verify_face", skip(self, probe))]
    pub async fn verify_face(&self, student_id: u64, probe: Vec<u8>) -> Result<MatchResult> {
        let student = self.load_student(student_id).await?;
        self.match_against_reference(&student, probe).await
    }

    async fn load_student(&self, student_id: u64) -> Result<Student> {
        self.repo
            .find_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    async fn match_against_reference(
        &self,
        student: &Student,
        probe: Vec<u8>,
    ) -> Result<MatchResult> {
        let reference = self.reference_encoding(student).await?;

        let matcher = self.matcher.clone();
        let probe = web::block(move || matcher.encode_probe(&probe))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        let result = self.matcher.compare(&reference, &probe);
        debug!(
            distance = result.distance,
            verified = result.verified,
            "Face compared"
        );
        Ok(result)
    }

    async fn reference_encoding(&self, student: &Student) -> Result<Arc<FaceEncoding>> {
        let photo = student
            .profile_pic
            .clone()
            .ok_or(AppError::NoReferencePhoto)?;

        let key = ReferenceKey {
            student_id: student.id,
            version: student.photo_version(),
        };
        if let Some(encoding) = self.references.get(&key).await {
            debug!(student_id = student.id, "Reference encoding cache hit");
            return Ok(encoding);
        }

        let matcher = self.matcher.clone();
        let encoding = web::block(move || matcher.encode_reference(&photo))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
        let encoding = Arc::new(encoding);

        self.references.insert(key, encoding.clone()).await;
        Ok(encoding)
    }
}
