// src/services/api_server.rs
//! API Server for certificate record-keeping
//!
//! Exposes the certificate registry, the ledger client and the verification
//! gateway over HTTP/JSON:
//! - Certificate issuance, lookup by hash and listing by student or course
//! - Course enrollment and progress, issuing the certificate on completion
//! - Certificate validation through the verification gateway
//! - Ledger issuance, record fetch, validity check and issued count

use crate::error::CertificateError;
use crate::models::certificate::{Certificate, CertificateHash, CertificateInput, LedgerCertificate};
use crate::models::enrollment::{Enrollment, EnrollmentRequest};
use crate::services::certificate_registry::CertificateRegistry;
use crate::services::course_progress::CourseProgressService;
use crate::services::ledger_client::LedgerClient;
use crate::services::verification_gateway::{VerificationGateway, VerificationReport, VerificationState};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

// API request and response structures

/// Request payload for issuing a certificate on the ledger
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerIssueRequest {
    recipient_name: String,
    course_name: String,
    issuer_name: String,
}

/// Request payload for a progress update
#[derive(Serialize, Deserialize)]
struct ProgressRequest {
    progress: u8,
}

/// Response for ledger issuance
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerIssueResponse {
    tx_hash: String,
}

/// Response for ledger validity checks
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerValidityResponse {
    certificate_hash: String,
    is_valid: bool,
}

/// Response containing the ledger's issued count
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerTotalResponse {
    total_certificates: u64,
}

/// Error body returned by every failing endpoint
#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// A [`CertificateError`] rendered as an HTTP response
struct ApiError(CertificateError);

impl From<CertificateError> for ApiError {
    fn from(err: CertificateError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

fn status_for(err: &CertificateError) -> StatusCode {
    match err {
        CertificateError::Validation(_) | CertificateError::Schema { .. } => StatusCode::BAD_REQUEST,
        CertificateError::NotFound(_) => StatusCode::NOT_FOUND,
        CertificateError::DuplicateIssuance { .. } => StatusCode::CONFLICT,
        CertificateError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CertificateError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
        CertificateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CertificateError::StorageCorruption { .. } | CertificateError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// API server state containing all service dependencies
#[derive(Clone)]
pub struct ApiServer {
    /// Local certificate issuance and retrieval
    registry: Arc<CertificateRegistry>,

    /// Enrollments and completion-triggered issuance
    progress: Arc<CourseProgressService>,

    /// External certificate registry contract
    ledger: Arc<LedgerClient>,

    /// Local-first, ledger-second verification
    gateway: Arc<VerificationGateway>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    pub fn new(
        registry: Arc<CertificateRegistry>,
        progress: Arc<CourseProgressService>,
        ledger: Arc<LedgerClient>,
        gateway: Arc<VerificationGateway>,
    ) -> Self {
        ApiServer {
            registry,
            progress,
            ledger,
            gateway,
        }
    }

    /// Router with every endpoint mounted
    pub fn router(&self) -> Router {
        Router::new()
            .route("/certificates", post(Self::issue_certificate_handler))
            .route("/certificates/:hash", get(Self::lookup_certificate_handler))
            .route("/students/:student_id/certificates", get(Self::student_certificates_handler))
            .route("/courses/:course_id/certificates", get(Self::course_certificates_handler))
            .route("/enrollments", post(Self::enroll_handler))
            .route("/students/:student_id/enrollments", get(Self::enrollments_handler))
            .route(
                "/students/:student_id/enrollments/completed",
                get(Self::completed_courses_handler),
            )
            .route(
                "/students/:student_id/courses/:course_id/progress",
                put(Self::update_progress_handler),
            )
            .route("/validate-certificate/:identifier", get(Self::validate_certificate_handler))
            .route("/ledger/certificates", post(Self::ledger_issue_handler))
            .route("/ledger/certificates/:hash", get(Self::ledger_fetch_handler))
            .route("/ledger/certificates/:hash/valid", get(Self::ledger_validity_handler))
            .route("/ledger/total", get(Self::ledger_total_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Local Registry Handlers
    // =====================

    /// Issues a certificate, or returns the existing one for the student/course pair
    ///
    /// # Endpoint
    /// POST /certificates
    async fn issue_certificate_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CertificateInput>,
    ) -> ApiResult<Certificate> {
        Ok(Json(state.registry.issue(payload)?))
    }

    /// Looks up a locally stored certificate by content address
    ///
    /// # Endpoint
    /// GET /certificates/:hash
    async fn lookup_certificate_handler(
        Path(hash): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Certificate> {
        let parsed: CertificateHash = hash.parse()?;
        state
            .registry
            .lookup_by_hash(&parsed)?
            .map(Json)
            .ok_or_else(|| CertificateError::NotFound(hash).into())
    }

    /// GET /students/:student_id/certificates
    async fn student_certificates_handler(
        Path(student_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Vec<Certificate>> {
        Ok(Json(state.registry.list_by_student(&student_id)?))
    }

    /// GET /courses/:course_id/certificates
    async fn course_certificates_handler(
        Path(course_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Vec<Certificate>> {
        Ok(Json(state.registry.list_by_course(&course_id)?))
    }

    // =====================
    // Course Progress Handlers
    // =====================

    /// Enrolls a student, or returns the existing enrollment
    ///
    /// # Endpoint
    /// POST /enrollments
    async fn enroll_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<EnrollmentRequest>,
    ) -> ApiResult<Enrollment> {
        Ok(Json(state.progress.enroll(payload)?))
    }

    /// GET /students/:student_id/enrollments
    async fn enrollments_handler(
        Path(student_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Vec<Enrollment>> {
        Ok(Json(state.progress.enrollments(&student_id)?))
    }

    /// GET /students/:student_id/enrollments/completed
    async fn completed_courses_handler(
        Path(student_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Vec<Enrollment>> {
        Ok(Json(state.progress.completed_courses(&student_id)?))
    }

    /// Records progress; reaching 100 issues the certificate
    ///
    /// # Endpoint
    /// PUT /students/:student_id/courses/:course_id/progress
    async fn update_progress_handler(
        Path((student_id, course_id)): Path<(String, String)>,
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<ProgressRequest>,
    ) -> ApiResult<Enrollment> {
        Ok(Json(state.progress.update_progress(
            &student_id,
            &course_id,
            payload.progress,
        )?))
    }

    // =====================
    // Validation Handler
    // =====================

    /// Validates a certificate identifier
    ///
    /// # Endpoint
    /// GET /validate-certificate/:identifier
    ///
    /// # Responses
    /// The body is always the verification report.
    /// - 200 OK: VALID
    /// - 400 Bad Request: malformed identifier
    /// - 404 Not Found: INVALID
    /// - 503 Service Unavailable: UNKNOWN
    async fn validate_certificate_handler(
        Path(identifier): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> (StatusCode, Json<VerificationReport>) {
        let verification = state.gateway.verify(&identifier).await;
        let report = verification.report();
        let status = match report.state {
            VerificationState::Valid => StatusCode::OK,
            VerificationState::Unknown => StatusCode::SERVICE_UNAVAILABLE,
            VerificationState::Invalid | VerificationState::Pending => {
                if identifier.parse::<CertificateHash>().is_err() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::NOT_FOUND
                }
            }
        };
        (status, Json(report))
    }

    // =====================
    // Ledger Handlers
    // =====================

    /// Issues a certificate on the ledger and waits for confirmation
    ///
    /// # Endpoint
    /// POST /ledger/certificates
    async fn ledger_issue_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<LedgerIssueRequest>,
    ) -> ApiResult<LedgerIssueResponse> {
        let tx_hash = state
            .ledger
            .issue_on_ledger(&payload.recipient_name, &payload.course_name, &payload.issuer_name)
            .await?;
        Ok(Json(LedgerIssueResponse {
            tx_hash: format!("0x{:x}", tx_hash),
        }))
    }

    /// GET /ledger/certificates/:hash
    async fn ledger_fetch_handler(
        Path(hash): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<LedgerCertificate> {
        Ok(Json(state.ledger.fetch_on_ledger(&hash).await?))
    }

    /// GET /ledger/certificates/:hash/valid
    async fn ledger_validity_handler(
        Path(hash): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<LedgerValidityResponse> {
        let is_valid = state.ledger.is_valid_on_ledger(&hash).await?;
        Ok(Json(LedgerValidityResponse {
            certificate_hash: hash,
            is_valid,
        }))
    }

    /// GET /ledger/total
    async fn ledger_total_handler(
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<LedgerTotalResponse> {
        Ok(Json(LedgerTotalResponse {
            total_certificates: state.ledger.total_issued().await?,
        }))
    }
}
