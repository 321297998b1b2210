//! Payment API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AdminPrincipal;
use crate::models::{ApiResponse, Payment, PaymentMethod, PaymentType, Principal};
use crate::payment::{
    GatewayReconciler, Outcome, PaymentSession, PaymentSessionService, Reconciliation,
    Settlement, SettlementCoordinator,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(url)]
    pub proof_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachProofRequest {
    #[validate(url)]
    pub proof_url: String,
}

/// POST /api/payments
pub async fn create_payment(
    State(payments): State<Arc<PaymentSessionService>>,
    principal: Principal,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentSession>>), ApiError> {
    let session = payments
        .create_session(
            request.booking_id,
            request.payment_type,
            request.payment_method,
            &principal,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}

/// GET /api/payments - admin view, newest first
pub async fn list_payments(
    State(payments): State<Arc<PaymentSessionService>>,
    AdminPrincipal(_admin): AdminPrincipal,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ApiError> {
    Ok(Json(ApiResponse::ok(payments.list_payments().await?)))
}

/// POST /api/payments/:id/confirm - cash or manual confirmation
pub async fn confirm_payment(
    State(settlement): State<Arc<SettlementCoordinator>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(payment_id): Path<Uuid>,
    request: Option<Json<ConfirmPaymentRequest>>,
) -> Result<Json<ApiResponse<Settlement>>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    tracing::info!(payment_id = %payment_id, admin_id = %admin.tenant_id, "Admin confirming payment");
    let result = settlement
        .settle(
            payment_id,
            Outcome::Confirmed {
                proof_url: request.proof_url,
            },
        )
        .await?;

    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/payments/:id/reject
pub async fn reject_payment(
    State(settlement): State<Arc<SettlementCoordinator>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Settlement>>, ApiError> {
    tracing::info!(payment_id = %payment_id, admin_id = %admin.tenant_id, "Admin rejecting payment");
    let result = settlement.reject(payment_id).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/payments/:id/proof
pub async fn attach_proof(
    State(payments): State<Arc<PaymentSessionService>>,
    principal: Principal,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<AttachProofRequest>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    request.validate()?;

    let payment = payments
        .attach_proof(payment_id, request.proof_url, &principal)
        .await?;
    Ok(Json(ApiResponse::ok(payment)))
}

/// POST /api/payments/verify/:order_id - poll the gateway
pub async fn verify_payment(
    State(reconciler): State<Arc<GatewayReconciler>>,
    _principal: Principal,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Reconciliation>>, ApiError> {
    let result = reconciler.verify_payment(&order_id).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/payments/notification - gateway webhook, authenticated by signature
pub async fn payment_notification(
    State(reconciler): State<Arc<GatewayReconciler>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<Reconciliation>>, ApiError> {
    let result = reconciler.handle_notification(&payload).await?;
    Ok(Json(ApiResponse::ok(result)))
}
