//! Gatekeeper behaviour as seen by an operation body

use assert_matches::assert_matches;
use hawk_authorization::{Gatekeeper, OperationId};
use hawk_core::authorities::*;
use hawk_core::{HawkError, HawkResult, Principal, TenantId};
use std::sync::atomic::{AtomicBool, Ordering};

fn tenant() -> TenantId {
    TenantId::new("acme")
}

async fn run_guarded(
    gatekeeper: &Gatekeeper,
    principal: &Principal,
    operation: OperationId,
    ran: &AtomicBool,
) -> HawkResult<&'static str> {
    gatekeeper
        .guard(principal, operation, || async {
            ran.store(true, Ordering::SeqCst);
            Ok("done")
        })
        .await
}

#[tokio::test]
async fn denied_call_never_runs_body() {
    let gatekeeper = Gatekeeper::with_defaults();
    let user = Principal::user("ops", tenant(), [DELETE_TARGET]);
    let ran = AtomicBool::new(false);

    let result = run_guarded(
        &gatekeeper,
        &user,
        OperationId::DistributionSetTagDelete,
        &ran,
    )
    .await;

    assert_matches!(result, Err(HawkError::InsufficientPermission { operation }) if operation == "tag.distribution_set.delete");
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn denial_takes_precedence_over_body_errors() {
    let gatekeeper = Gatekeeper::with_defaults();
    let user = Principal::user("ops", tenant(), [READ_TARGET]);

    let result: HawkResult<()> = gatekeeper
        .guard(&user, OperationId::TargetDelete, || async {
            Err(HawkError::not_found("target device-1"))
        })
        .await;

    assert_matches!(result, Err(HawkError::InsufficientPermission { .. }));
}

#[tokio::test]
async fn allowed_call_returns_body_result() {
    let gatekeeper = Gatekeeper::with_defaults();
    let user = Principal::user("ops", tenant(), [READ_REPOSITORY, UPDATE_TARGET]);
    let ran = AtomicBool::new(false);

    let result = run_guarded(&gatekeeper, &user, OperationId::ConfirmationConfirm, &ran).await;

    assert_eq!(result.unwrap(), "done");
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn server_time_is_open_to_anonymous_callers() {
    let gatekeeper = Gatekeeper::with_defaults();
    let anonymous = Principal::anonymous(tenant());
    let ran = AtomicBool::new(false);

    let result = run_guarded(&gatekeeper, &anonymous, OperationId::SystemServerTime, &ran).await;

    assert!(result.is_ok());
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn anonymous_caller_is_unauthenticated_not_forbidden() {
    let gatekeeper = Gatekeeper::with_defaults();
    let anonymous = Principal::anonymous(tenant());
    let ran = AtomicBool::new(false);

    let result = run_guarded(&gatekeeper, &anonymous, OperationId::TargetRead, &ran).await;

    assert_matches!(result, Err(HawkError::Unauthenticated { .. }));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn controller_roles_reach_device_operations_only() {
    let gatekeeper = Gatekeeper::with_defaults();
    for device in [
        Principal::controller("device-1", tenant()),
        Principal::anonymous_controller(tenant()),
    ] {
        assert!(gatekeeper.check(&device, OperationId::ControllerRegister).is_ok());
        assert!(gatekeeper.check(&device, OperationId::ControllerFindTarget).is_ok());
        assert!(gatekeeper.check(&device, OperationId::ConfirmationStatus).is_ok());
        assert!(gatekeeper.check(&device, OperationId::TargetRead).is_err());
        assert!(gatekeeper.check(&device, OperationId::TargetTagDelete).is_err());
    }
}

#[test]
fn system_code_may_find_targets_but_not_register() {
    let gatekeeper = Gatekeeper::with_defaults();
    let system = Principal::system(tenant());
    assert!(gatekeeper.check(&system, OperationId::ControllerFindTarget).is_ok());
    assert!(gatekeeper.check(&system, OperationId::ControllerRegister).is_err());
}

#[test]
fn rollout_group_targets_need_both_permissions() {
    let gatekeeper = Gatekeeper::with_defaults();
    let rollout_only = Principal::user("ops", tenant(), [READ_ROLLOUT]);
    let both = Principal::user("ops", tenant(), [READ_ROLLOUT, READ_TARGET]);
    assert!(gatekeeper
        .check(&rollout_only, OperationId::RolloutGroupReadTargets)
        .is_err());
    assert!(gatekeeper
        .check(&both, OperationId::RolloutGroupReadTargets)
        .is_ok());
}
