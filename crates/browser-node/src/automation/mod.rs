//! Stateless action execution.
//!
//! Each request spins a fresh browser seeded with the given storage state,
//! runs the batch strictly sequentially on one page, and aborts the
//! remainder after the first failure while keeping results positionally
//! aligned with the input.

pub mod cdp;
pub mod driver;
pub mod x;

#[cfg(test)]
mod fake;
#[cfg(test)]
mod x_tests;

use orb_protocol::{
    codes, ActionRequest, ActionStatus, ExecuteActionRequest, ExecuteActionResult,
    ExecuteBatchRequest,
};

use driver::PageDriver;

/// Run a batch on an already-launched page. Split out from the browser
/// lifecycle so the ordering/abort semantics are testable without Chrome.
pub async fn run_batch(
    driver: &dyn PageDriver,
    actions: &[ActionRequest],
) -> Vec<ExecuteActionResult> {
    let mut results = Vec::with_capacity(actions.len());
    let mut aborted = false;
    for action in actions {
        if aborted {
            results.push(
                ExecuteActionResult::failed(codes::ABORTED, "Previous action failed")
                    .with_url(driver.current_url().await),
            );
            continue;
        }
        let result = x::execute_on_page(driver, action).await;
        let failed = result.status == ActionStatus::Failed;
        results.push(result);
        if failed {
            aborted = true;
        }
    }
    results
}

/// Execute an ordered batch in a fresh browser.
pub async fn execute_batch(
    request: &ExecuteBatchRequest,
    headless: bool,
) -> Vec<ExecuteActionResult> {
    let platform = request.platform_key.trim().to_ascii_lowercase();
    if platform != "x" {
        return request
            .actions
            .iter()
            .map(|_| {
                ExecuteActionResult::failed(
                    codes::UNSUPPORTED_PLATFORM,
                    format!("Unsupported platform: {}", request.platform_key),
                )
            })
            .collect();
    }

    let session = match cdp::BrowserSession::launch(
        &request.storage_state,
        request.bandwidth_mode,
        request.fingerprint_profile.as_ref(),
        headless,
    )
    .await
    {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(error = %error, "browser launch failed");
            return request
                .actions
                .iter()
                .map(|_| ExecuteActionResult::failed(codes::BROWSER_ERROR, error.to_string()))
                .collect();
        }
    };

    let results = run_batch(session.driver(), &request.actions).await;
    session.close().await;
    results
}

/// Single-action endpoint: equivalent to a one-item batch.
pub async fn execute_single(
    request: &ExecuteActionRequest,
    headless: bool,
) -> ExecuteActionResult {
    let batch = ExecuteBatchRequest {
        platform_key: request.platform_key.clone(),
        storage_state: request.storage_state.clone(),
        bandwidth_mode: request.bandwidth_mode,
        fingerprint_profile: request.fingerprint_profile.clone(),
        actions: vec![ActionRequest {
            action_type: request.action_type.clone(),
            target_url: request.target_url.clone(),
            target_external_id: request.target_external_id.clone(),
            action_params: request.action_params.clone(),
        }],
    };
    execute_batch(&batch, headless)
        .await
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            ExecuteActionResult::failed(codes::INTERNAL_ERROR, "empty batch result")
        })
}
