//! 스냅샷 갱신과 요약.

use anyhow::Result;
use tracing::{info, warn};
use watchdesk_client::{ClientContext, FeedView, RefreshOutcome};

use super::entities::{load_entity, split_tickers};
use super::output::format_entity;

/// 갱신 결과 표기.
fn describe(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Refreshed => "refreshed".to_string(),
        RefreshOutcome::InFlight => "skipped (in flight)".to_string(),
        RefreshOutcome::CoolingDown => "skipped (cooling down)".to_string(),
        RefreshOutcome::Gone => "skipped (deleted)".to_string(),
        RefreshOutcome::Failed(kind) => format!("failed ({:?})", kind),
    }
}

/// 스냅샷 갱신. id를 지정하지 않으면 목록 전체를 대상으로 합니다.
///
/// 한 번에 최대 `feed.max_per_pass`개까지 시차를 두고 갱신합니다.
pub async fn refresh(ctx: &ClientContext, ids: &[String]) -> Result<usize> {
    if let FeedView::Failed(message) = ctx.feed.load().await {
        return Err(anyhow::anyhow!("Failed to load entities: {}", message));
    }

    let mut ids = split_tickers(ids);
    if ids.is_empty() {
        ids = ctx.store.ids().await;
    }

    let pass = ctx.feed.refresh_visible(&ids);
    let scheduled = pass.scheduled().len();
    if scheduled < ids.len() {
        warn!(
            requested = ids.len(),
            scheduled, "Refresh pass is capped; remaining entities were not refreshed"
        );
    }

    let mut refreshed = 0;
    let mut calls = 0;
    for (id, outcome) in pass.join().await {
        if outcome == RefreshOutcome::Refreshed {
            refreshed += 1;
        }
        if outcome.issued_call() {
            calls += 1;
        }
        println!("{:<24} {}", id, describe(&outcome));
    }

    info!(refreshed, calls, "Refresh pass finished");
    Ok(refreshed)
}

/// 요약 생성 후 저장소에 반영.
pub async fn summarize(ctx: &ClientContext, id: &str) -> Result<()> {
    load_entity(ctx, id).await?;

    let ticket = ctx.store.begin_reload().await;
    let entity = ctx.api.summarize(id).await?;
    ctx.store.apply_entity(ticket, entity).await;

    if let Some(entity) = ctx.store.get(id).await {
        println!("{}", format_entity(&entity));
    }
    Ok(())
}
