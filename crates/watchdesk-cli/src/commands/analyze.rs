//! 분석 실행.

use anyhow::Result;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use watchdesk_client::{BatchAnalysis, ClientContext, FeedView, StreamNotice, StreamState};

use super::entities::load_entity;
use super::output::format_entity;

/// 일괄 분석. 완료된 엔티티를 반환받아 저장소에 반영합니다.
pub async fn run(ctx: &ClientContext, id: &str) -> Result<()> {
    load_entity(ctx, id).await?;

    let ticket = ctx.store.begin_reload().await;
    let entity = ctx.api.run_analysis(id).await?;
    ctx.store.apply_entity(ticket, entity).await;

    if let Some(entity) = ctx.store.get(id).await {
        println!("{}", format_entity(&entity));
    }
    Ok(())
}

/// 전체 재분석. 실패한 엔티티 수를 반환합니다.
pub async fn run_all(ctx: &ClientContext) -> Result<usize> {
    if let FeedView::Failed(message) = ctx.feed.load().await {
        return Err(anyhow::anyhow!("Failed to load entities: {}", message));
    }

    let results = ctx.feed.analyze_all().await?;
    let mut failed = 0;
    for result in &results {
        match result {
            BatchAnalysis::Analyzed(entity) => {
                println!("{:<24} {}", entity.id, entity.row_suggestion());
            }
            BatchAnalysis::Failed { id, error } => {
                failed += 1;
                println!("{:<24} error: {}", id.as_deref().unwrap_or("-"), error);
            }
        }
    }
    Ok(failed)
}

/// 알림 한 줄 표기. 다른 엔티티 알림은 `None`.
fn describe(notice: &StreamNotice, id: &str) -> Option<String> {
    if notice.entity_id() != id {
        return None;
    }
    let line = match notice {
        StreamNotice::Started { tickers, .. } => format!("started: {}", tickers.join(", ")),
        StreamNotice::TickerStarted { ticker, .. } => format!("[{}] analyzing", ticker),
        StreamNotice::Log {
            ticker: Some(ticker),
            message,
            ..
        } => format!("[{}] {}", ticker, message),
        StreamNotice::Log { message, .. } => message.clone(),
        StreamNotice::TickerDone {
            ticker,
            suggestion,
            current,
            pct,
            ..
        } => format!(
            "[{}] {} (current {}, pct {})",
            ticker,
            suggestion,
            current.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "-".into()),
            pct.map(|p| format!("{:+.2}%", p)).unwrap_or_else(|| "-".into()),
        ),
        StreamNotice::TickerError { ticker, error, .. } => format!("[{}] error: {}", ticker, error),
        StreamNotice::State { state, .. } => format!("stream {}", state.name()),
    };
    Some(line)
}

/// 대상 엔티티가 종료 상태가 될 때까지 알림을 출력합니다.
///
/// 알림이 유실되면 종료 알림도 빠졌을 수 있으므로 `current_state`로 다시 확인합니다.
async fn watch_notices<F, Fut>(
    notices: &mut broadcast::Receiver<StreamNotice>,
    id: &str,
    current_state: F,
) -> StreamState
where
    F: Fn() -> Fut,
    Fut: Future<Output = StreamState>,
{
    loop {
        match notices.recv().await {
            Ok(notice) => {
                if let Some(line) = describe(&notice, id) {
                    println!("{}", line);
                }
                if let StreamNotice::State { entity_id, state } = notice {
                    if entity_id == id && state.is_terminal() {
                        return state;
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress notices dropped");
                let state = current_state().await;
                if state.is_terminal() {
                    return state;
                }
            }
            Err(RecvError::Closed) => return current_state().await,
        }
    }
}

/// 분석 스트림을 열고 종료될 때까지 진행 상황을 출력합니다.
///
/// Ctrl-C로 중단하면 스트림을 취소합니다.
pub async fn follow(ctx: &ClientContext, id: &str) -> Result<StreamState> {
    load_entity(ctx, id).await?;

    let mut notices = ctx.streams.subscribe();
    ctx.streams.open_view(id).await;
    if let Err(e) = ctx.streams.start(id).await {
        ctx.streams.close_view().await;
        return Err(e.into());
    }
    info!(entity_id = %id, "Following analysis stream");

    let state = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            ctx.streams.cancel(id).await;
            ctx.streams.state(id).await
        }
        state = watch_notices(&mut notices, id, move || ctx.streams.state(id)) => state,
    };

    ctx.streams.close_view().await;

    if let Some(entity) = ctx.store.get(id).await {
        println!("\n{}", format_entity(&entity));
    }
    Ok(state)
}
