//! 차트 뷰포트 조작.
//!
//! 입력 동작을 순서대로 적용하고 마지막 프레임을 출력합니다. pan/zoom 결과는
//! 뷰포트 파일에 저장되어 다음 실행에서 복원됩니다.
//!
//! 동작 형식:
//! - `key:<KEY>` (`left`, `right`, `+`, `-`, `reset`)
//! - `wheel:<DELTA>@<X>`
//! - `hover:<X>`, `leave`
//! - `drag:<FROM>-><TO>`

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use watchdesk_chart::{
    ChartLayout, ChartSession, Frame, InputEvent, KeyCommand, PriceAnnotation, ViewportStore,
};
use watchdesk_client::ClientContext;
use watchdesk_core::{AppConfig, SeriesKey};

use super::entities::load_entity;
use super::output::{to_json, OutputFormat};

/// 차트 명령 설정.
#[derive(Debug)]
pub struct ChartCommand {
    pub ticker: String,
    pub period: String,
    pub interval: String,
    /// 현재가 주석을 가져올 엔티티
    pub entity: Option<String>,
    pub actions: Vec<String>,
    pub format: OutputFormat,
}

fn parse_x(raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid coordinate: {}", raw))
}

/// 동작 문자열 하나를 입력 이벤트로 변환.
pub fn parse_action(action: &str) -> Result<Vec<InputEvent>> {
    let (kind, arg) = action.split_once(':').unwrap_or((action, ""));
    let events = match kind.trim() {
        "key" => {
            let key = KeyCommand::parse(arg.trim())
                .ok_or_else(|| anyhow::anyhow!("Unknown key: {}", arg))?;
            vec![InputEvent::Key(key)]
        }
        "wheel" => {
            let (delta, x) = arg
                .split_once('@')
                .ok_or_else(|| anyhow::anyhow!("Invalid wheel action: {}. Use wheel:DELTA@X", arg))?;
            vec![InputEvent::Wheel {
                delta: parse_x(delta)?,
                x: parse_x(x)?,
            }]
        }
        "hover" => vec![InputEvent::PointerMove { x: parse_x(arg)? }],
        "leave" => vec![InputEvent::PointerLeave],
        "drag" => {
            let (from, to) = arg
                .split_once("->")
                .ok_or_else(|| anyhow::anyhow!("Invalid drag action: {}. Use drag:FROM->TO", arg))?;
            let (from, to) = (parse_x(from)?, parse_x(to)?);
            vec![
                InputEvent::PointerDown { x: from },
                InputEvent::PointerMove { x: to },
                InputEvent::PointerUp { x: to },
            ]
        }
        other => return Err(anyhow::anyhow!("Unknown action: {}", other)),
    };
    Ok(events)
}

fn summarize_frame(session: &ChartSession, frame: &Frame) -> String {
    let state = session.state();
    let mut output = format!(
        "{}  window [{}, {}) of {}  ({} commands)",
        state.key,
        state.start(),
        state.end(),
        state.len(),
        frame.commands.len()
    );
    if let Some(index) = state.hover_absolute() {
        if let Some((ts, close)) = session.series().point(index) {
            output.push_str(&format!("\nhover #{}: {:.2} @ {}", index, close, ts));
        }
    }
    for text in frame.texts() {
        output.push_str(&format!("\n  {}", text));
    }
    output
}

/// 차트 명령 실행.
pub async fn run(ctx: &ClientContext, config: &AppConfig, command: ChartCommand) -> Result<Frame> {
    // 동작을 먼저 검증
    let events = command
        .actions
        .iter()
        .map(|a| parse_action(a))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    let key = SeriesKey::new(&command.ticker, command.period, command.interval);
    let series = ctx.api.fetch_chart(&key).await?;
    info!(series = %key, points = series.len(), "Series fetched");

    let store = Arc::new(ViewportStore::file(&config.viewport.state_path));
    let mut session = ChartSession::open(
        key.clone(),
        series,
        store,
        ChartLayout::from_config(&config.chart),
    );

    if let Some(id) = &command.entity {
        let entity = load_entity(ctx, id).await?;
        session.set_annotation(PriceAnnotation::for_ticker(&entity, &key.ticker));
    }

    let mut frame = session.frame();
    for event in events {
        frame = session.handle(event);
    }

    match command.format {
        OutputFormat::Table => println!("{}", summarize_frame(&session, &frame)),
        OutputFormat::Json => println!("{}", to_json(&frame)?),
    }
    Ok(frame)
}
