//! 엔티티 조회/생성/수정/삭제/정렬.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::info;
use watchdesk_client::{ClientContext, FeedView};
use watchdesk_core::{Entity, EntityDraft, EntityUpdate};

use super::output::{format_entity, format_rows, to_json, OutputFormat};

/// 엔티티 생성/수정 입력.
#[derive(Debug, Default)]
pub struct EntityInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tickers: Vec<String>,
    /// `TICKER=PRICE` 형식
    pub purchases: Vec<String>,
}

/// `TICKER=PRICE` 목록 파싱.
pub fn parse_purchases(items: &[String]) -> Result<BTreeMap<String, f64>> {
    items
        .iter()
        .map(|item| {
            let (ticker, price) = item
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Invalid purchase: {}. Use TICKER=PRICE", item))?;
            let price: f64 = price
                .trim()
                .parse()
                .with_context(|| format!("Invalid purchase price: {}", item))?;
            Ok((ticker.trim().to_string(), price))
        })
        .collect()
}

/// 쉼표 구분 종목 목록 분리.
pub fn split_tickers(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 목록 조회.
pub async fn list(ctx: &ClientContext, format: OutputFormat) -> Result<usize> {
    match ctx.feed.load().await {
        FeedView::Failed(message) => Err(anyhow::anyhow!("Failed to load entities: {}", message)),
        FeedView::Empty => {
            println!("No entities.");
            Ok(0)
        }
        FeedView::Rows(rows) => {
            match format {
                OutputFormat::Table => println!("{}", format_rows(&rows)),
                OutputFormat::Json => println!("{}", to_json(&rows)?),
            }
            Ok(rows.len())
        }
    }
}

/// 목록을 불러온 뒤 엔티티 하나 조회.
pub async fn load_entity(ctx: &ClientContext, id: &str) -> Result<Entity> {
    if let FeedView::Failed(message) = ctx.feed.load().await {
        return Err(anyhow::anyhow!("Failed to load entities: {}", message));
    }
    ctx.store
        .get(id)
        .await
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))
}

/// 상세 조회.
pub async fn show(ctx: &ClientContext, id: &str, format: OutputFormat) -> Result<()> {
    let entity = load_entity(ctx, id).await?;
    match format {
        OutputFormat::Table => println!("{}", format_entity(&entity)),
        OutputFormat::Json => println!("{}", to_json(&entity)?),
    }
    Ok(())
}

/// 생성.
pub async fn create(ctx: &ClientContext, input: EntityInput) -> Result<Entity> {
    let mut draft = EntityDraft::new(input.title.unwrap_or_default(), split_tickers(&input.tickers));
    if let Some(description) = input.description {
        draft = draft.with_description(description);
    }
    for (ticker, price) in parse_purchases(&input.purchases)? {
        draft = draft.with_purchase(ticker, price);
    }
    let draft = draft.prepare()?;

    let entity = ctx.api.create_entity(&draft).await?;
    ctx.store.insert(entity.clone()).await;
    info!(entity_id = %entity.id, "Entity created");
    Ok(entity)
}

/// 수정.
pub async fn update(ctx: &ClientContext, id: &str, input: EntityInput) -> Result<Entity> {
    let purchases = parse_purchases(&input.purchases)?;
    let tickers = split_tickers(&input.tickers);
    let update = EntityUpdate {
        title: input.title,
        description: input.description,
        tickers: (!tickers.is_empty()).then_some(tickers),
        purchases: (!purchases.is_empty()).then_some(purchases),
        options: None,
    }
    .prepare()?;

    if update.is_empty() {
        return Err(anyhow::anyhow!("Nothing to update"));
    }

    let entity = ctx.api.update_entity(id, &update).await?;
    let ticket = ctx.store.begin_reload().await;
    if !ctx.store.apply_entity(ticket, entity.clone()).await {
        ctx.store.insert(entity.clone()).await;
    }
    info!(entity_id = %id, "Entity updated");
    Ok(entity)
}

/// 삭제.
pub async fn delete(ctx: &ClientContext, id: &str) -> Result<()> {
    ctx.api.delete_entity(id).await?;
    ctx.streams.cancel(id).await;
    ctx.store.remove(id).await;
    info!(entity_id = %id, "Entity deleted");
    Ok(())
}

/// 정렬 순서 저장.
pub async fn reorder(ctx: &ClientContext, ids: &[String]) -> Result<()> {
    let ids = split_tickers(ids);
    if ids.is_empty() {
        return Err(anyhow::anyhow!("No ids given"));
    }
    ctx.api.reorder_entities(&ids).await?;
    ctx.store.reorder(&ids).await;
    info!(count = ids.len(), "Order saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_purchases() {
        let parsed = parse_purchases(&["AAPL=150.5".to_string(), " MSFT = 300".to_string()]).unwrap();
        assert_eq!(parsed.get("AAPL"), Some(&150.5));
        assert_eq!(parsed.get("MSFT"), Some(&300.0));

        assert!(parse_purchases(&["AAPL".to_string()]).is_err());
        assert!(parse_purchases(&["AAPL=abc".to_string()]).is_err());
    }

    #[test]
    fn test_split_tickers() {
        let tickers = split_tickers(&["aapl, msft".to_string(), "TSLA".to_string(), ",".to_string()]);
        assert_eq!(tickers, vec!["aapl", "msft", "TSLA"]);
    }
}
