//! 출력 형식.

use anyhow::Result;
use serde::Serialize;
use watchdesk_client::FeedRow;
use watchdesk_core::Entity;

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Use: table, json", s)),
        }
    }
}

/// JSON 문자열로 변환.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn opt_num(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "-".to_string(),
    }
}

/// 목록 테이블.
pub fn format_rows(rows: &[FeedRow]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<24} {:<28} {:<8} {:>10} {:>9} {:<5} {:<16}\n",
        "ID", "TITLE", "TICKER", "CURRENT", "PCT", "SIG", "UPDATED"
    ));
    output.push_str(&"-".repeat(106));
    output.push('\n');

    for row in rows {
        output.push_str(&format!(
            "{:<24} {:<28} {:<8} {:>10} {:>9} {:<5} {:<16}\n",
            truncate(&row.id, 24),
            truncate(&row.title, 28),
            row.ticker.as_deref().unwrap_or("-"),
            opt_num(row.current, ""),
            opt_num(row.pct, "%"),
            row.suggestion.as_str(),
            row.updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }

    output.push('\n');
    output.push_str(&format!("Total: {} entities", rows.len()));
    output
}

/// 엔티티 상세.
pub fn format_entity(entity: &Entity) -> String {
    let mut output = String::new();
    output.push_str(&format!("{} ({})\n", entity.title, entity.id));
    if !entity.description.is_empty() {
        output.push_str(&format!("{}\n", entity.description));
    }
    output.push('\n');

    output.push_str(&format!(
        "{:<8} {:>10} {:>10} {:>9} {:<5}\n",
        "TICKER", "BASIS", "CURRENT", "PCT", "SIG"
    ));
    for ticker in &entity.tickers {
        let suggestion = entity
            .analysis
            .as_ref()
            .and_then(|a| a.suggestion_for(ticker))
            .map(|s| s.as_str())
            .unwrap_or("-");
        output.push_str(&format!(
            "{:<8} {:>10} {:>10} {:>9} {:<5}\n",
            ticker,
            opt_num(entity.purchases.basis_for(ticker), ""),
            opt_num(entity.current_price(ticker), ""),
            opt_num(entity.pct_change(ticker), "%"),
            suggestion,
        ));
    }

    if let Some(analysis) = &entity.analysis {
        if !analysis.summary.is_empty() {
            output.push_str(&format!("\nSummary:\n{}\n", analysis.summary));
        }
    }
    if let Some(updated) = entity.updated_at {
        output.push_str(&format!("\nUpdated: {}", updated.format("%Y-%m-%d %H:%M:%S")));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::parse("csv").is_err());
    }

    #[test]
    fn test_rows_table_has_total() {
        let entity = Entity::new("p-1", "Tech", vec!["AAPL".to_string()]);
        let rows = vec![FeedRow::from_entity(&entity)];
        let table = format_rows(&rows);
        assert!(table.contains("AAPL"));
        assert!(table.contains("Hold"));
        assert!(table.ends_with("Total: 1 entities"));
    }

    #[test]
    fn test_truncate_long_title() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
