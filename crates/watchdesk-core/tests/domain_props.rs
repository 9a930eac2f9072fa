//! 도메인 타입 속성 테스트.

use proptest::prelude::*;
use serde_json::json;
use watchdesk_core::{percent_change, EntityDraft, Series};

proptest! {
    #[test]
    fn test_percent_change_sign_follows_price(
        purchase in 0.01f64..10_000.0,
        current in 0.0f64..10_000.0,
    ) {
        let pct = percent_change(Some(purchase), Some(current)).unwrap();
        prop_assert!(pct.is_finite());
        if current > purchase {
            prop_assert!(pct > 0.0);
        } else if current < purchase {
            prop_assert!(pct < 0.0);
        }
    }

    #[test]
    fn test_percent_change_without_basis_is_none(current in 0.0f64..10_000.0) {
        prop_assert_eq!(percent_change(None, Some(current)), None);
        prop_assert_eq!(percent_change(Some(0.0), Some(current)), None);
    }

    #[test]
    fn test_second_timestamps_scale_to_millis(secs in 1_000_000_000i64..2_000_000_000) {
        let series: Series = serde_json::from_value(json!({
            "timestamps": [secs],
            "closes": [1.0]
        }))
        .unwrap();
        prop_assert_eq!(series.timestamps()[0], secs * 1000);
    }

    #[test]
    fn test_window_never_exceeds_series(
        len in 0usize..50,
        start in 0usize..80,
        span in 0usize..80,
    ) {
        let timestamps: Vec<i64> = (0..len as i64).collect();
        let closes: Vec<f64> = (0..len).map(|i| i as f64).collect();
        let series = Series::new(timestamps, closes).unwrap();

        let (ts, cs) = series.window(start, start + span);
        prop_assert_eq!(ts.len(), cs.len());
        prop_assert!(ts.len() <= len);
    }

    #[test]
    fn test_valid_tickers_survive_prepare(tickers in prop::collection::vec("[a-z]{1,5}", 1..10)) {
        let draft = EntityDraft::new("Basket", tickers.clone()).prepare().unwrap();
        prop_assert!(draft.tickers.iter().all(|t| t.chars().all(|c| c.is_ascii_uppercase())));
        prop_assert!(draft.tickers.len() <= tickers.len());
    }
}
