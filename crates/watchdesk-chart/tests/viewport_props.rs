//! 뷰포트 불변식 및 저장/복원 테스트.

use proptest::prelude::*;
use std::path::PathBuf;
use watchdesk_chart::{
    render, ChartLayout, FileViewportBackend, ViewportPersistence, ViewportState, ViewportStore,
    MIN_WINDOW,
};
use watchdesk_core::{Series, SeriesKey};

#[derive(Debug, Clone)]
enum Op {
    Pan(isize),
    Zoom(f64, f64),
    Hover(usize),
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-500isize..500).prop_map(Op::Pan),
        (0.05f64..20.0, 0.0f64..=1.0).prop_map(|(f, c)| Op::Zoom(f, c)),
        (0usize..1000).prop_map(Op::Hover),
        Just(Op::Reset),
    ]
}

fn apply(state: &mut ViewportState, op: &Op) {
    match op {
        Op::Pan(d) => state.pan(*d),
        Op::Zoom(f, c) => state.zoom(*f, *c),
        Op::Hover(i) => state.set_hover(Some(*i)),
        Op::Reset => state.reset(),
    }
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("watchdesk-{}-{}.json", name, std::process::id()))
}

proptest! {
    #[test]
    fn test_window_invariant_holds(len in 1usize..400, ops in prop::collection::vec(op(), 0..40)) {
        let mut state = ViewportState::full(SeriesKey::daily("AAPL"), len);
        for op in &ops {
            apply(&mut state, op);
            prop_assert!(state.start() < state.end());
            prop_assert!(state.end() <= len);
            prop_assert!(state.width() >= MIN_WINDOW.min(len));
            if let Some(h) = state.hover() {
                prop_assert!(h < state.width());
            }
        }
    }

    #[test]
    fn test_pan_preserves_width(len in 5usize..400, factor in 0.05f64..1.0, delta in -500isize..500) {
        let mut state = ViewportState::full(SeriesKey::daily("AAPL"), len);
        state.zoom(factor, 0.5);
        let width = state.width();
        state.pan(delta);
        prop_assert_eq!(state.width(), width);
    }

    #[test]
    fn test_load_clamps_into_shorter_series(
        start in 0usize..300,
        width in 1usize..300,
        len in 1usize..300,
    ) {
        let store = ViewportStore::in_memory();
        let key = SeriesKey::daily("MSFT");
        let long = ViewportState::clamped(key.clone(), start, start + width, 600).unwrap();
        store.save(&long).unwrap();

        let loaded = store.load(&key, len).unwrap();
        prop_assert!(loaded.start() < loaded.end());
        prop_assert!(loaded.end() <= len);
        prop_assert!(loaded.width() >= MIN_WINDOW.min(len));
    }
}

#[test]
fn test_five_point_zoom_scenario() {
    let series = Series::new(vec![1, 2, 3, 4, 5], vec![10.0, 12.0, 9.0, 15.0, 11.0]).unwrap();
    let mut state = ViewportState::full(SeriesKey::daily("AAPL"), series.len());
    assert_eq!((state.start(), state.end()), (0, 5));

    state.zoom(0.5, 1.0);
    assert_eq!(state.width(), 5);
    assert_eq!((state.start(), state.end()), (0, 5));

    let frame = render(&series, &state, None, &ChartLayout::default());
    assert_eq!(frame.polyline().unwrap().len(), 5);
}

#[test]
fn test_reset_save_load_round_trip() {
    let store = ViewportStore::in_memory();
    let key = SeriesKey::daily("AAPL");
    let mut state = ViewportState::full(key.clone(), 120);
    state.zoom(0.25, 0.4);
    state.pan(7);
    state.reset();
    store.save(&state).unwrap();

    let loaded = store.load(&key, 120).unwrap();
    assert!(loaded.is_full());
}

#[test]
fn test_file_backend_round_trip() {
    let path = temp_file("roundtrip");
    let _ = std::fs::remove_file(&path);

    let key = SeriesKey::new("TSLA", "1y", "1wk");
    let mut state = ViewportState::full(key.clone(), 52);
    state.zoom(0.5, 0.0);
    ViewportStore::file(&path).save(&state).unwrap();

    // 새 저장소 인스턴스에서 복원
    let loaded = ViewportStore::file(&path).load(&key, 52).unwrap();
    assert_eq!((loaded.start(), loaded.end()), (0, 26));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_corrupt_file_is_treated_as_empty() {
    let path = temp_file("corrupt");
    std::fs::write(&path, "{not json").unwrap();

    let backend = FileViewportBackend::new(&path);
    assert!(backend.read_all().unwrap().is_empty());

    let store = ViewportStore::file(&path);
    let key = SeriesKey::daily("AAPL");
    assert!(store.load_or_default(&key, 30).is_full());

    // 손상된 파일 위에 다시 저장 가능
    store.save(&ViewportState::full(key.clone(), 30)).unwrap();
    assert!(store.load(&key, 30).is_some());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_malformed_record_is_skipped() {
    let path = temp_file("partial");
    std::fs::write(
        &path,
        r#"[
            {"ticker": "AAPL", "period": "6mo", "interval": "1d", "start": "x", "end": 9},
            {"ticker": "MSFT", "period": "6mo", "interval": "1d", "start": 2, "end": 9}
        ]"#,
    )
    .unwrap();

    let store = ViewportStore::file(&path);
    assert!(store.load(&SeriesKey::daily("AAPL"), 20).is_none());
    let msft = store.load(&SeriesKey::daily("MSFT"), 20).unwrap();
    assert_eq!((msft.start(), msft.end()), (2, 9));

    let _ = std::fs::remove_file(&path);
}
