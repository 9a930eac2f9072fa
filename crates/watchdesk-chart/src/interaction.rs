//! 입력 이벤트 처리.
//!
//! 포인터/휠/키 입력을 뷰포트 전이(pan, zoom, hover)로 바꾸고, 전이가 끝날 때마다
//! 새 상태를 렌더링합니다. pan/zoom/reset 결과는 `ViewportStore`에 저장되며 호버는
//! 저장하지 않습니다.

use std::sync::Arc;
use tracing::{debug, warn};
use watchdesk_core::{Series, SeriesKey};

use crate::persist::ViewportStore;
use crate::render::{render, ChartLayout, Frame, PriceAnnotation};
use crate::viewport::ViewportState;

/// 휠/키 한 단계의 확대 비율.
pub const ZOOM_STEP: f64 = 0.8;

/// 키 입력.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    PanLeft,
    PanRight,
    ZoomIn,
    ZoomOut,
    Reset,
}

impl KeyCommand {
    /// 키 이름 해석 (`ArrowLeft`, `+`, `r` 등).
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" | "left" | "h" => Some(KeyCommand::PanLeft),
            "ArrowRight" | "right" | "l" => Some(KeyCommand::PanRight),
            "+" | "=" | "in" => Some(KeyCommand::ZoomIn),
            "-" | "_" | "out" => Some(KeyCommand::ZoomOut),
            "0" | "r" | "reset" => Some(KeyCommand::Reset),
            _ => None,
        }
    }
}

/// 입력 이벤트. 좌표는 차트 기준 픽셀.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64 },
    PointerMove { x: f64 },
    PointerUp { x: f64 },
    PointerLeave,
    /// 양수 delta는 축소, 음수는 확대
    Wheel { delta: f64, x: f64 },
    Key(KeyCommand),
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    origin_x: f64,
    origin_start: usize,
}

/// 시리즈 하나에 대한 상호작용 세션.
pub struct ChartSession {
    series: Series,
    state: ViewportState,
    store: Arc<ViewportStore>,
    layout: ChartLayout,
    annotation: Option<PriceAnnotation>,
    drag: Option<Drag>,
}

impl ChartSession {
    /// 저장된 창을 복원해 세션을 엽니다.
    pub fn open(
        key: SeriesKey,
        series: Series,
        store: Arc<ViewportStore>,
        layout: ChartLayout,
    ) -> Self {
        let state = store.load_or_default(&key, series.len());
        debug!(series = %key, start = state.start(), end = state.end(), "Chart session opened");
        Self {
            series,
            state,
            store,
            layout,
            annotation: None,
            drag: None,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// 현재가 주석 설정.
    pub fn set_annotation(&mut self, annotation: Option<PriceAnnotation>) {
        self.annotation = annotation;
    }

    /// 현재 상태 렌더링.
    pub fn frame(&self) -> Frame {
        render(
            &self.series,
            &self.state,
            self.annotation.as_ref(),
            &self.layout,
        )
    }

    /// 입력 하나를 처리하고 새 프레임을 반환합니다.
    pub fn handle(&mut self, event: InputEvent) -> Frame {
        let plot = self.layout.plot();

        match event {
            InputEvent::PointerDown { x } => {
                self.drag = Some(Drag {
                    origin_x: x,
                    origin_start: self.state.start(),
                });
            }
            InputEvent::PointerMove { x } => match self.drag {
                Some(drag) => {
                    let delta = self.drag_delta(drag, x);
                    self.state.pan(delta);
                }
                None => {
                    let index = plot.index_at(x, self.state.width());
                    self.state.set_hover(Some(index));
                }
            },
            InputEvent::PointerUp { x } => {
                if let Some(drag) = self.drag.take() {
                    let delta = self.drag_delta(drag, x);
                    self.state.pan(delta);
                    if self.state.start() != drag.origin_start {
                        self.persist();
                    }
                }
            }
            InputEvent::PointerLeave => {
                if self.drag.take().is_some() {
                    self.persist();
                }
                self.state.set_hover(None);
            }
            InputEvent::Wheel { delta, x } => {
                if delta != 0.0 && delta.is_finite() {
                    let factor = if delta > 0.0 { 1.0 / ZOOM_STEP } else { ZOOM_STEP };
                    self.state.zoom(factor, plot.fraction_at(x));
                    self.persist();
                }
            }
            InputEvent::Key(command) => self.apply_key(command),
        }

        self.frame()
    }

    /// 세션 종료. 호버를 지우고 창은 저장합니다.
    pub fn close(&mut self) {
        self.drag = None;
        self.state.set_hover(None);
        self.persist();
    }

    fn apply_key(&mut self, command: KeyCommand) {
        let step = (self.state.width() / 10).max(1) as isize;
        match command {
            KeyCommand::PanLeft => self.state.pan(-step),
            KeyCommand::PanRight => self.state.pan(step),
            KeyCommand::ZoomIn => self.state.zoom(ZOOM_STEP, 0.5),
            KeyCommand::ZoomOut => self.state.zoom(1.0 / ZOOM_STEP, 0.5),
            KeyCommand::Reset => self.state.reset(),
        }
        self.persist();
    }

    /// 드래그 거리(px)를 포인트 수로 환산. 오른쪽으로 끌면 과거 방향.
    fn drag_delta(&self, drag: Drag, x: f64) -> isize {
        let width = self.state.width();
        let plot_width = self.layout.plot().width();
        if width < 2 || plot_width <= 0.0 {
            return 0;
        }
        let px_per_point = plot_width / (width - 1) as f64;
        let points = -((x - drag.origin_x) / px_per_point).round() as isize;
        drag.origin_start as isize + points - self.state.start() as isize
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!(series = %self.state.key, "Failed to save viewport: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(len: usize) -> (ChartSession, Arc<ViewportStore>) {
        let timestamps: Vec<i64> = (0..len as i64).map(|i| i * 86_400_000).collect();
        let closes: Vec<f64> = (0..len).map(|i| 100.0 + i as f64).collect();
        let series = Series::new(timestamps, closes).unwrap();
        let store = Arc::new(ViewportStore::in_memory());
        let session = ChartSession::open(
            SeriesKey::daily("AAPL"),
            series,
            store.clone(),
            ChartLayout::default(),
        );
        (session, store)
    }

    #[test]
    fn test_key_parse() {
        assert_eq!(KeyCommand::parse("ArrowLeft"), Some(KeyCommand::PanLeft));
        assert_eq!(KeyCommand::parse("+"), Some(KeyCommand::ZoomIn));
        assert_eq!(KeyCommand::parse("r"), Some(KeyCommand::Reset));
        assert_eq!(KeyCommand::parse("q"), None);
    }

    #[test]
    fn test_wheel_zooms_around_pointer_and_persists() {
        let (mut s, store) = session(100);
        let plot = ChartLayout::default().plot();

        s.handle(InputEvent::Wheel {
            delta: -1.0,
            x: plot.right,
        });
        assert_eq!((s.state().start(), s.state().end()), (20, 100));

        let saved = store.load(&SeriesKey::daily("AAPL"), 100).unwrap();
        assert_eq!((saved.start(), saved.end()), (20, 100));
    }

    #[test]
    fn test_wheel_centers_new_window_on_pointer() {
        let (mut s, _) = session(100);
        let plot = ChartLayout::default().plot();

        s.handle(InputEvent::Key(KeyCommand::ZoomIn));
        assert_eq!((s.state().start(), s.state().end()), (10, 90));

        // 창의 3/4 지점(인덱스 70)을 중심으로 64포인트
        s.handle(InputEvent::Wheel {
            delta: -1.0,
            x: plot.left + plot.width() * 0.75,
        });
        assert_eq!((s.state().start(), s.state().end()), (36, 100));

        // 1/4 지점(인덱스 52)을 중심으로 51포인트
        s.handle(InputEvent::Wheel {
            delta: -1.0,
            x: plot.left + plot.width() * 0.25,
        });
        assert_eq!((s.state().start(), s.state().end()), (27, 78));
    }

    #[test]
    fn test_pointer_move_sets_hover_and_leave_clears() {
        let (mut s, _) = session(10);
        let plot = ChartLayout::default().plot();

        let frame = s.handle(InputEvent::PointerMove { x: plot.right });
        assert_eq!(s.state().hover(), Some(9));
        assert!(frame.texts().iter().any(|t| t.contains("109.00")));

        s.handle(InputEvent::PointerLeave);
        assert_eq!(s.state().hover(), None);
    }

    #[test]
    fn test_drag_right_pans_to_past() {
        let (mut s, store) = session(100);
        s.handle(InputEvent::Key(KeyCommand::ZoomIn));
        s.handle(InputEvent::Key(KeyCommand::ZoomIn));
        let before = s.state().start();
        let width = s.state().width();
        let plot = ChartLayout::default().plot();
        let px_per_point = plot.width() / (width - 1) as f64;

        s.handle(InputEvent::PointerDown { x: 400.0 });
        s.handle(InputEvent::PointerMove {
            x: 400.0 + px_per_point * 5.0,
        });
        assert_eq!(s.state().start(), before - 5);
        s.handle(InputEvent::PointerUp {
            x: 400.0 + px_per_point * 10.0,
        });
        assert_eq!(s.state().start(), before - 10);
        assert_eq!(s.state().width(), width);

        let saved = store.load(&SeriesKey::daily("AAPL"), 100).unwrap();
        assert_eq!(saved.start(), before - 10);
    }

    #[test]
    fn test_session_restores_saved_window() {
        let (mut s, store) = session(100);
        s.handle(InputEvent::Key(KeyCommand::ZoomIn));
        let saved = (s.state().start(), s.state().end());

        let reopened = ChartSession::open(
            SeriesKey::daily("AAPL"),
            s.series().clone(),
            store,
            ChartLayout::default(),
        );
        assert_eq!((reopened.state().start(), reopened.state().end()), saved);
    }

    #[test]
    fn test_reset_key_restores_full_window() {
        let (mut s, _) = session(50);
        s.handle(InputEvent::Key(KeyCommand::ZoomIn));
        s.handle(InputEvent::Key(KeyCommand::PanLeft));
        s.handle(InputEvent::Key(KeyCommand::Reset));
        assert!(s.state().is_full());
    }
}
