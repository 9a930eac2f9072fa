//! 차트 뷰포트 상태.
//!
//! 고정 길이 시리즈 위의 보이는 구간 `[start, end)`와 호버 위치를 관리합니다.
//! 모든 전이 후에 다음 불변식이 유지됩니다:
//!
//! - `0 <= start < end <= len` (빈 시리즈는 `start == end == 0`)
//! - `end - start >= min(MIN_WINDOW, len)`
//!
//! 호버 위치는 메모리에만 존재하며 저장되지 않습니다.

use serde::Serialize;
use watchdesk_core::SeriesKey;

/// 최소 창 너비 (포인트 수).
pub const MIN_WINDOW: usize = 5;

/// 길이 `len`인 시리즈의 최소 창 너비.
pub fn min_window(len: usize) -> usize {
    MIN_WINDOW.min(len)
}

/// 시리즈 하나에 대한 뷰포트 상태.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewportState {
    /// 시리즈 식별자
    pub key: SeriesKey,
    /// 창 시작 인덱스 (포함)
    start: usize,
    /// 창 끝 인덱스 (제외)
    end: usize,
    /// 창 내부 기준 호버 인덱스
    hover: Option<usize>,
    /// 전체 시리즈 길이
    len: usize,
}

impl ViewportState {
    /// 전체 시리즈를 보여주는 기본 상태.
    pub fn full(key: SeriesKey, len: usize) -> Self {
        Self {
            key,
            start: 0,
            end: len,
            hover: None,
            len,
        }
    }

    /// 주어진 구간으로 상태 생성. 구간은 시리즈 범위 안으로 맞춰집니다.
    ///
    /// 창 너비는 가능한 한 유지하고, 끝이 시리즈를 벗어나면 왼쪽으로 밀어냅니다.
    /// `start >= end`처럼 구조적으로 잘못된 구간은 `None`.
    pub fn clamped(key: SeriesKey, start: usize, end: usize, len: usize) -> Option<Self> {
        if start >= end || len == 0 {
            return None;
        }
        let width = (end - start).clamp(min_window(len), len);
        let start = start.min(len - width);
        Some(Self {
            key,
            start,
            end: start + width,
            hover: None,
            len,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// 창 기준 호버 인덱스.
    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    /// 시리즈 기준 호버 인덱스.
    pub fn hover_absolute(&self) -> Option<usize> {
        self.hover.map(|i| self.start + i)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 현재 창 너비.
    pub fn width(&self) -> usize {
        self.end - self.start
    }

    /// 전체 시리즈를 보여주고 있는지 여부.
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end == self.len
    }

    /// 창을 `delta` 포인트만큼 이동. 너비는 유지됩니다.
    pub fn pan(&mut self, delta: isize) {
        let width = self.width();
        let max_start = self.len - width;
        let shifted = (self.start as isize).saturating_add(delta);
        self.start = shifted.clamp(0, max_start as isize) as usize;
        self.end = self.start + width;
        self.clamp_hover();
    }

    /// 확대/축소.
    ///
    /// `factor < 1`이면 확대, `> 1`이면 축소. `center_fraction`은 현재 창 안의
    /// 기준점 위치(0.0 = 왼쪽 끝, 1.0 = 오른쪽 끝)이며 새 창은 그 기준점을
    /// 중심으로 놓인 뒤 시리즈 범위 안으로 밀려 들어옵니다.
    pub fn zoom(&mut self, factor: f64, center_fraction: f64) {
        if !factor.is_finite() || factor <= 0.0 || self.len == 0 {
            return;
        }
        let fraction = if center_fraction.is_finite() {
            center_fraction.clamp(0.0, 1.0)
        } else {
            0.5
        };

        let width = self.width() as f64;
        let new_width = ((width * factor).round() as usize).clamp(min_window(self.len), self.len);

        let center = self.start as f64 + fraction * width;
        let start = (center - new_width as f64 / 2.0).round().max(0.0) as usize;
        self.start = start.min(self.len - new_width);
        self.end = self.start + new_width;
        self.clamp_hover();
    }

    /// 호버 인덱스 설정. 창 범위 `[0, width)` 안으로 맞춰집니다.
    pub fn set_hover(&mut self, index: Option<usize>) {
        self.hover = match index {
            Some(i) if self.width() > 0 => Some(i.min(self.width() - 1)),
            _ => None,
        };
    }

    /// 전체 구간으로 되돌리고 호버를 지웁니다.
    pub fn reset(&mut self) {
        self.start = 0;
        self.end = self.len;
        self.hover = None;
    }

    fn clamp_hover(&mut self) {
        let hover = self.hover;
        self.set_hover(hover);
    }
}
