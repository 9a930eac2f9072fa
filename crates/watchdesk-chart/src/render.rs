//! 차트 렌더러.
//!
//! `(시리즈, 뷰포트, 현재가 주석)` → 그리기 명령 목록으로 변환하는 순수 함수입니다.
//! 같은 입력에는 항상 같은 명령이 나옵니다.

use serde::Serialize;
use watchdesk_core::{ChartConfig, Entity, Series};

use crate::format::{format_pct, format_timestamp, format_value, TimeGranularity};
use crate::viewport::ViewportState;

/// 빈 구간 안내 문구.
pub const NO_DATA: &str = "No data";

// =============================================================================
// 레이아웃
// =============================================================================

/// 출력 크기와 여백.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// 수평 그리드 분할 수
    pub horizontal_divisions: usize,
    /// 수직 그리드 한 칸의 목표 너비
    pub vertical_spacing_px: f64,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self::from_config(&ChartConfig::default())
    }
}

impl ChartLayout {
    pub fn from_config(config: &ChartConfig) -> Self {
        Self {
            width: config.width.max(1.0),
            height: config.height.max(1.0),
            margin_left: 64.0,
            margin_right: 16.0,
            margin_top: 12.0,
            margin_bottom: 28.0,
            horizontal_divisions: config.horizontal_divisions.max(1),
            vertical_spacing_px: config.vertical_spacing_px.max(1.0),
        }
    }

    /// 그래프가 그려지는 영역.
    pub fn plot(&self) -> PlotArea {
        let left = self.margin_left.min(self.width);
        let top = self.margin_top.min(self.height);
        PlotArea {
            left,
            top,
            right: (self.width - self.margin_right).max(left),
            bottom: (self.height - self.margin_bottom).max(top),
        }
    }
}

/// 그래프 영역 (픽셀).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PlotArea {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// 창 안의 `index`번째 포인트 x 좌표. 포인트가 하나면 가운데.
    pub fn x_at(&self, index: usize, count: usize) -> f64 {
        if count <= 1 {
            return self.left + self.width() / 2.0;
        }
        self.left + index as f64 * self.width() / (count - 1) as f64
    }

    /// x 좌표에 가장 가까운 창 내부 인덱스.
    pub fn index_at(&self, x: f64, count: usize) -> usize {
        if count <= 1 || self.width() <= 0.0 {
            return 0;
        }
        let fraction = ((x - self.left) / self.width()).clamp(0.0, 1.0);
        (fraction * (count - 1) as f64).round() as usize
    }

    /// x 좌표의 가로 비율 (0.0 ~ 1.0).
    pub fn fraction_at(&self, x: f64) -> f64 {
        if self.width() <= 0.0 {
            return 0.5;
        }
        ((x - self.left) / self.width()).clamp(0.0, 1.0)
    }
}

// =============================================================================
// 그리기 명령
// =============================================================================

/// 색상 역할.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Paint {
    Background,
    Grid,
    Axis,
    Price,
    Guide,
    Tag,
    TagText,
    LastPrice,
    Muted,
}

/// 텍스트 정렬.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Start,
    Middle,
    End,
}

/// 그리기 명령.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: Paint,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: Paint,
        dashed: bool,
    },
    Polyline {
        points: Vec<[f64; 2]>,
        stroke: Paint,
    },
    Circle {
        x: f64,
        y: f64,
        r: f64,
        fill: Paint,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        align: Align,
        paint: Paint,
    },
}

/// 렌더 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    /// 모든 텍스트.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 빈 구간 안내 프레임인지 여부.
    pub fn is_placeholder(&self) -> bool {
        self.texts().contains(&NO_DATA)
    }

    /// 가격 선.
    pub fn polyline(&self) -> Option<&[[f64; 2]]> {
        self.commands.iter().find_map(|c| match c {
            DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }

    /// 특정 역할의 선 개수.
    pub fn line_count(&self, paint: Paint) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { stroke, .. } if *stroke == paint))
            .count()
    }
}

/// 현재가 주석.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceAnnotation {
    pub current: f64,
    pub pct: Option<f64>,
}

impl PriceAnnotation {
    /// 엔티티 스냅샷에서 종목의 현재가를 읽습니다.
    pub fn for_ticker(entity: &Entity, ticker: &str) -> Option<Self> {
        let current = entity.current_price(ticker)?;
        if !current.is_finite() {
            return None;
        }
        Some(Self {
            current,
            pct: entity.pct_change(ticker),
        })
    }

    fn label(&self) -> String {
        match self.pct {
            Some(pct) => format!("{} ({})", format_value(self.current), format_pct(pct)),
            None => format_value(self.current),
        }
    }
}

// =============================================================================
// 렌더링
// =============================================================================

/// 값 축 범위.
#[derive(Debug, Clone, Copy)]
struct ValueRange {
    lo: f64,
    hi: f64,
}

impl ValueRange {
    fn of(closes: &[f64]) -> Self {
        let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
        let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        let pad = if range > 0.0 {
            range * 0.05
        } else if min.abs() > 0.0 {
            min.abs() * 0.01
        } else {
            1.0
        };
        Self {
            lo: min - pad,
            hi: max + pad,
        }
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }

    fn y(&self, value: f64, plot: &PlotArea) -> f64 {
        plot.bottom - (value - self.lo) / (self.hi - self.lo) * plot.height()
    }
}

/// 현재 뷰포트를 그립니다.
pub fn render(
    series: &Series,
    view: &ViewportState,
    annotation: Option<&PriceAnnotation>,
    layout: &ChartLayout,
) -> Frame {
    let plot = layout.plot();
    let mut commands = vec![DrawCommand::Rect {
        x: 0.0,
        y: 0.0,
        w: layout.width,
        h: layout.height,
        fill: Paint::Background,
    }];

    let (timestamps, closes) = series.window(view.start(), view.end());
    if closes.is_empty() {
        commands.push(DrawCommand::Text {
            x: layout.width / 2.0,
            y: layout.height / 2.0,
            text: NO_DATA.to_string(),
            align: Align::Middle,
            paint: Paint::Muted,
        });
        return Frame {
            width: layout.width,
            height: layout.height,
            commands,
        };
    }

    let range = ValueRange::of(closes);
    draw_value_grid(&mut commands, &plot, range, layout.horizontal_divisions);
    draw_time_grid(&mut commands, &plot, timestamps, layout.vertical_spacing_px);

    let count = closes.len();
    commands.push(DrawCommand::Polyline {
        points: closes
            .iter()
            .enumerate()
            .map(|(i, close)| [plot.x_at(i, count), range.y(*close, &plot)])
            .collect(),
        stroke: Paint::Price,
    });

    if let Some(annotation) = annotation {
        draw_last_price(&mut commands, &plot, range, annotation);
    }

    if let Some(index) = view.hover().filter(|i| *i < count) {
        draw_hover(&mut commands, &plot, range, index, count, timestamps[index], closes[index]);
    }

    Frame {
        width: layout.width,
        height: layout.height,
        commands,
    }
}

fn draw_value_grid(
    commands: &mut Vec<DrawCommand>,
    plot: &PlotArea,
    range: ValueRange,
    divisions: usize,
) {
    let step_px = plot.height() / divisions as f64;
    let step_value = (range.hi - range.lo) / divisions as f64;

    for i in 0..=divisions {
        let y = plot.top + i as f64 * step_px;
        commands.push(DrawCommand::Line {
            x1: plot.left,
            y1: y,
            x2: plot.right,
            y2: y,
            stroke: Paint::Grid,
            dashed: false,
        });
        commands.push(DrawCommand::Text {
            x: plot.left - 6.0,
            y: y + 4.0,
            text: format_value(range.hi - i as f64 * step_value),
            align: Align::End,
            paint: Paint::Axis,
        });
    }
}

fn draw_time_grid(
    commands: &mut Vec<DrawCommand>,
    plot: &PlotArea,
    timestamps: &[i64],
    spacing_px: f64,
) {
    let count = timestamps.len();
    // 너비에 비례하는 분할 수
    let divisions = ((plot.width() / spacing_px).floor() as usize).max(1);
    let span = timestamps[count - 1] - timestamps[0];
    let granularity = TimeGranularity::for_span(span);

    for i in 0..=divisions {
        let x = plot.left + i as f64 * plot.width() / divisions as f64;
        commands.push(DrawCommand::Line {
            x1: x,
            y1: plot.top,
            x2: x,
            y2: plot.bottom,
            stroke: Paint::Grid,
            dashed: false,
        });

        let index = plot.index_at(x, count);
        commands.push(DrawCommand::Text {
            x,
            y: plot.bottom + 16.0,
            text: granularity.format(timestamps[index]),
            align: Align::Middle,
            paint: Paint::Axis,
        });
    }
}

fn draw_last_price(
    commands: &mut Vec<DrawCommand>,
    plot: &PlotArea,
    range: ValueRange,
    annotation: &PriceAnnotation,
) {
    if !range.contains(annotation.current) {
        return;
    }
    let y = range.y(annotation.current, plot);
    commands.push(DrawCommand::Line {
        x1: plot.left,
        y1: y,
        x2: plot.right,
        y2: y,
        stroke: Paint::LastPrice,
        dashed: true,
    });
    commands.push(DrawCommand::Text {
        x: plot.right - 4.0,
        y: (y - 4.0).max(plot.top + 10.0),
        text: annotation.label(),
        align: Align::End,
        paint: Paint::LastPrice,
    });
}

const TAG_HEIGHT: f64 = 20.0;
const TAG_CHAR_WIDTH: f64 = 7.0;

fn draw_hover(
    commands: &mut Vec<DrawCommand>,
    plot: &PlotArea,
    range: ValueRange,
    index: usize,
    count: usize,
    timestamp: i64,
    close: f64,
) {
    let x = plot.x_at(index, count);
    let y = range.y(close, plot);

    commands.push(DrawCommand::Line {
        x1: x,
        y1: plot.top,
        x2: x,
        y2: plot.bottom,
        stroke: Paint::Guide,
        dashed: false,
    });
    commands.push(DrawCommand::Circle {
        x,
        y,
        r: 3.0,
        fill: Paint::Price,
    });

    // 태그는 그래프 영역 밖으로 나가지 않음
    let text = format!("{} · {}", format_value(close), format_timestamp(timestamp));
    let tag_w = (text.chars().count() as f64 * TAG_CHAR_WIDTH + 12.0).min(plot.width());
    let tag_h = TAG_HEIGHT.min(plot.height());
    let tag_x = (x - tag_w / 2.0).clamp(plot.left, plot.right - tag_w);
    let tag_y = (y - tag_h - 8.0).clamp(plot.top, plot.bottom - tag_h);

    commands.push(DrawCommand::Rect {
        x: tag_x,
        y: tag_y,
        w: tag_w,
        h: tag_h,
        fill: Paint::Tag,
    });
    commands.push(DrawCommand::Text {
        x: tag_x + tag_w / 2.0,
        y: tag_y + tag_h - 6.0,
        text,
        align: Align::Middle,
        paint: Paint::TagText,
    });
}
