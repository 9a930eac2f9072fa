//! HTTP 기반 `WatchApi` 구현.
//!
//! 서버 라우트:
//! - `GET/POST /api/stocks`, `PUT/DELETE /api/stocks/{id}`, `POST /api/stocks/reorder`
//! - `GET /api/refresh-snapshot/{id}`, `GET /api/summarize/{id}`, `POST /api/analyze/{id}`
//! - `POST /api/analyze-all`
//! - `GET /api/analyze-stream/{id}` (SSE)
//! - `GET /api/chart?ticker=&period=&interval=`

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, error, warn};
use watchdesk_core::{
    AnalysisEvent, ApiConfig, Entity, EntityDraft, EntityUpdate, Series, SeriesKey,
};

use crate::error::{ClientError, ClientResult};
use crate::sse::SseDecoder;
use crate::traits::{AnalysisStream, BatchAnalysis, SnapshotRefresh, WatchApi};

/// 서버 에러 응답 본문 (`{"message": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// 일괄 분석 응답의 원소 하나. `error` 키가 있으면 실패로 봅니다.
fn parse_batch_item(value: serde_json::Value) -> Option<BatchAnalysis> {
    if let Some(error) = value.get("error") {
        let error = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let id = value.get("id").and_then(|v| v.as_str()).map(str::to_string);
        return Some(BatchAnalysis::Failed { id, error });
    }
    match serde_json::from_value::<Entity>(value) {
        Ok(entity) => Some(BatchAnalysis::Analyzed(entity)),
        Err(e) => {
            warn!("Discarding malformed batch analysis record: {}", e);
            None
        }
    }
}

/// HTTP 클라이언트.
#[derive(Debug, Clone)]
pub struct HttpWatchApi {
    base_url: String,
    client: Client,
    /// 분석 스트림 전용 (타임아웃 없음)
    stream_client: Client,
}

impl HttpWatchApi {
    /// 설정으로 클라이언트 생성.
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Internal(format!("HTTP client 생성 실패: {}", e)))?;

        // 스트림은 전송 에러나 종료 이벤트로만 끝남
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Internal(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        })
    }

    /// 기본 URL만 지정해 생성.
    pub fn with_base_url(base_url: impl Into<String>) -> ClientResult<Self> {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..Default::default()
        };
        Self::new(&config)
    }

    /// 서버 기본 URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 상태 코드를 확인하고 실패 응답을 에러로 변환합니다.
    async fn check(response: Response, target: &str) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            debug!(target_id = %target, "Not found: {}", message);
            return Err(ClientError::NotFound(target.to_string()));
        }

        error!("Request failed: {} - {}", status, message);
        Err(ClientError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &str,
    ) -> ClientResult<T> {
        let response = Self::check(request.send().await?, target).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(ClientError::from)
    }

    async fn send_unit(&self, request: RequestBuilder, target: &str) -> ClientResult<()> {
        Self::check(request.send().await?, target).await?;
        Ok(())
    }
}

#[async_trait]
impl WatchApi for HttpWatchApi {
    async fn list_entities(&self) -> ClientResult<Vec<Entity>> {
        let raw: Vec<serde_json::Value> = self
            .send_json(self.client.get(self.url("/api/stocks")), "stocks")
            .await?;

        // 손상된 레코드만 버리고 나머지는 사용
        let total = raw.len();
        let entities: Vec<Entity> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Entity>(value) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!("Discarding malformed entity record: {}", e);
                    None
                }
            })
            .collect();

        debug!(total, parsed = entities.len(), "Entity list fetched");
        Ok(entities)
    }

    async fn create_entity(&self, draft: &EntityDraft) -> ClientResult<Entity> {
        self.send_json(self.client.post(self.url("/api/stocks")).json(draft), "stocks")
            .await
    }

    async fn update_entity(&self, id: &str, update: &EntityUpdate) -> ClientResult<Entity> {
        let url = self.url(&format!("/api/stocks/{}", id));
        self.send_json(self.client.put(url).json(update), id).await
    }

    async fn delete_entity(&self, id: &str) -> ClientResult<()> {
        let url = self.url(&format!("/api/stocks/{}", id));
        self.send_unit(self.client.delete(url), id).await
    }

    async fn reorder_entities(&self, ids: &[String]) -> ClientResult<()> {
        let body = serde_json::json!({ "order": ids });
        self.send_unit(
            self.client.post(self.url("/api/stocks/reorder")).json(&body),
            "reorder",
        )
        .await
    }

    async fn refresh_snapshot(&self, id: &str) -> ClientResult<SnapshotRefresh> {
        let url = self.url(&format!("/api/refresh-snapshot/{}", id));
        self.send_json(self.client.get(url), id).await
    }

    async fn summarize(&self, id: &str) -> ClientResult<Entity> {
        let url = self.url(&format!("/api/summarize/{}", id));
        self.send_json(self.client.get(url), id).await
    }

    async fn run_analysis(&self, id: &str) -> ClientResult<Entity> {
        let url = self.url(&format!("/api/analyze/{}", id));
        self.send_json(self.client.post(url), id).await
    }

    async fn analyze_all(&self) -> ClientResult<Vec<BatchAnalysis>> {
        // 엔티티 수에 비례해 오래 걸리므로 타임아웃 없는 클라이언트 사용
        let raw: Vec<serde_json::Value> = self
            .send_json(
                self.stream_client.post(self.url("/api/analyze-all")),
                "analyze-all",
            )
            .await?;
        let results: Vec<BatchAnalysis> = raw.into_iter().filter_map(parse_batch_item).collect();
        debug!(count = results.len(), "Batch analysis finished");
        Ok(results)
    }

    async fn open_analysis_stream(&self, id: &str) -> ClientResult<AnalysisStream> {
        let url = self.url(&format!("/api/analyze-stream/{}", id));
        let request = self
            .stream_client
            .get(url)
            .header(ACCEPT, "text/event-stream");
        let response = Self::check(request.send().await?, id).await?;

        let bytes = response.bytes_stream().boxed();
        let state = (bytes, SseDecoder::new(), VecDeque::<String>::new(), false);

        let events = stream::unfold(
            state,
            |(mut bytes, mut decoder, mut pending, mut eof)| async move {
                loop {
                    if let Some(data) = pending.pop_front() {
                        let item = AnalysisEvent::parse(&data).map_err(ClientError::from);
                        return Some((item, (bytes, decoder, pending, eof)));
                    }
                    if eof {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            eof = true;
                            let err = ClientError::NetworkError(e.to_string());
                            return Some((Err(err), (bytes, decoder, pending, eof)));
                        }
                        None => {
                            eof = true;
                            pending.extend(decoder.finish());
                        }
                    }
                }
            },
        );

        Ok(events.boxed())
    }

    async fn fetch_chart(&self, key: &SeriesKey) -> ClientResult<Series> {
        let request = self.client.get(self.url("/api/chart")).query(&[
            ("ticker", key.ticker.as_str()),
            ("period", key.period.as_str()),
            ("interval", key.interval.as_str()),
        ]);
        self.send_json(request, &key.ticker).await
    }
}
