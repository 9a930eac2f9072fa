//! 클라이언트 공유 상태.
//!
//! 시작 시 한 번 만들어 필요한 컴포넌트에 참조로 넘깁니다. 저장소,
//! 스로틀, 스트림 관리자는 모두 `Arc`로 공유됩니다.

use std::sync::Arc;
use watchdesk_core::AppConfig;

use crate::error::ClientResult;
use crate::feed::FeedPresenter;
use crate::http::HttpWatchApi;
use crate::store::EntityStore;
use crate::stream::StreamManager;
use crate::throttle::RefreshThrottler;
use crate::traits::WatchApi;

/// 클라이언트 공유 상태.
#[derive(Clone)]
pub struct ClientContext {
    /// 원격 API
    pub api: Arc<dyn WatchApi>,
    /// 엔티티 저장소 - 유일한 원본
    pub store: Arc<EntityStore>,
    /// 스냅샷 갱신 스로틀
    pub throttler: Arc<RefreshThrottler>,
    /// 분석 스트림 관리자
    pub streams: Arc<StreamManager>,
    /// 목록 화면
    pub feed: Arc<FeedPresenter>,
}

impl ClientContext {
    /// 설정으로 HTTP 클라이언트를 만들어 생성.
    pub fn from_config(config: &AppConfig) -> ClientResult<Self> {
        let api: Arc<dyn WatchApi> = Arc::new(HttpWatchApi::new(&config.api)?);
        Ok(Self::with_api(api, config))
    }

    /// 주어진 API 구현으로 생성.
    pub fn with_api(api: Arc<dyn WatchApi>, config: &AppConfig) -> Self {
        let store = Arc::new(EntityStore::new());
        let throttler = Arc::new(RefreshThrottler::new(
            Arc::clone(&api),
            Arc::clone(&store),
            config.refresh.cooldown(),
        ));
        let streams = Arc::new(StreamManager::new(Arc::clone(&api), Arc::clone(&store)));
        let feed = Arc::new(FeedPresenter::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&throttler),
            config.feed.clone(),
        ));

        Self {
            api,
            store,
            throttler,
            streams,
            feed,
        }
    }

    /// 종료 처리. 모든 스트림을 취소합니다.
    pub async fn shutdown(&self) {
        self.streams.close_view().await;
        self.streams.shutdown().await;
    }
}
