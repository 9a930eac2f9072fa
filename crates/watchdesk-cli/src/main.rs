//! 관심종목 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 목록 조회
//! watchdesk list
//!
//! # 관심 그룹 생성
//! watchdesk create -t "반도체" --tickers NVDA,AMD --purchase NVDA=100
//!
//! # 분석 스트림 추적
//! watchdesk analyze <ID> --stream
//!
//! # 전체 재분석
//! watchdesk analyze --all
//!
//! # 차트 확대 후 호버
//! watchdesk chart -s AAPL -a key:+ -a hover:400
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use watchdesk_client::{ClientContext, StreamState};
use watchdesk_core::{init_logging, AppConfig, LogConfig, DEFAULT_INTERVAL, DEFAULT_PERIOD};

use watchdesk_cli::commands::{analyze, chart, entities, output::OutputFormat, refresh};

#[derive(Parser)]
#[command(name = "watchdesk")]
#[command(about = "Watchdesk CLI - 관심종목 그룹 관리 및 분석", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: String,

    /// 서버 URL (설정 파일보다 우선)
    #[arg(long, global = true)]
    server: Option<String>,

    /// 출력 형식 (table, json)
    #[arg(short, long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 엔티티 목록 조회
    List,

    /// 엔티티 상세 조회
    Show {
        /// 엔티티 ID
        id: String,
    },

    /// 엔티티 생성
    Create {
        /// 제목
        #[arg(short, long)]
        title: String,

        /// 설명
        #[arg(short, long)]
        description: Option<String>,

        /// 종목 목록 (쉼표 구분 또는 반복)
        #[arg(long, required = true)]
        tickers: Vec<String>,

        /// 매입가 (TICKER=PRICE, 반복 가능)
        #[arg(long)]
        purchase: Vec<String>,
    },

    /// 엔티티 수정
    Update {
        /// 엔티티 ID
        id: String,

        /// 제목
        #[arg(short, long)]
        title: Option<String>,

        /// 설명
        #[arg(short, long)]
        description: Option<String>,

        /// 종목 목록 (쉼표 구분 또는 반복)
        #[arg(long)]
        tickers: Vec<String>,

        /// 매입가 (TICKER=PRICE, 반복 가능)
        #[arg(long)]
        purchase: Vec<String>,
    },

    /// 엔티티 삭제
    Delete {
        /// 엔티티 ID
        id: String,
    },

    /// 목록 순서 저장
    Reorder {
        /// 새 순서의 엔티티 ID 목록
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// 스냅샷 갱신 (ID 생략 시 전체)
    Refresh {
        /// 엔티티 ID 목록
        ids: Vec<String>,
    },

    /// 요약 생성
    Summarize {
        /// 엔티티 ID
        id: String,
    },

    /// 분석 실행
    Analyze {
        /// 엔티티 ID
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// 스트림으로 진행 상황 추적
        #[arg(long, conflicts_with = "all")]
        stream: bool,

        /// 모든 엔티티 재분석
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// 차트 뷰포트 조작 및 렌더링
    Chart {
        /// 종목 심볼
        #[arg(short, long)]
        symbol: String,

        /// 기간 (예: 1mo, 6mo, 1y)
        #[arg(short, long, default_value = DEFAULT_PERIOD)]
        period: String,

        /// 간격 (예: 1d, 1wk)
        #[arg(short, long, default_value = DEFAULT_INTERVAL)]
        interval: String,

        /// 현재가 주석용 엔티티 ID
        #[arg(short, long)]
        entity: Option<String>,

        /// 입력 동작 (key:+, wheel:-1@400, hover:400, drag:400->300, leave)
        #[arg(short, long = "action")]
        actions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(server) = cli.server {
        config.api.base_url = server;
    }

    init_logging(&LogConfig::from_config(&config.logging).with_env_overrides())
        .context("Failed to initialize logging")?;

    let format = OutputFormat::parse(&cli.format)?;
    let ctx = ClientContext::from_config(&config)?;
    info!(server = %config.api.base_url, "Watchdesk client ready");

    let result = execute(&ctx, &config, cli.command, format).await;
    ctx.shutdown().await;

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}

async fn execute(
    ctx: &ClientContext,
    config: &AppConfig,
    command: Commands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::List => {
            entities::list(ctx, format).await?;
        }

        Commands::Show { id } => entities::show(ctx, &id, format).await?,

        Commands::Create {
            title,
            description,
            tickers,
            purchase,
        } => {
            let input = entities::EntityInput {
                title: Some(title),
                description,
                tickers,
                purchases: purchase,
            };
            let entity = entities::create(ctx, input).await?;
            println!("생성 완료: {} ({})", entity.title, entity.id);
        }

        Commands::Update {
            id,
            title,
            description,
            tickers,
            purchase,
        } => {
            let input = entities::EntityInput {
                title,
                description,
                tickers,
                purchases: purchase,
            };
            let entity = entities::update(ctx, &id, input).await?;
            println!("수정 완료: {} ({})", entity.title, entity.id);
        }

        Commands::Delete { id } => {
            entities::delete(ctx, &id).await?;
            println!("삭제 완료: {}", id);
        }

        Commands::Reorder { ids } => {
            entities::reorder(ctx, &ids).await?;
            println!("순서 저장 완료");
        }

        Commands::Refresh { ids } => {
            let count = refresh::refresh(ctx, &ids).await?;
            println!("\n갱신 완료: {}", count);
        }

        Commands::Summarize { id } => refresh::summarize(ctx, &id).await?,

        Commands::Analyze { id, stream, all } => match id {
            _ if all => {
                let failed = analyze::run_all(ctx).await?;
                if failed > 0 {
                    println!("\n분석 실패: {}", failed);
                }
            }
            Some(id) if stream => {
                let state = analyze::follow(ctx, &id).await?;
                if let StreamState::Failed(reason) = state {
                    return Err(anyhow::anyhow!("Analysis stream failed: {}", reason));
                }
            }
            Some(id) => analyze::run(ctx, &id).await?,
            None => return Err(anyhow::anyhow!("Entity ID is required without --all")),
        },

        Commands::Chart {
            symbol,
            period,
            interval,
            entity,
            actions,
        } => {
            let command = chart::ChartCommand {
                ticker: symbol,
                period,
                interval,
                entity,
                actions,
                format,
            };
            chart::run(ctx, config, command).await?;
        }
    }

    Ok(())
}
