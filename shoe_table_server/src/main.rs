mod config;
mod ingest;
mod table;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use futures_util::{stream::StreamExt, SinkExt};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use shoe_table_core::{CardRegistry, ClientMessage, FileSink, HistoryLedger, ServerMessage, Session};

use crate::config::Args;
use crate::ingest::{open_serial, run_ingestion, ByteSource, SimulatedShoe};
use crate::table::{run_table, Hub, TableCommand};

// 连接处理任务共享的状态
struct AppState {
    hub: Arc<Hub>,
    // 所有会改变桌面状态的输入都发到桌面任务
    commands: mpsc::Sender<TableCommand>,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().validate()?;
    info!("游戏: {}，历史记录: {}", config.game, config.history.display());

    let registry = if config.simulate {
        CardRegistry::standard()
    } else {
        CardRegistry::load_or_empty(&config.card_map)
    };
    let ledger = HistoryLedger::with_sink(config.game, Box::new(FileSink::new(&config.history)), config.history_format);
    let session = Session::new(Arc::new(registry), ledger);

    let hub = Arc::new(Hub::default());
    let (commands, command_rx) = mpsc::channel::<TableCommand>(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(run_table(session, hub.clone(), command_rx));

    let ingestion = if config.simulate {
        // 大约每秒一张牌
        let every = (1000 / config.poll.as_millis().max(1)).max(1) as u32;
        let open = move || -> std::io::Result<Box<dyn ByteSource>> { Ok(Box::new(SimulatedShoe::new(every))) };
        tokio::spawn(run_ingestion(open, config.poll, config.retry, commands.clone(), shutdown_rx))
    } else {
        let (device, baud) = (config.device.clone(), config.baud);
        let open = move || open_serial(&device, baud);
        tokio::spawn(run_ingestion(open, config.poll, config.retry, commands.clone(), shutdown_rx))
    };

    let state = SharedState::new(AppState { hub, commands });
    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("无法监听 {}", config.listen))?;
    info!("服务器正在监听 {}", config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    ingestion.await?;
    info!("服务器已关闭");
    Ok(())
}

/// Ctrl-C 后通知读取任务退出并停止接受新连接
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到 Ctrl-C，正在关闭");
    let _ = shutdown.send(true);
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，桌面任务通过它向这个连接推送事件
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    let conn_id = Uuid::new_v4();
    state.hub.register(conn_id, tx);
    if state.commands.send(TableCommand::Join { conn_id }).await.is_err() {
        state.hub.remove(&conn_id);
        return;
    }
    info!("显示端 {} 已连接，当前 {} 个连接", conn_id, state.hub.len());

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if state.commands.send(TableCommand::Client { conn_id, msg }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 移除发送端后写任务随之结束
    state.hub.remove(&conn_id);
    info!("显示端 {} 连接关闭", conn_id);
}
