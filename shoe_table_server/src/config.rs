use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use shoe_table_core::{GameKind, HistoryFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GameArg {
    AndarBahar,
    Baccarat,
}

impl From<GameArg> for GameKind {
    fn from(arg: GameArg) -> Self {
        match arg {
            GameArg::AndarBahar => GameKind::AndarBahar,
            GameArg::Baccarat => GameKind::Baccarat,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HistoryFormatArg {
    /// 每局一个胜方记号
    Compact,
    /// 每局一行完整摘要
    Summary,
}

impl From<HistoryFormatArg> for HistoryFormat {
    fn from(arg: HistoryFormatArg) -> Self {
        match arg {
            HistoryFormatArg::Compact => HistoryFormat::Compact,
            HistoryFormatArg::Summary => HistoryFormat::Summary,
        }
    }
}

/// 读牌靴桌面服务
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// 游戏种类
    #[arg(long, value_enum, env = "SHOE_GAME", default_value = "andar-bahar")]
    pub game: GameArg,

    /// 牌靴串口设备
    #[arg(long, env = "SHOE_DEVICE", default_value = "/dev/ttyUSB0")]
    pub device: String,

    #[arg(long, env = "SHOE_BAUD", default_value_t = 9600)]
    pub baud: u32,

    /// 不连接设备，用洗好的模拟牌靴代替
    #[arg(long, env = "SHOE_SIMULATE", default_value_t = false)]
    pub simulate: bool,

    /// 牌表文件 (JSON: 令牌 -> 牌名)
    #[arg(long, env = "SHOE_CARD_MAP", default_value = "card_map.json")]
    pub card_map: PathBuf,

    /// 历史记录文件，默认按游戏种类选择
    #[arg(long, env = "SHOE_HISTORY")]
    pub history: Option<PathBuf>,

    #[arg(long, value_enum, env = "SHOE_HISTORY_FORMAT", default_value = "compact")]
    pub history_format: HistoryFormatArg,

    /// 串口轮询间隔 (毫秒)
    #[arg(long, env = "SHOE_POLL_MS", default_value_t = 20)]
    pub poll_ms: u64,

    /// 断线重连间隔 (毫秒)
    #[arg(long, env = "SHOE_RETRY_MS", default_value_t = 1000)]
    pub retry_ms: u64,

    /// WebSocket 监听地址
    #[arg(long, env = "SHOE_LISTEN", default_value = "0.0.0.0:25917")]
    pub listen: String,
}

/// 校验后的运行配置
#[derive(Debug, Clone)]
pub struct Config {
    pub game: GameKind,
    pub device: String,
    pub baud: u32,
    pub simulate: bool,
    pub card_map: PathBuf,
    pub history: PathBuf,
    pub history_format: HistoryFormat,
    pub poll: Duration,
    pub retry: Duration,
    pub listen: SocketAddr,
}

impl Args {
    /// 启动时的配置错误直接失败退出，不做运行期降级
    pub fn validate(self) -> Result<Config> {
        ensure!(self.poll_ms > 0, "--poll-ms 必须大于 0");
        ensure!(self.retry_ms > 0, "--retry-ms 必须大于 0");
        ensure!(self.baud > 0, "--baud 必须大于 0");
        ensure!(self.simulate || !self.device.trim().is_empty(), "--device 不能为空");
        let listen: SocketAddr = self
            .listen
            .parse()
            .with_context(|| format!("无效的监听地址 {}", self.listen))?;

        let game = GameKind::from(self.game);
        Ok(Config {
            game,
            device: self.device,
            baud: self.baud,
            simulate: self.simulate,
            card_map: self.card_map,
            history: self.history.unwrap_or_else(|| PathBuf::from(game.default_history_file())),
            history_format: self.history_format.into(),
            poll: Duration::from_millis(self.poll_ms),
            retry: Duration::from_millis(self.retry_ms),
            listen,
        })
    }
}
