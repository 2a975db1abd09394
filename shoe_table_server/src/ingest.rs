use std::io::{self, Read};
use std::time::Duration;

use serialport::SerialPort;
use shoe_table_core::{shuffled_shoe, Card};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::table::TableCommand;

const READ_BUFFER: usize = 256;

/// 牌靴字节来源: 真实串口或模拟牌靴
///
/// `read_available` 不能阻塞；没有数据时返回 `Ok(0)`。
pub trait ByteSource: Send {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn describe(&self) -> String;
}

impl ByteSource for Box<dyn SerialPort> {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let len = pending.min(buf.len());
        match self.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.name().unwrap_or_else(|| "serial".to_string())
    }
}

/// 打开串口；只读取已到达的字节，所以超时只是兜底
pub fn open_serial(device: &str, baud: u32) -> io::Result<Box<dyn ByteSource>> {
    let port = serialport::new(device, baud)
        .timeout(Duration::from_millis(10))
        .open()?;
    Ok(Box::new(port))
}

/// 模拟牌靴
///
/// 洗好一副牌，每隔 `every` 次轮询吐出一张牌的令牌，交替使用 CR-LF 分隔
/// 和不带分隔符的定长格式。牌发完后重新洗牌。
pub struct SimulatedShoe {
    cards: Vec<Card>,
    every: u32,
    ticks: u32,
    delimited: bool,
}

impl SimulatedShoe {
    pub fn new(every: u32) -> Self {
        SimulatedShoe {
            cards: shuffled_shoe(1),
            every: every.max(1),
            ticks: 0,
            delimited: true,
        }
    }
}

impl ByteSource for SimulatedShoe {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ticks += 1;
        if self.ticks < self.every {
            return Ok(0);
        }
        self.ticks = 0;

        if self.cards.is_empty() {
            self.cards = shuffled_shoe(1);
        }
        let Some(card) = self.cards.pop() else {
            return Ok(0);
        };
        let mut token = card.token();
        if self.delimited {
            token.push_str("\r\n");
        }
        self.delimited = !self.delimited;

        let bytes = token.as_bytes();
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn describe(&self) -> String {
        "simulated shoe".to_string()
    }
}

/// 等待 `delay`；期间收到关闭信号则返回 `true`
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}

/// 串口读取任务
///
/// 以固定间隔轮询字节来源，把读到的字节原样交给桌面任务。打开或读取失败时
/// 报告断开并按固定间隔重试，永远不会让进程退出。收到关闭信号后在下一次轮询前
/// 退出并释放设备。
pub async fn run_ingestion<F>(
    mut open: F,
    poll: Duration,
    retry: Duration,
    commands: mpsc::Sender<TableCommand>,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FnMut() -> io::Result<Box<dyn ByteSource>> + Send,
{
    let mut buf = [0u8; READ_BUFFER];
    // 只在连接状态变化时上报
    let mut connected: Option<bool> = None;

    while !*shutdown.borrow() {
        let mut source = match open() {
            Ok(source) => source,
            Err(e) => {
                if connected != Some(false) {
                    connected = Some(false);
                    warn!("打开牌靴失败: {}，{} 毫秒后重试", e, retry.as_millis());
                    let status = TableCommand::Device { connected: false, detail: e.to_string() };
                    if commands.send(status).await.is_err() {
                        break;
                    }
                }
                if sleep_or_shutdown(retry, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        let detail = source.describe();
        info!("已连接牌靴 {}", detail);
        connected = Some(true);
        if commands.send(TableCommand::Device { connected: true, detail }).await.is_err() {
            break;
        }

        let mut interval = time::interval(poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let failure = loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break None,
            }
            match source.read_available(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    if commands.send(TableCommand::Bytes(buf[..n].to_vec())).await.is_err() {
                        break None;
                    }
                }
                Err(e) => break Some(e),
            }
        };
        drop(source);

        let Some(e) = failure else {
            break;
        };
        warn!("读取牌靴失败: {}，{} 毫秒后重连", e, retry.as_millis());
        connected = Some(false);
        let status = TableCommand::Device { connected: false, detail: e.to_string() };
        if commands.send(status).await.is_err() || sleep_or_shutdown(retry, &mut shutdown).await {
            break;
        }
    }

    info!("串口读取任务已退出");
}
