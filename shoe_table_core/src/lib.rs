//! # 牌靴桌面核心逻辑库
//!
//! 这个 `core` crate 包含了读牌靴的完整核心: 串口字节流分帧、牌表查询、
//! 点数解析、安达巴哈与百家乐的局引擎、历史账本，以及把这些串起来的会话控制器
//! 和客户端-服务器通信消息的定义。
//! 它不依赖具体的串口、网络或界面实现，可以被任何上层应用复用。

mod andar_bahar;
mod baccarat;
mod card;
mod framer;
mod ledger;
mod message;
mod registry;
mod session;
mod state;

pub use andar_bahar::*;
pub use baccarat::*;
pub use card::*;
pub use framer::*;
pub use ledger::*;
pub use message::*;
pub use registry::*;
pub use session::*;
pub use state::*;
