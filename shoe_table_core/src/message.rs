use crate::card::CardIdentity;
use crate::ledger::{LedgerEntry, LedgerSnapshot};
use crate::state::{GameKind, RejectReason, RoundId, RoundState, Slot, Winner};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---
// 操作员能触发的状态变更只有手动裁定和重置。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// 手动裁定本局胜方 (安达巴哈两个按键，百家乐三个按键)
    ManualOverride { winner: Winner },
    /// 开始新的一局
    Reset,
    /// 请求当前桌面快照
    GetSnapshot,
}

// --- 服务器 -> 客户端 的消息 ---
// 会话每处理一个输入就产生零到多个事件，由服务器广播给所有显示端。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 连接建立后私密地发给该客户端
    Welcome { game: GameKind, snapshot: TableSnapshot },

    /// 完整桌面状态的快照
    Snapshot(TableSnapshot),

    /// 安达巴哈本局的第一张牌
    JokerSet { card: CardIdentity },

    /// 一张牌被接受并放到了 `slot`
    CardDealt { slot: Slot, card: CardIdentity },

    /// 本局不再接受这张牌
    CardRejected { card: CardIdentity, reason: RejectReason },

    /// 牌表里没有的令牌，已丢弃
    UnknownToken { token: String },

    /// 本局结束，`entry` 已写入历史账本
    RoundResolved { entry: LedgerEntry },

    /// 已开始新的一局
    RoundReset { round_id: RoundId },

    /// 牌靴连接状态变化
    DeviceStatus { connected: bool, detail: String },

    Info { message: String },
    Error { message: String },
}

/// 显示端需要的全部状态: 当前一局 + 历史账本
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub game: GameKind,
    pub round_id: RoundId,
    pub round: RoundState,
    pub ledger: LedgerSnapshot,
}

impl From<Winner> for ClientMessage {
    fn from(winner: Winner) -> Self {
        ClientMessage::ManualOverride { winner }
    }
}
