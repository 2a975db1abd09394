use crate::framer::{Frame, TokenFramer};
use crate::ledger::{HistoryLedger, LedgerEntry};
use crate::message::{ClientMessage, ServerMessage, TableSnapshot};
use crate::registry::CardRegistry;
use crate::state::*;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 会话控制器 (Session Controller)
///
/// 独占当前一局的状态，是唯一能修改它的地方。所有输入 (串口字节、令牌、
/// 手动裁定、重置) 都经过这里，每次调用返回需要广播给显示端的事件。
/// 调用方必须保证同一时间只有一个线程在调用它。
pub struct Session {
    kind: GameKind,
    registry: Arc<CardRegistry>,
    framer: TokenFramer,
    round_id: RoundId,
    round: RoundState,
    ledger: HistoryLedger,
}

impl Session {
    /// 游戏种类由账本决定
    pub fn new(registry: Arc<CardRegistry>, ledger: HistoryLedger) -> Self {
        let kind = ledger.kind();
        Session {
            kind,
            registry,
            framer: TokenFramer::new(),
            round_id: Uuid::new_v4(),
            round: RoundState::new(kind),
            ledger,
        }
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn framer(&self) -> &TokenFramer {
        &self.framer
    }

    /// 处理串口读到的一块原始字节 (可能为空)
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<ServerMessage> {
        self.framer.push(chunk);
        let mut messages = Vec::new();
        while let Some(frame) = self.framer.next_frame(&self.registry) {
            match frame {
                Frame::Token(token) => messages.extend(self.on_token(&token)),
                Frame::Unrecognized(token) => messages.push(self.unknown_token(token)),
            }
        }
        messages
    }

    /// 处理一个原始令牌: 查牌表，再交给局引擎
    pub fn on_token(&mut self, raw: &str) -> Vec<ServerMessage> {
        let Some(card) = self.registry.lookup(raw).cloned() else {
            return vec![self.unknown_token(raw.to_string())];
        };
        debug!("识别到牌 {} -> {}", raw, card);

        match self.round.accept(card) {
            CardEffect::Placed { slot: Slot::Joker, card, .. } => {
                info!("Joker: {}", card);
                vec![ServerMessage::JokerSet { card }]
            }
            CardEffect::Placed { slot, card, outcome } => {
                let mut messages = vec![ServerMessage::CardDealt { slot, card }];
                if let Some(outcome) = outcome {
                    let entry = self.record(outcome);
                    messages.push(ServerMessage::RoundResolved { entry });
                }
                messages
            }
            CardEffect::Rejected { card, reason } => {
                debug!("拒绝牌 {}: {:?}", card, reason);
                vec![ServerMessage::CardRejected { card, reason }]
            }
        }
    }

    /// 手动裁定，和牌流走同一个局引擎
    pub fn on_manual_override(&mut self, winner: Winner) -> Vec<ServerMessage> {
        if winner.game() != self.kind {
            return vec![ServerMessage::Error {
                message: format!("{} 不是 {} 的结果", winner, self.kind),
            }];
        }
        match self.round.force(winner) {
            Some(outcome) => {
                let entry = self.record(outcome);
                vec![ServerMessage::RoundResolved { entry }]
            }
            None => vec![ServerMessage::Info { message: "本局已结束，请先重置".to_string() }],
        }
    }

    /// 无条件丢弃当前一局，开始新的一局
    ///
    /// 分帧器的缓冲区不受影响，半截令牌在下一局继续拼接。
    pub fn reset(&mut self) -> Vec<ServerMessage> {
        self.round = RoundState::new(self.kind);
        self.round_id = Uuid::new_v4();
        info!("开始新的一局 {}", self.round_id);
        vec![ServerMessage::RoundReset { round_id: self.round_id }]
    }

    /// 处理操作员客户端发来的消息
    pub fn handle_client_message(&mut self, msg: ClientMessage) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::ManualOverride { winner } => self.on_manual_override(winner),
            ClientMessage::Reset => self.reset(),
            ClientMessage::GetSnapshot => vec![ServerMessage::Snapshot(self.snapshot())],
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            game: self.kind,
            round_id: self.round_id,
            round: self.round.clone(),
            ledger: self.ledger.snapshot(),
        }
    }

    fn unknown_token(&self, token: String) -> ServerMessage {
        info!("未知令牌: {:?}", token);
        ServerMessage::UnknownToken { token }
    }

    fn record(&mut self, outcome: RoundOutcome) -> LedgerEntry {
        let entry = LedgerEntry {
            game_no: self.ledger.games() + 1,
            round_id: self.round_id,
            outcome,
        };
        info!("{}", entry.summary_line());
        self.ledger.append(entry.clone());
        entry
    }
}

// --- 单元测试 ---
