use crate::andar_bahar::AndarBaharRound;
use crate::baccarat::BaccaratRound;
use crate::card::CardIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type RoundId = Uuid;

/// 游戏种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    AndarBahar,
    Baccarat,
}

/// 安达巴哈的两边
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Andar,
    Bahar,
}

/// 一局的胜方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Andar,
    Bahar,
    Player,
    Banker,
    Tie,
}

/// 一张被接受的牌落在哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Joker,
    Side(Side),
    /// 百家乐发牌位置，从 1 开始 (1、2 为闲，3、4 为庄)
    Position(u8),
}

/// 百家乐的派生标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandFlags {
    pub pair_player: bool,
    pub pair_banker: bool,
    pub natural: bool,
    pub super_six: bool,
}

/// 百家乐四张牌的评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaccaratHand {
    pub player: [CardIdentity; 2],
    pub banker: [CardIdentity; 2],
    pub player_total: u8,
    pub banker_total: u8,
    pub flags: HandFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeDetail {
    AndarBahar {
        joker: Option<CardIdentity>,
        /// 与 Joker 点数相同、结束本局的那张牌；手动裁定时为空
        matching: Option<CardIdentity>,
        /// 不含 Joker 的发牌张数
        cards_dealt: usize,
    },
    Baccarat(BaccaratHand),
}

/// 一局的结果，由局引擎在每局结束时恰好生成一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub winner: Winner,
    pub manual: bool,
    pub detail: OutcomeDetail,
}

/// 牌被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// 本局已结束，等待重置
    RoundResolved,
    /// 百家乐已发满四张
    HandComplete,
}

/// 局引擎处理一张牌的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEffect {
    Placed {
        slot: Slot,
        card: CardIdentity,
        outcome: Option<RoundOutcome>,
    },
    Rejected {
        card: CardIdentity,
        reason: RejectReason,
    },
}

/// 局引擎 (Round Engine)
///
/// 每种游戏一个实现。牌流和手动裁定都走这里，保证两条路径对“已结束”的判断一致。
pub trait RoundEngine {
    /// 接受一张已解析的牌
    fn accept(&mut self, card: CardIdentity) -> CardEffect;

    /// 手动裁定；本局已结束或胜方不属于本游戏时返回 `None`
    fn force(&mut self, winner: Winner) -> Option<RoundOutcome>;

    fn is_resolved(&self) -> bool;
}

/// 当前这一局的状态，由会话控制器独占
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    AndarBahar(AndarBaharRound),
    Baccarat(BaccaratRound),
}

// --- 实现辅助功能 ---

impl GameKind {
    pub fn winners(self) -> &'static [Winner] {
        match self {
            GameKind::AndarBahar => &[Winner::Andar, Winner::Bahar],
            GameKind::Baccarat => &[Winner::Player, Winner::Banker, Winner::Tie],
        }
    }

    pub fn default_history_file(self) -> &'static str {
        match self {
            GameKind::AndarBahar => "andar_history.txt",
            GameKind::Baccarat => "baccarat_history.txt",
        }
    }
}

impl Side {
    pub fn toggled(self) -> Side {
        match self {
            Side::Andar => Side::Bahar,
            Side::Bahar => Side::Andar,
        }
    }
}

impl Winner {
    pub fn game(self) -> GameKind {
        match self {
            Winner::Andar | Winner::Bahar => GameKind::AndarBahar,
            Winner::Player | Winner::Banker | Winner::Tie => GameKind::Baccarat,
        }
    }

    /// 珠盘路上的单字符记号
    pub fn symbol(self) -> char {
        match self {
            Winner::Andar => 'A',
            Winner::Bahar | Winner::Banker => 'B',
            Winner::Player => 'P',
            Winner::Tie => 'T',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Winner::Andar => "ANDAR",
            Winner::Bahar => "BAHAR",
            Winner::Player => "PLAYER",
            Winner::Banker => "BANKER",
            Winner::Tie => "TIE",
        }
    }
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::Andar => Winner::Andar,
            Side::Bahar => Winner::Bahar,
        }
    }
}

impl RoundOutcome {
    pub fn flags(&self) -> HandFlags {
        match &self.detail {
            OutcomeDetail::Baccarat(hand) => hand.flags,
            OutcomeDetail::AndarBahar { .. } => HandFlags::default(),
        }
    }
}

impl HandFlags {
    /// 被置位的标记名，顺序固定
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.pair_player, "PLAYER_PAIR"),
            (self.pair_banker, "BANKER_PAIR"),
            (self.natural, "NATURAL"),
            (self.super_six, "SUPER_SIX"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect()
    }
}

impl RoundState {
    pub fn new(kind: GameKind) -> Self {
        match kind {
            GameKind::AndarBahar => RoundState::AndarBahar(AndarBaharRound::new()),
            GameKind::Baccarat => RoundState::Baccarat(BaccaratRound::new()),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            RoundState::AndarBahar(_) => GameKind::AndarBahar,
            RoundState::Baccarat(_) => GameKind::Baccarat,
        }
    }
}

impl RoundEngine for RoundState {
    fn accept(&mut self, card: CardIdentity) -> CardEffect {
        match self {
            RoundState::AndarBahar(round) => round.accept(card),
            RoundState::Baccarat(round) => round.accept(card),
        }
    }

    fn force(&mut self, winner: Winner) -> Option<RoundOutcome> {
        match self {
            RoundState::AndarBahar(round) => round.force(winner),
            RoundState::Baccarat(round) => round.force(winner),
        }
    }

    fn is_resolved(&self) -> bool {
        match self {
            RoundState::AndarBahar(round) => round.is_resolved(),
            RoundState::Baccarat(round) => round.is_resolved(),
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            GameKind::AndarBahar => "Andar Bahar",
            GameKind::Baccarat => "Baccarat",
        })
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", Winner::from(*self).label())
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Joker => write!(f, "JOKER"),
            Slot::Side(side) => write!(f, "{}", side),
            Slot::Position(n) if *n <= 2 => write!(f, "PLAYER {}/4", n),
            Slot::Position(n) => write!(f, "BANKER {}/4", n),
        }
    }
}
