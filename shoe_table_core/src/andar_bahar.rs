use crate::card::CardIdentity;
use crate::state::*;
use serde::{Deserialize, Serialize};

/// 安达巴哈一局的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AndarBaharPhase {
    AwaitingJoker,
    Dealing,
    Resolved,
}

/// 安达巴哈的一局
///
/// 第一张被接受的牌成为 Joker，之后的牌从 Andar 开始轮流发到两边，
/// 哪边先出现与 Joker 点数相同的牌，哪边获胜。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndarBaharRound {
    joker: Option<CardIdentity>,
    next_side: Side,
    andar: Vec<CardIdentity>,
    bahar: Vec<CardIdentity>,
    resolved: bool,
}

impl Default for AndarBaharRound {
    fn default() -> Self {
        Self::new()
    }
}

impl AndarBaharRound {
    pub fn new() -> Self {
        AndarBaharRound {
            joker: None,
            next_side: Side::Andar,
            andar: Vec::new(),
            bahar: Vec::new(),
            resolved: false,
        }
    }

    pub fn phase(&self) -> AndarBaharPhase {
        if self.resolved {
            AndarBaharPhase::Resolved
        } else if self.joker.is_none() {
            AndarBaharPhase::AwaitingJoker
        } else {
            AndarBaharPhase::Dealing
        }
    }

    pub fn joker(&self) -> Option<&CardIdentity> {
        self.joker.as_ref()
    }

    /// 下一张牌会发到哪边
    pub fn next_side(&self) -> Side {
        self.next_side
    }

    pub fn cards_on(&self, side: Side) -> &[CardIdentity] {
        match side {
            Side::Andar => &self.andar,
            Side::Bahar => &self.bahar,
        }
    }

    /// 不含 Joker 的发牌张数
    pub fn cards_dealt(&self) -> usize {
        self.andar.len() + self.bahar.len()
    }
}

impl RoundEngine for AndarBaharRound {
    fn accept(&mut self, card: CardIdentity) -> CardEffect {
        if self.resolved {
            return CardEffect::Rejected { card, reason: RejectReason::RoundResolved };
        }

        let Some(joker) = self.joker.clone() else {
            self.joker = Some(card.clone());
            return CardEffect::Placed { slot: Slot::Joker, card, outcome: None };
        };

        let side = self.next_side;
        match side {
            Side::Andar => self.andar.push(card.clone()),
            Side::Bahar => self.bahar.push(card.clone()),
        }
        self.next_side = side.toggled();

        let outcome = if joker.same_rank(&card) {
            self.resolved = true;
            Some(RoundOutcome {
                winner: side.into(),
                manual: false,
                detail: OutcomeDetail::AndarBahar {
                    joker: Some(joker),
                    matching: Some(card.clone()),
                    cards_dealt: self.cards_dealt(),
                },
            })
        } else {
            None
        };

        CardEffect::Placed { slot: Slot::Side(side), card, outcome }
    }

    fn force(&mut self, winner: Winner) -> Option<RoundOutcome> {
        if self.resolved || winner.game() != GameKind::AndarBahar {
            return None;
        }
        self.resolved = true;
        Some(RoundOutcome {
            winner,
            manual: true,
            detail: OutcomeDetail::AndarBahar {
                joker: self.joker.clone(),
                matching: None,
                cards_dealt: self.cards_dealt(),
            },
        })
    }

    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

// --- 单元测试 ---
