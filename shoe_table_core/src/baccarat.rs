use crate::card::CardIdentity;
use crate::state::*;
use serde::{Deserialize, Serialize};

/// 一局评估所需的牌数: 闲两张，庄两张
pub const HAND_SIZE: usize = 4;

/// 百家乐一局的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaccaratPhase {
    /// 已发张数 (0..=3)
    Collecting(usize),
    Resolved,
}

/// 百家乐的一局
///
/// 按输入顺序收牌，第 1、2 张归闲，第 3、4 张归庄，收满四张立即评估。
/// 不实现补第三张牌的规则，四张牌后的点数即为最终点数。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaccaratRound {
    dealt: Vec<CardIdentity>,
    resolved: bool,
}

impl BaccaratRound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BaccaratPhase {
        if self.resolved {
            BaccaratPhase::Resolved
        } else {
            BaccaratPhase::Collecting(self.dealt.len())
        }
    }

    pub fn dealt(&self) -> &[CardIdentity] {
        &self.dealt
    }

    /// 以当前张数计算的闲家点数，便于在收满前显示
    pub fn player_total(&self) -> u8 {
        compute_total(&self.dealt[..self.dealt.len().min(2)])
    }

    pub fn banker_total(&self) -> u8 {
        compute_total(self.dealt.get(2..).unwrap_or(&[]))
    }

    fn resolve(&mut self, manual: bool) -> RoundOutcome {
        self.resolved = true;
        let hand = evaluate(&self.dealt);
        RoundOutcome {
            winner: winner_of(&hand),
            manual,
            detail: OutcomeDetail::Baccarat(hand),
        }
    }
}

/// 点数之和对 10 取模，结果总在 0..=9
pub fn compute_total(cards: &[CardIdentity]) -> u8 {
    (cards.iter().map(|c| u32::from(c.point_value())).sum::<u32>() % 10) as u8
}

/// 评估一手四张牌，手动裁定与自动发牌共用这一个函数
///
/// # Panics
/// 如果牌数不是 4 张，则会 panic。
pub fn evaluate(cards: &[CardIdentity]) -> BaccaratHand {
    assert_eq!(cards.len(), HAND_SIZE, "百家乐评估需要恰好四张牌");

    let player = [cards[0].clone(), cards[1].clone()];
    let banker = [cards[2].clone(), cards[3].clone()];
    let player_total = compute_total(&player);
    let banker_total = compute_total(&banker);

    let mut hand = BaccaratHand {
        flags: HandFlags {
            pair_player: player[0].same_rank(&player[1]),
            pair_banker: banker[0].same_rank(&banker[1]),
            natural: matches!(player_total, 8 | 9) || matches!(banker_total, 8 | 9),
            super_six: false,
        },
        player,
        banker,
        player_total,
        banker_total,
    };
    hand.flags.super_six = winner_of(&hand) == Winner::Banker && banker_total == 6;
    hand
}

/// 点数高者胜，相同为和
pub fn winner_of(hand: &BaccaratHand) -> Winner {
    use std::cmp::Ordering::*;
    match hand.player_total.cmp(&hand.banker_total) {
        Greater => Winner::Player,
        Less => Winner::Banker,
        Equal => Winner::Tie,
    }
}

/// 手动裁定时使用的合成手牌，保证评估结果与指定的胜方一致
pub fn synthetic_hand(winner: Winner) -> Option<[CardIdentity; HAND_SIZE]> {
    let names = match winner {
        Winner::Player => ["heart_9", "club_9", "diamond_2", "spade_ace"],
        Winner::Banker => ["heart_2", "club_ace", "diamond_8", "spade_8"],
        Winner::Tie => ["heart_4", "club_4", "diamond_4", "spade_4"],
        Winner::Andar | Winner::Bahar => return None,
    };
    Some(names.map(CardIdentity::new))
}

impl RoundEngine for BaccaratRound {
    fn accept(&mut self, card: CardIdentity) -> CardEffect {
        if self.resolved {
            return CardEffect::Rejected { card, reason: RejectReason::RoundResolved };
        }
        if self.dealt.len() >= HAND_SIZE {
            return CardEffect::Rejected { card, reason: RejectReason::HandComplete };
        }

        self.dealt.push(card.clone());
        let slot = Slot::Position(self.dealt.len() as u8);
        let outcome = (self.dealt.len() == HAND_SIZE).then(|| self.resolve(false));
        CardEffect::Placed { slot, card, outcome }
    }

    fn force(&mut self, winner: Winner) -> Option<RoundOutcome> {
        if self.resolved {
            return None;
        }
        // 合成手牌替换掉已经发出的部分牌
        self.dealt = synthetic_hand(winner)?.to_vec();
        Some(self.resolve(true))
    }

    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{create_deck, Suit};

    fn cards(names: &[&str]) -> Vec<CardIdentity> {
        names.iter().map(|n| CardIdentity::new(*n)).collect()
    }

    fn deal_all(round: &mut BaccaratRound, names: &[&str]) -> Vec<CardEffect> {
        cards(names).into_iter().map(|c| round.accept(c)).collect()
    }

    #[test]
    fn test_natural_player_pair() {
        let mut round = BaccaratRound::new();
        let effects = deal_all(&mut round, &["heart_9", "club_9", "diamond_2", "spade_ace"]);
        assert!(effects[..3].iter().all(|e| matches!(e, CardEffect::Placed { outcome: None, .. })));

        let CardEffect::Placed { slot, outcome: Some(outcome), .. } = &effects[3] else {
            panic!("第四张牌应触发评估");
        };
        assert_eq!(*slot, Slot::Position(4));
        assert_eq!(outcome.winner, Winner::Player);
        let OutcomeDetail::Baccarat(hand) = &outcome.detail else { panic!() };
        assert_eq!(hand.player_total, 8);
        assert_eq!(hand.banker_total, 3);
        assert_eq!(hand.flags, HandFlags { pair_player: true, pair_banker: false, natural: true, super_six: false });
        assert_eq!(round.phase(), BaccaratPhase::Resolved);
    }

    #[test]
    fn test_positions_follow_input_order() {
        let mut round = BaccaratRound::new();
        let effects = deal_all(&mut round, &["heart_king", "club_3", "diamond_4", "spade_2"]);
        let slots: Vec<Slot> = effects
            .iter()
            .map(|e| match e {
                CardEffect::Placed { slot, .. } => *slot,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(slots, vec![Slot::Position(1), Slot::Position(2), Slot::Position(3), Slot::Position(4)]);
        let CardEffect::Placed { outcome: Some(outcome), .. } = &effects[3] else { panic!() };
        // 闲 0+3=3，庄 4+2=6，庄以 6 点获胜
        assert_eq!(outcome.winner, Winner::Banker);
        assert!(outcome.flags().super_six);
        assert!(!outcome.flags().natural);
    }

    #[test]
    fn test_tie_and_totals_mod_ten() {
        let hand = evaluate(&cards(&["heart_7", "club_8", "diamond_queen", "spade_5"]));
        assert_eq!(hand.player_total, 5);
        assert_eq!(hand.banker_total, 5);
        assert_eq!(winner_of(&hand), Winner::Tie);
        assert!(!hand.flags.super_six);
    }

    #[test]
    fn test_banker_six_tie_is_not_super_six() {
        let hand = evaluate(&cards(&["heart_3", "club_3", "diamond_2", "spade_4"]));
        assert_eq!(winner_of(&hand), Winner::Tie);
        assert!(!hand.flags.super_six);
    }

    #[test]
    fn test_total_range_and_idempotence() {
        let deck: Vec<CardIdentity> = create_deck().iter().map(|c| c.identity()).collect();
        for a in &deck {
            for b in deck.iter().step_by(5) {
                let pair = [a.clone(), b.clone()];
                let total = compute_total(&pair);
                assert!(total <= 9);
                assert_eq!(total, compute_total(&pair));
            }
        }
        assert_eq!(compute_total(&[]), 0);
        assert_eq!(compute_total(&cards(&["joker_x", "club_9"])), 9);
    }

    #[test]
    fn test_pairs_ignore_suit() {
        for suit_a in Suit::ALL {
            for suit_b in Suit::ALL {
                let hand = evaluate(&cards(&[
                    format!("{}_jack", suit_a.name()).as_str(),
                    format!("{}_jack", suit_b.name()).as_str(),
                    format!("{}_3", suit_b.name()).as_str(),
                    format!("{}_3", suit_a.name()).as_str(),
                ]));
                assert!(hand.flags.pair_player);
                assert!(hand.flags.pair_banker);
            }
        }
        let hand = evaluate(&cards(&["heart_jack", "heart_queen", "club_2", "club_3"]));
        assert!(!hand.flags.pair_player);
        assert!(!hand.flags.pair_banker);
        // 点数写法不同不算对子
        let hand = evaluate(&cards(&["spade_ace", "AD", "heart_", "club_"]));
        assert!(!hand.flags.pair_player);
        assert!(!hand.flags.pair_banker);
    }

    #[test]
    fn test_resolved_round_rejects_cards() {
        let mut round = BaccaratRound::new();
        deal_all(&mut round, &["heart_2", "club_2", "diamond_2", "spade_2"]);
        assert_eq!(
            round.accept(CardIdentity::new("heart_5")),
            CardEffect::Rejected { card: CardIdentity::new("heart_5"), reason: RejectReason::RoundResolved }
        );
        assert_eq!(round.dealt().len(), HAND_SIZE);
    }

    #[test]
    fn test_running_totals() {
        let mut round = BaccaratRound::new();
        deal_all(&mut round, &["heart_7", "club_5", "diamond_9"]);
        assert_eq!(round.phase(), BaccaratPhase::Collecting(3));
        assert_eq!(round.player_total(), 2);
        assert_eq!(round.banker_total(), 9);
    }

    #[test]
    fn test_manual_override_runs_same_evaluation() {
        for winner in [Winner::Player, Winner::Banker, Winner::Tie] {
            let mut round = BaccaratRound::new();
            deal_all(&mut round, &["heart_king", "club_king"]);
            let outcome = round.force(winner).unwrap();
            assert_eq!(outcome.winner, winner);
            assert!(outcome.manual);
            let OutcomeDetail::Baccarat(hand) = &outcome.detail else { panic!() };
            assert_eq!(*hand, evaluate(&synthetic_hand(winner).unwrap()));
            assert_eq!(round.dealt().len(), HAND_SIZE);
            assert_eq!(round.force(winner), None);
        }
    }

    #[test]
    fn test_manual_override_rejects_other_game() {
        let mut round = BaccaratRound::new();
        assert_eq!(round.force(Winner::Andar), None);
        assert!(!round.is_resolved());
    }
}
