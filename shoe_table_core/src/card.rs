use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
// --- 核心数据结构定义 ---

/// 花色 (Suit)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 ♠️
    Heart,   // 红心 ♥️
    Club,    // 梅花 ♣️
    Diamond, // 方块 ♦️
}

/// 点数 (Rank)
/// 百家乐里 Ace 只算 1 点，所以这里按 A-2-...-K 排列
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

/// 单张扑克牌 (Card)
/// 只在能完整解析出花色和点数时使用，牌靴上报的牌统一用 `CardIdentity`
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

/// 牌的规范身份 (CardIdentity)
///
/// 由牌表把设备原始令牌映射成牌名 (例如 `heart_10`、`club_ace` 或 `KC`)，
/// 点数与花色在创建时解析一次，之后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardIdentity {
    name: String,
    rank: String,
    suit: Option<Suit>,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];

    /// 设备令牌里的单字母花色标记
    pub fn letter(self) -> char {
        match self {
            Suit::Spade => 'S',
            Suit::Heart => 'H',
            Suit::Club => 'C',
            Suit::Diamond => 'D',
        }
    }

    /// 带分隔符牌名里的花色前缀
    pub fn name(self) -> &'static str {
        match self {
            Suit::Spade => "spade",
            Suit::Heart => "heart",
            Suit::Club => "club",
            Suit::Diamond => "diamond",
        }
    }

    pub fn from_letter(letter: char) -> Option<Suit> {
        match letter.to_ascii_lowercase() {
            's' => Some(Suit::Spade),
            'h' => Some(Suit::Heart),
            'c' => Some(Suit::Club),
            'd' => Some(Suit::Diamond),
            _ => None,
        }
    }

    /// 同时接受单复数 (`heart` / `hearts`)
    pub fn from_name(name: &str) -> Option<Suit> {
        let name = name.to_ascii_lowercase();
        let name = name.strip_suffix('s').unwrap_or(&name);
        match name {
            "spade" => Some(Suit::Spade),
            "heart" => Some(Suit::Heart),
            "club" => Some(Suit::Club),
            "diamond" => Some(Suit::Diamond),
            _ => None,
        }
    }
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace, Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King,
    ];

    /// 牌名中使用的规范点数 (`ace`, `2` .. `10`, `jack`, `queen`, `king`)
    pub fn canonical(self) -> &'static str {
        match self {
            Rank::Ace => "ace",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "jack",
            Rank::Queen => "queen",
            Rank::King => "king",
        }
    }

    /// 设备令牌中使用的点数写法
    pub fn token(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }

    /// 识别长短两种写法；`1` 视为 Ace
    pub fn from_canonical(rank: &str) -> Option<Rank> {
        let rank = match rank.to_ascii_lowercase().as_str() {
            "ace" | "a" | "1" => Rank::Ace,
            "2" => Rank::Two,
            "3" => Rank::Three,
            "4" => Rank::Four,
            "5" => Rank::Five,
            "6" => Rank::Six,
            "7" => Rank::Seven,
            "8" => Rank::Eight,
            "9" => Rank::Nine,
            "10" | "t" => Rank::Ten,
            "jack" | "j" => Rank::Jack,
            "queen" | "q" => Rank::Queen,
            "king" | "k" => Rank::King,
            _ => return None,
        };
        Some(rank)
    }

    /// 百家乐点值: A=1, 2-9 为面值, 10/J/Q/K=0
    pub fn point_value(self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 0,
        }
    }
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    /// 牌靴上报的原始令牌，例如 `AS`、`10H`
    pub fn token(&self) -> String {
        format!("{}{}", self.rank.token(), self.suit.letter())
    }

    /// 标准牌表中的牌名，例如 `spade_ace`、`heart_10`
    pub fn name(&self) -> String {
        format!("{}_{}", self.suit.name(), self.rank.canonical())
    }

    pub fn identity(&self) -> CardIdentity {
        CardIdentity::new(self.name())
    }
}

impl CardIdentity {
    pub fn new(name: impl Into<String>) -> CardIdentity {
        let name = name.into();
        let rank = canonical_rank(&name);
        let suit = parse_suit(&name);
        CardIdentity { name, rank, suit }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 规范点数字符串 (小写)，无法解析时为空串
    pub fn rank(&self) -> &str {
        &self.rank
    }

    pub fn suit(&self) -> Option<Suit> {
        self.suit
    }

    pub fn point_value(&self) -> u8 {
        point_value(&self.rank)
    }

    /// 名字里能否取出点数；取不出的牌永远不参与配对
    pub fn has_known_rank(&self) -> bool {
        !self.rank.is_empty()
    }

    /// 点数字符串完全相同才算同点，所以 `spade_ace` 和 `AD` (`ace` 与 `a`) 不相同
    pub fn same_rank(&self, other: &CardIdentity) -> bool {
        self.has_known_rank() && self.rank == other.rank
    }

    pub fn card(&self) -> Option<Card> {
        Some(Card::new(Rank::from_canonical(&self.rank)?, self.suit?))
    }
}

// --- 点数 / 点值解析 ---

/// 去掉路径和扩展名，牌名可能直接是图片文件名
fn base_name(name: &str) -> &str {
    let name = name.trim();
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) => stem,
        _ => name,
    }
}

/// 从牌名中解析规范点数
///
/// - 有分隔符时取最后一个 `_` 之后的部分并转小写 (`Heart_Queen` -> `queen`)
/// - 没有分隔符时去掉末尾的单字母花色标记 (`KC` -> `k`, `10s` -> `10`)
///
/// 这是一个全函数，任何输入都不会 panic。
pub fn canonical_rank(name: &str) -> String {
    let name = base_name(name).to_lowercase();
    if let Some((_, rank)) = name.rsplit_once('_') {
        return rank.to_string();
    }
    let mut rank: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
    if rank.chars().count() > 1 && rank.ends_with(['s', 'h', 'c', 'd']) {
        rank.pop();
    }
    rank
}

/// 百家乐点值；无法解析的点数按 0 处理
pub fn point_value(rank: &str) -> u8 {
    Rank::from_canonical(rank).map_or(0, Rank::point_value)
}

fn parse_suit(name: &str) -> Option<Suit> {
    let name = base_name(name);
    match name.split_once('_') {
        Some((suit, _)) => Suit::from_name(suit),
        None => {
            let compact: Vec<char> = name.chars().filter(|c| c.is_alphanumeric()).collect();
            if compact.len() > 1 { compact.last().and_then(|c| Suit::from_letter(*c)) } else { None }
        }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠️",
            Suit::Heart => "♥️",
            Suit::Club => "♣️",
            Suit::Diamond => "♦️",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

impl fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// --- 牌靴生成 ---

/// 创建一副完整的 52 张扑克牌
pub fn create_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in &Rank::ALL {
            deck.push(Card { rank, suit });
        }
    }
    deck
}

/// 把 `decks` 副牌合在一起洗匀，模拟牌靴使用
pub fn shuffled_shoe(decks: usize) -> Vec<Card> {
    let mut shoe: Vec<Card> = (0..decks.max(1)).flat_map(|_| create_deck()).collect();
    shoe.shuffle(&mut rand::rng());
    shoe
}

// --- 单元测试 ---
