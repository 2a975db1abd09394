use crate::card::CardIdentity;
use crate::state::{GameKind, OutcomeDetail, RoundId, RoundOutcome, Winner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::warn;

/// 珠盘路每列的行数
pub const BEAD_ROWS: usize = 6;
/// 小路每行的格数
pub const ROAD_WIDTH: usize = 30;

/// 统计项
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tally {
    Andar,
    Bahar,
    Player,
    Banker,
    Tie,
    PlayerPair,
    BankerPair,
    Natural,
    SuperSix,
}

impl Tally {
    pub fn for_game(kind: GameKind) -> &'static [Tally] {
        match kind {
            GameKind::AndarBahar => &[Tally::Andar, Tally::Bahar],
            GameKind::Baccarat => &[
                Tally::Player, Tally::Banker, Tally::Tie,
                Tally::PlayerPair, Tally::BankerPair, Tally::Natural, Tally::SuperSix,
            ],
        }
    }
}

impl From<Winner> for Tally {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Andar => Tally::Andar,
            Winner::Bahar => Tally::Bahar,
            Winner::Player => Tally::Player,
            Winner::Banker => Tally::Banker,
            Winner::Tie => Tally::Tie,
        }
    }
}

fn card_names(cards: &[CardIdentity]) -> String {
    cards.iter().map(CardIdentity::name).collect::<Vec<_>>().join(",")
}

/// 历史记录中的一条，追加后永不修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 从 1 开始的局号
    pub game_no: u64,
    pub round_id: RoundId,
    pub outcome: RoundOutcome,
}

impl LedgerEntry {
    /// 一局的完整摘要行
    pub fn summary_line(&self) -> String {
        let winner = self.outcome.winner;
        let body = match &self.outcome.detail {
            OutcomeDetail::Baccarat(hand) => {
                let mut line = format!(
                    "Player {} ({}) vs Banker {} ({}) => {}",
                    card_names(&hand.player), hand.player_total,
                    card_names(&hand.banker), hand.banker_total,
                    winner,
                );
                let extras = hand.flags.labels();
                if !extras.is_empty() {
                    line.push_str(&format!(" [{}]", extras.join(", ")));
                }
                if self.outcome.manual {
                    line.push_str(" (manual)");
                }
                line
            }
            OutcomeDetail::AndarBahar { joker, matching: Some(card), .. } => {
                let joker = joker.as_ref().map_or("-", |j| j.name());
                format!("Joker {} | {} on {} => {}", joker, card, winner, winner)
            }
            OutcomeDetail::AndarBahar { matching: None, .. } => format!("Manual result => {}", winner),
        };
        format!("Game {}: {}", self.game_no, body)
    }
}

/// 持久化文件的写法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryFormat {
    /// 每局一行，只写胜方记号
    Compact,
    /// 每局一行完整摘要
    Summary,
}

/// 只追加的持久化目标
pub trait HistorySink: Send {
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

/// 追加写入纯文本文件，每次写入都同步打开并追加
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into() }
    }
}

impl HistorySink for FileSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()
    }
}

/// 珠盘路: 按列从上到下填满 `rows` 行后换下一列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeadPlate {
    rows: usize,
    columns: Vec<Vec<char>>,
}

impl BeadPlate {
    pub fn new(rows: usize) -> Self {
        BeadPlate { rows: rows.max(1), columns: Vec::new() }
    }

    pub fn push(&mut self, symbol: char) {
        match self.columns.last_mut() {
            Some(column) if column.len() < self.rows => column.push(symbol),
            _ => self.columns.push(vec![symbol]),
        }
    }

    pub fn columns(&self) -> &[Vec<char>] {
        &self.columns
    }
}

/// 小路: 线性序列，按固定宽度从左到右、逐行排列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CockroachRoad {
    width: usize,
    cells: Vec<char>,
}

impl CockroachRoad {
    pub fn new(width: usize) -> Self {
        CockroachRoad { width: width.max(1), cells: Vec::new() }
    }

    pub fn push(&mut self, symbol: char) {
        self.cells.push(symbol);
    }

    pub fn rows(&self) -> Vec<Vec<char>> {
        self.cells.chunks(self.width).map(<[char]>::to_vec).collect()
    }
}

/// 给显示层的只读快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub games: u64,
    pub counters: BTreeMap<Tally, u32>,
    pub bead_columns: Vec<Vec<char>>,
    pub road_rows: Vec<Vec<char>>,
    pub last: Option<LedgerEntry>,
    /// 持久化失败次数；大于 0 说明历史文件不完整
    pub persist_failures: u32,
}

/// 历史账本 (History Ledger)
///
/// 历史显示的唯一数据来源。只追加，不修改、不重排已有记录。
pub struct HistoryLedger {
    kind: GameKind,
    entries: Vec<LedgerEntry>,
    counters: BTreeMap<Tally, u32>,
    beads: BeadPlate,
    road: CockroachRoad,
    sink: Option<Box<dyn HistorySink>>,
    format: HistoryFormat,
    persist_failures: u32,
}

impl HistoryLedger {
    /// 只在内存中记录
    pub fn new(kind: GameKind) -> Self {
        HistoryLedger {
            kind,
            entries: Vec::new(),
            counters: Tally::for_game(kind).iter().map(|t| (*t, 0)).collect(),
            beads: BeadPlate::new(BEAD_ROWS),
            road: CockroachRoad::new(ROAD_WIDTH),
            sink: None,
            format: HistoryFormat::Compact,
            persist_failures: 0,
        }
    }

    /// 每局结果同时同步追加到 `sink`
    pub fn with_sink(kind: GameKind, sink: Box<dyn HistorySink>, format: HistoryFormat) -> Self {
        HistoryLedger { sink: Some(sink), format, ..Self::new(kind) }
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn games(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn count(&self, tally: Tally) -> u32 {
        self.counters.get(&tally).copied().unwrap_or(0)
    }

    /// 追加一局结果；持久化失败只记日志，不影响内存中的统计
    pub fn append(&mut self, entry: LedgerEntry) {
        let outcome = &entry.outcome;
        let symbol = outcome.winner.symbol();

        *self.counters.entry(outcome.winner.into()).or_insert(0) += 1;
        let flags = outcome.flags();
        for (set, tally) in [
            (flags.pair_player, Tally::PlayerPair),
            (flags.pair_banker, Tally::BankerPair),
            (flags.natural, Tally::Natural),
            (flags.super_six, Tally::SuperSix),
        ] {
            if set {
                *self.counters.entry(tally).or_insert(0) += 1;
            }
        }

        self.beads.push(symbol);
        self.road.push(symbol);

        if let Some(sink) = self.sink.as_mut() {
            let line = match self.format {
                HistoryFormat::Compact => symbol.to_string(),
                HistoryFormat::Summary => entry.summary_line(),
            };
            if let Err(e) = sink.append_line(&line) {
                self.persist_failures += 1;
                warn!("历史记录写入失败 (第 {} 局): {}", entry.game_no, e);
            }
        }

        self.entries.push(entry);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            games: self.games(),
            counters: self.counters.clone(),
            bead_columns: self.beads.columns().to_vec(),
            road_rows: self.road.rows(),
            last: self.entries.last().cloned(),
            persist_failures: self.persist_failures,
        }
    }
}

// --- 单元测试 ---
