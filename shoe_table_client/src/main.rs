use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use shoe_table_core::{
    ClientMessage, GameKind, LedgerSnapshot, RoundEngine, RoundState, ServerMessage, Side, TableSnapshot, BEAD_ROWS,
    HAND_SIZE,
};

/// 控制台输入解析结果
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(ClientMessage),
    Exit,
    Unknown,
}

/// 按键映射: `1`/`2`(/`3`) 手动裁定，`/` 重置
fn parse_command(line: &str, game: Option<GameKind>) -> Command {
    let key = line.trim();
    let winners = game.map_or(&[][..], GameKind::winners);
    match key {
        "/" | "reset" => Command::Send(ClientMessage::Reset),
        "s" | "snapshot" => Command::Send(ClientMessage::GetSnapshot),
        "exit" | "quit" => Command::Exit,
        _ => match key.parse::<usize>() {
            Ok(n) if (1..=winners.len()).contains(&n) => Command::Send(winners[n - 1].into()),
            _ => Command::Unknown,
        },
    }
}

/// 珠盘路按行打印: 列是从上到下填的，所以要转置
fn render_beads(ledger: &LedgerSnapshot) -> String {
    (0..BEAD_ROWS)
        .map(|row| {
            ledger
                .bead_columns
                .iter()
                .map(|column| column.get(row).copied().unwrap_or('.'))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_counters(ledger: &LedgerSnapshot) -> String {
    ledger
        .counters
        .iter()
        .map(|(tally, count)| format!("{:?}={}", tally, count))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 当前这一局: 百家乐在收满四张前就显示两边的点数
fn render_round(round: &RoundState) -> String {
    let mut text = match round {
        RoundState::AndarBahar(round) => match round.joker() {
            None => "等待 Joker".to_string(),
            Some(joker) => format!(
                "Joker {} | ANDAR {} 张 BAHAR {} 张 | 下一张: {}",
                joker,
                round.cards_on(Side::Andar).len(),
                round.cards_on(Side::Bahar).len(),
                round.next_side()
            ),
        },
        RoundState::Baccarat(round) => format!(
            "已发 {}/{} 张 | PLAYER {} 点 BANKER {} 点",
            round.dealt().len(),
            HAND_SIZE,
            round.player_total(),
            round.banker_total()
        ),
    };
    if round.is_resolved() {
        text.push_str(" (本局已结束)");
    }
    text
}

fn render_snapshot(snapshot: &TableSnapshot) -> String {
    let ledger = &snapshot.ledger;
    let mut text = format!(
        "[{}] 已完成 {} 局\n{}\n{}",
        snapshot.game,
        ledger.games,
        render_round(&snapshot.round),
        render_counters(ledger)
    );
    if !ledger.bead_columns.is_empty() {
        text.push('\n');
        text.push_str(&render_beads(ledger));
    }
    if ledger.persist_failures > 0 {
        text.push_str(&format!("\n警告: {} 局未能写入历史文件", ledger.persist_failures));
    }
    text
}

fn describe(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Welcome { snapshot, .. } | ServerMessage::Snapshot(snapshot) => render_snapshot(snapshot),
        ServerMessage::JokerSet { card } => format!("Joker: {}", card),
        ServerMessage::CardDealt { slot, card } => format!("{} <- {}", slot, card),
        ServerMessage::CardRejected { card, reason } => format!("拒绝 {} ({:?})", card, reason),
        ServerMessage::UnknownToken { token } => format!("未知令牌 {:?}", token),
        ServerMessage::RoundResolved { entry } => format!("*** {}", entry.summary_line()),
        ServerMessage::RoundReset { round_id } => format!("新的一局 {}", round_id),
        ServerMessage::DeviceStatus { connected: true, detail } => format!("牌靴已连接: {}", detail),
        ServerMessage::DeviceStatus { connected: false, detail } => format!("牌靴断开: {}", detail),
        ServerMessage::Info { message } => message.clone(),
        ServerMessage::Error { message } => format!("错误: {}", message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let address = std::env::args().nth(1).unwrap_or_else(|| "ws://127.0.0.1:25917/ws".to_string());
    let url = Url::parse(&address).with_context(|| format!("无效的地址 {}", address))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await.context("无法连接")?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();
    // 欢迎消息里带着游戏种类，决定数字键的含义
    let (game_tx, game_rx) = watch::channel::<Option<GameKind>>(None);

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        if let ServerMessage::Welcome { game, .. } = &server_msg {
                            let _ = game_tx.send(Some(*game));
                        }
                        println!("\n<-- {}\n", describe(&server_msg));
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 牌靴桌面操作台 ---");
    println!("可用命令:");
    println!("  1 / 2                     - 安达巴哈: 手动判 ANDAR / BAHAR");
    println!("  1 / 2 / 3                 - 百家乐: 手动判 PLAYER / BANKER / TIE");
    println!("  /                         - 开始新的一局");
    println!("  s                         - 查看统计和珠盘路");
    println!("  exit                      - 退出");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let game = *game_rx.borrow();
        match parse_command(&line, game) {
            Command::Send(msg) => {
                let payload = serde_json::to_string(&msg)?;
                write.send(Message::Text(payload.into())).await?;
            }
            Command::Exit => {
                println!("正在断开连接...");
                break;
            }
            Command::Unknown => {
                println!("未知命令: {}", line);
            }
        }
    }

    Ok(())
}
