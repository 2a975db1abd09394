use crate::card::{create_deck, CardIdentity};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// 读取牌表时可能出现的错误
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("无法读取牌表 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("牌表格式错误: {0}")]
    Format(#[from] serde_json::Error),
}

/// 牌表 (Card Registry)
///
/// 设备原始令牌 -> 牌身份 的只读映射。启动时加载一次，之后在各任务间共享。
/// 牌表文件是一个 JSON 对象，例如 `{"AS": "spade_ace", "10H": "heart_10"}`。
#[derive(Debug, Clone, Default)]
pub struct CardRegistry {
    cards: HashMap<String, CardIdentity>,
}

impl CardRegistry {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cards = pairs
            .into_iter()
            .map(|(token, name)| (token.into(), CardIdentity::new(name)))
            .collect();
        CardRegistry { cards }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::from_pairs(raw))
    }

    pub fn try_load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// 加载牌表；文件缺失或格式错误时退化为空表 (所有查询都未命中)，不会中断进程
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(registry) => {
                info!("已加载牌表 {}，共 {} 个令牌", path.display(), registry.len());
                registry
            }
            Err(e) => {
                warn!("{}，牌表退化为空表", e);
                Self::default()
            }
        }
    }

    /// 标准 52 张牌表: `AS` -> `spade_ace`, `10H` -> `heart_10` ...
    pub fn standard() -> Self {
        Self::from_pairs(create_deck().into_iter().map(|card| (card.token(), card.name())))
    }

    pub fn lookup(&self, token: &str) -> Option<&CardIdentity> {
        self.cards.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.cards.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.cards.keys().map(String::as_str)
    }
}
