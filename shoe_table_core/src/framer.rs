//! 串口字节流分帧
//!
//! 牌靴有时用 CR/LF 分隔令牌，有时直接连续发送 2~4 个字符的定长令牌，
//! 读取粒度也没有保证。分帧器把收到的字节先放进缓冲区，每次只在缓冲区开头做决定：
//!
//! 1. 开头的 CR/LF/空白直接跳过 (半截行里的空白保留)。
//! 2. 依次尝试长度 2、3、4 的前缀 (不跨越分隔符)，第一个能在牌表里命中的作为令牌输出。
//! 3. 都没命中时，只要缓冲区里已有分隔符，就把分隔符之前的整段作为候选令牌输出，不论长短。
//! 4. 否则，如果开头这段已经超过重同步阈值，跳过一个字节后重试。
//! 5. 其余情况等待更多数据。
//!
//! 被跳过的字节先留在半截行里: 如果这一行随后等到了分隔符，它们和后面的字节拼回完整的一行输出；
//! 如果先从中间识别出了定长令牌，它们才算真正丢弃。半截行最多保留 `MAX_SEGMENT` 个字节，
//! 超长的行只输出最后 `MAX_SEGMENT` 个字节。
//!
//! 所以分隔的整行无论怎样分块到达，输出都相同。唯一的例外是开头无法识别、又超过阈值的行:
//! 分隔符到达之前就从行中间识别出的定长令牌，会按令牌输出。

use crate::registry::CardRegistry;
use tracing::trace;

/// 重同步阈值: 缓冲区开头超过这么多字节仍无法识别、也没有分隔符时开始逐字节跳过
pub const RESYNC_THRESHOLD: usize = 8;

/// 一个分隔段最多保留的字节数
pub const MAX_SEGMENT: usize = 64;

const PREFIX_LENGTHS: [usize; 3] = [2, 3, 4];

/// 分帧结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 在牌表中命中的令牌
    Token(String),
    /// 由分隔符切出、但牌表里没有的候选令牌
    Unrecognized(String),
}

#[derive(Debug, Default)]
pub struct TokenFramer {
    buffer: Vec<u8>,
    // 重同步跳过、但所在行还没结束的字节
    pending: Vec<u8>,
    dropped: u64,
}

fn is_delimiter(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

impl TokenFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块新数据；空块相当于一次无数据的轮询
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// 尚未消费的字节数，包括半截行
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.pending.len()
    }

    /// 重同步累计丢弃的字节数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// 取出下一个帧；需要更多数据时返回 `None`
    pub fn next_frame(&mut self, registry: &CardRegistry) -> Option<Frame> {
        loop {
            if self.pending.is_empty() {
                let skip = self.buffer.iter().take_while(|b| b.is_ascii_whitespace()).count();
                self.buffer.drain(..skip);
            }
            if self.buffer.is_empty() {
                return None;
            }

            let delimiter = self.buffer.iter().position(|&b| is_delimiter(b));
            let limit = delimiter.unwrap_or(self.buffer.len());

            // 半截行等到分隔符后整行输出，不再从中间找定长令牌
            if self.pending.is_empty() || delimiter.is_none() {
                for len in PREFIX_LENGTHS {
                    if len > limit {
                        break;
                    }
                    // 非法 UTF-8 的前缀不可能命中牌表
                    let Ok(candidate) = std::str::from_utf8(&self.buffer[..len]) else {
                        continue;
                    };
                    if registry.contains(candidate) {
                        let token = candidate.to_string();
                        self.buffer.drain(..len);
                        self.discard_pending();
                        return Some(Frame::Token(token));
                    }
                }
            }

            match delimiter {
                Some(end) => return Some(self.take_segment(end, registry)),
                None if limit > RESYNC_THRESHOLD => {
                    let byte = self.buffer.remove(0);
                    self.pending.push(byte);
                    if self.pending.len() > MAX_SEGMENT {
                        self.pending.remove(0);
                        self.dropped += 1;
                    }
                    trace!("重同步跳过字节 {:#04x}", byte);
                }
                None => return None,
            }
        }
    }

    /// 切出分隔符之前的整行 (连同半截行)，并吃掉分隔符
    fn take_segment(&mut self, end: usize, registry: &CardRegistry) -> Frame {
        let mut line = std::mem::take(&mut self.pending);
        line.extend(self.buffer.drain(..=end));
        line.pop();
        if line.len() > MAX_SEGMENT {
            let excess = line.len() - MAX_SEGMENT;
            line.drain(..excess);
            self.dropped += excess as u64;
        }
        let segment = String::from_utf8_lossy(&line).trim().to_string();
        if registry.contains(&segment) {
            Frame::Token(segment)
        } else {
            Frame::Unrecognized(segment)
        }
    }

    fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            trace!("重同步丢弃 {} 个字节", self.pending.len());
            self.dropped += self.pending.len() as u64;
            self.pending.clear();
        }
    }

    /// 惰性地取出当前缓冲区里所有能确定的帧；数据不足时结束，追加数据后可以再次调用
    pub fn frames<'a>(&'a mut self, registry: &'a CardRegistry) -> Frames<'a> {
        Frames { framer: self, registry }
    }
}

pub struct Frames<'a> {
    framer: &'a mut TokenFramer,
    registry: &'a CardRegistry,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.framer.next_frame(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn token(t: &str) -> Frame {
        Frame::Token(t.to_string())
    }

    fn unknown(t: &str) -> Frame {
        Frame::Unrecognized(t.to_string())
    }

    fn frame_all(registry: &CardRegistry, chunks: &[&[u8]]) -> Vec<Frame> {
        let mut framer = TokenFramer::new();
        let mut out = Vec::new();
        for chunk in chunks {
            framer.push(chunk);
            out.extend(framer.frames(registry));
        }
        out
    }

    fn frame_in_chunks(registry: &CardRegistry, bytes: &[u8], sizes: &[usize]) -> Vec<Frame> {
        let mut framer = TokenFramer::new();
        let mut out = Vec::new();
        let mut rest = bytes;
        let mut i = 0;
        while !rest.is_empty() {
            let n = sizes[i % sizes.len()].min(rest.len());
            framer.push(&rest[..n]);
            out.extend(framer.frames(registry));
            // 空读取是无操作
            framer.push(&[]);
            out.extend(framer.frames(registry));
            rest = &rest[n..];
            i += 1;
        }
        out
    }

    #[test]
    fn test_delimited_tokens() {
        let registry = CardRegistry::standard();
        let frames = frame_all(&registry, &[b"AS\r\n10H\nKC\r"]);
        assert_eq!(frames, vec![token("AS"), token("10H"), token("KC")]);
    }

    #[test]
    fn test_fixed_length_tokens_without_delimiter() {
        let registry = CardRegistry::standard();
        let frames = frame_all(&registry, &[b"AS10HKC2D"]);
        assert_eq!(frames, vec![token("AS"), token("10H"), token("KC"), token("2D")]);
    }

    #[test]
    fn test_four_char_token() {
        let registry = CardRegistry::from_pairs([("0x1f", "club_7"), ("AS", "spade_ace")]);
        let frames = frame_all(&registry, &[b"0x1fAS"]);
        assert_eq!(frames, vec![token("0x1f"), token("AS")]);
    }

    #[test]
    fn test_unknown_delimited_token_is_reported_once() {
        let registry = CardRegistry::standard();
        let frames = frame_all(&registry, &[b"ZZ\r\nAS\n"]);
        assert_eq!(frames, vec![unknown("ZZ"), token("AS")]);
    }

    #[test]
    fn test_delimited_token_of_any_length() {
        let registry = CardRegistry::from_pairs([("7", "club_7"), ("CARD42", "heart_queen")]);
        let frames = frame_all(&registry, &[b"7\nCARD42\r\nX\n"]);
        assert_eq!(frames, vec![token("7"), token("CARD42"), unknown("X")]);
    }

    #[test]
    fn test_waits_for_more_input() {
        let registry = CardRegistry::standard();
        let mut framer = TokenFramer::new();
        framer.push(b"1");
        assert_eq!(framer.next_frame(&registry), None);
        framer.push(b"0");
        assert_eq!(framer.next_frame(&registry), None);
        framer.push(b"H");
        assert_eq!(framer.next_frame(&registry), Some(token("10H")));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_resync_recovers_after_noise() {
        let registry = CardRegistry::standard();
        let mut framer = TokenFramer::new();
        framer.push(b"XX??AS");
        // 还没超过阈值，继续等待
        assert_eq!(framer.next_frame(&registry), None);
        assert_eq!(framer.dropped(), 0);

        framer.push(b"2H3D4C");
        let frames: Vec<Frame> = framer.frames(&registry).collect();
        assert_eq!(frames, vec![token("AS"), token("2H"), token("3D"), token("4C")]);
        assert_eq!(framer.dropped(), 4);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_noise_does_not_grow_buffer_without_bound() {
        let registry = CardRegistry::standard();
        let mut framer = TokenFramer::new();
        for _ in 0..100 {
            framer.push(b"?!#");
            assert_eq!(framer.next_frame(&registry), None);
            assert!(framer.buffered() <= RESYNC_THRESHOLD + MAX_SEGMENT);
        }
        assert_eq!(framer.dropped(), 300 - framer.buffered() as u64);
    }

    #[test]
    fn test_invalid_utf8_is_replaced_or_dropped() {
        let registry = CardRegistry::standard();
        let frames = frame_all(&registry, &[b"\xff\xfe\n", b"\xffAS\n", b"QH"]);
        assert_eq!(frames, vec![unknown("\u{fffd}\u{fffd}"), unknown("\u{fffd}AS"), token("QH")]);
    }

    #[test]
    fn test_frames_is_restartable() {
        let registry = CardRegistry::standard();
        let mut framer = TokenFramer::new();
        framer.push(b"AS");
        assert_eq!(framer.frames(&registry).collect::<Vec<_>>(), vec![token("AS")]);
        assert_eq!(framer.frames(&registry).count(), 0);
        framer.push(b"\r\nKD");
        assert_eq!(framer.frames(&registry).collect::<Vec<_>>(), vec![token("KD")]);
    }

    /// 整块送入和各种分块方式送入，输出必须完全相同
    fn assert_chunk_independent(registry: &CardRegistry, stream: &[u8], rng: &mut StdRng) -> Vec<Frame> {
        let whole = frame_all(registry, &[stream]);
        for size in 1..=stream.len() {
            assert_eq!(frame_in_chunks(registry, stream, &[size]), whole, "chunk size {size}");
        }
        for _ in 0..50 {
            let sizes: Vec<usize> = (0..8).map(|_| rng.random_range(1..=6)).collect();
            assert_eq!(frame_in_chunks(registry, stream, &sizes), whole, "chunk sizes {sizes:?}");
        }
        whole
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let registry = CardRegistry::standard();
        let streams: [&[u8]; 5] = [
            b"AS\r\n10H\r\nKC\r\nAD\r\n",
            b"AS10HKCAD9S9C2H",
            b"XX??AS2H3D4C",
            b"ZZ\r\n??????????????10DQS\nBAD\r\n7H",
            b"\xff\xfeJH\n12345678901234567\nAC",
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for stream in streams {
            assert_chunk_independent(&registry, stream, &mut rng);
        }
    }

    #[test]
    fn test_long_delimited_token_is_emitted_whole() {
        let registry = CardRegistry::from_pairs([("0123456789", "club_7"), ("AS", "spade_ace")]);
        let mut rng = StdRng::seed_from_u64(11);

        let frames = assert_chunk_independent(&registry, b"0123456789\r\n", &mut rng);
        assert_eq!(frames, vec![token("0123456789")]);

        let frames = assert_chunk_independent(&registry, b"12345678901234567\n", &mut rng);
        assert_eq!(frames, vec![unknown("12345678901234567")]);

        let frames = assert_chunk_independent(&registry, b"AS\n0123456789\nAS 0123456789 ZZ\r\nAS", &mut rng);
        assert_eq!(
            frames,
            vec![token("AS"), token("0123456789"), token("AS"), unknown("0123456789 ZZ"), token("AS")]
        );
    }

    #[test]
    fn test_overlong_line_keeps_its_tail() {
        let registry = CardRegistry::standard();
        let mut line = vec![b'?'; 100];
        line.extend_from_slice(b"END\nKH");
        let mut rng = StdRng::seed_from_u64(3);
        let frames = assert_chunk_independent(&registry, &line, &mut rng);

        let mut tail = "?".repeat(MAX_SEGMENT - 3);
        tail.push_str("END");
        assert_eq!(frames, vec![unknown(&tail), token("KH")]);

        let mut framer = TokenFramer::new();
        framer.push(&line);
        assert_eq!(framer.frames(&registry).count(), 2);
        assert_eq!(framer.dropped(), 103 - MAX_SEGMENT as u64);
        assert_eq!(framer.buffered(), 0);
    }
}
