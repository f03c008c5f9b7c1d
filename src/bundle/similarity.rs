//! String similarity used to recognise worker pools by their titles.
//!
//! Siblings such as `postgres: writer process` and
//! `postgres: checkpointer process` share a service identity that only shows
//! up as a common leading block. Matching blocks follow the classic
//! sequence-matcher definition (longest block first, then recursively left
//! and right of it) on `char`s, without junk heuristics. The similarity
//! ratio is the indel ratio `2 * LCS / (len(a) + len(b))`.

/// Minimum partial ratio (exclusive) for two titles to count as related.
pub const FUZZY_THRESHOLD: u8 = 53;

/// Characters trimmed from both ends of a reduced title.
const REDUCE_TRIM: &[char] = &['[', ']', ':', '-', ' '];

/// A matching block: `a[a_start..a_start+len] == b[b_start..b_start+len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Among equally long blocks the one starting earliest in `a`, then in `b`,
/// wins.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchBlock {
    let mut best = MatchBlock {
        a_start: alo,
        b_start: blo,
        len: 0,
    };
    // prev[j - blo + 1]: length of the common run ending at a[i - 1], b[j]
    let width = bhi.saturating_sub(blo) + 1;
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                cur[slot] = k;
                if k > best.len {
                    best = MatchBlock {
                        a_start: i + 1 - k,
                        b_start: j + 1 - k,
                        len: k,
                    };
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// All matching blocks in order, adjacent blocks merged, terminated by a
/// zero-length sentinel at `(a.len(), b.len())`.
pub fn matching_blocks(a: &[char], b: &[char]) -> Vec<MatchBlock> {
    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = longest_match(a, b, alo, ahi, blo, bhi);
        if m.len == 0 {
            continue;
        }
        blocks.push(m);
        if alo < m.a_start && blo < m.b_start {
            queue.push((alo, m.a_start, blo, m.b_start));
        }
        if m.a_start + m.len < ahi && m.b_start + m.len < bhi {
            queue.push((m.a_start + m.len, ahi, m.b_start + m.len, bhi));
        }
    }
    blocks.sort();

    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        match merged.last_mut() {
            Some(last)
                if last.a_start + last.len == block.a_start
                    && last.b_start + last.len == block.b_start =>
            {
                last.len += block.len;
            }
            _ => merged.push(block),
        }
    }
    merged.push(MatchBlock {
        a_start: a.len(),
        b_start: b.len(),
        len: 0,
    });
    merged
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

/// Similarity in `0.0..=1.0`: twice the common subsequence over the total length.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best ratio (0..=100) of the shorter string against windows of the longer
/// one, anchored at each matching block.
pub fn partial_ratio(s1: &str, s2: &str) -> u8 {
    if s1 == s2 {
        return 100;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0;
    }

    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut best = 0.0f64;
    for block in matching_blocks(&shorter, &longer) {
        let long_start = block.b_start.saturating_sub(block.a_start);
        let long_end = (long_start + shorter.len()).min(longer.len());
        let r = ratio_chars(&shorter, &longer[long_start..long_end]);
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    (best * 100.0).round() as u8
}

/// Two titles are related when their partial ratio exceeds the threshold.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
    partial_ratio(a, b) > FUZZY_THRESHOLD
}

/// Every consecutive pair of the sequence is related.
pub fn fuzzy_sequence_match<S: AsRef<str>>(seq: &[S]) -> bool {
    seq.windows(2)
        .all(|pair| fuzzy_match(pair[0].as_ref(), pair[1].as_ref()))
}

/// First matching block of `a` against `b`, as text from `a`.
fn leading_common_block(a: &str, b: &str) -> String {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let first = matching_blocks(&a, &b)[0];
    a[first.a_start..first.a_start + first.len].iter().collect()
}

/// Collapses a sequence to the block it has in common, pairwise and
/// repeatedly, then trims `[]:- ` from both ends.
pub fn reduce_sequence<S: AsRef<str>>(seq: &[S]) -> String {
    let mut current: Vec<String> = seq.iter().map(|s| s.as_ref().to_string()).collect();
    if current.is_empty() {
        return String::new();
    }
    while current.len() > 1 {
        current = current
            .windows(2)
            .map(|pair| leading_common_block(&pair[0], &pair[1]))
            .collect();
    }
    current[0].trim_matches(REDUCE_TRIM).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTGRES: [&str; 5] = [
        "postgres: checkpointer process",
        "postgres: writer process",
        "postgres: wal writer process",
        "postgres: autovacuum launcher process",
        "postgres: stats collector process",
    ];

    const ZABBIX: [&str; 4] = [
        "/usr/sbin/zabbix_agentd: collector [idle 1 sec]",
        "/usr/sbin/zabbix_agentd: listener #1 [waiting for connection]",
        "/usr/sbin/zabbix_agentd: listener #2 [waiting for connection]",
        "/usr/sbin/zabbix_agentd: active checks #1 [idle 1 sec]",
    ];

    // -------------------------------------------------------------------------
    // Tests for matching_blocks / ratio
    // -------------------------------------------------------------------------

    #[test]
    fn test_matching_blocks_classic_example() {
        let a: Vec<char> = "abxcd".chars().collect();
        let b: Vec<char> = "abcd".chars().collect();
        let blocks = matching_blocks(&a, &b);
        assert_eq!(
            blocks,
            vec![
                MatchBlock { a_start: 0, b_start: 0, len: 2 },
                MatchBlock { a_start: 3, b_start: 2, len: 2 },
                MatchBlock { a_start: 5, b_start: 4, len: 0 },
            ]
        );
    }

    #[test]
    fn test_matching_blocks_without_common_chars() {
        let a: Vec<char> = "abc".chars().collect();
        let b: Vec<char> = "xyz".chars().collect();
        assert_eq!(
            matching_blocks(&a, &b),
            vec![MatchBlock { a_start: 3, b_start: 3, len: 0 }]
        );
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("abcd", "abcd"), 1.0);
        assert_eq!(ratio("abcd", "wxyz"), 0.0);
        assert!((ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        // common subsequence "abcd" even though no block is longer than 2
        assert!((ratio("abxcd", "abcd") - 8.0 / 9.0).abs() < 1e-9);
        assert_eq!(ratio("", ""), 1.0);
    }

    // -------------------------------------------------------------------------
    // Tests for partial_ratio / fuzzy matching
    // -------------------------------------------------------------------------

    #[test]
    fn test_partial_ratio() {
        assert_eq!(partial_ratio("this is a test", "this is a test!"), 100);
        assert_eq!(partial_ratio("nginx", "nginx"), 100);
        assert_eq!(partial_ratio("", "nginx"), 0);
        assert!(partial_ratio("abc", "xyz") < 10);
    }

    #[test]
    fn test_fuzzy_sequence_match_service_pools() {
        assert!(fuzzy_sequence_match(&POSTGRES));
        assert!(fuzzy_sequence_match(&ZABBIX));
        assert!(fuzzy_sequence_match(&["php-fpm: pool main"; 4]));
    }

    #[test]
    fn test_fuzzy_sequence_match_agent_with_master() {
        let mut titles = vec!["/usr/sbin/zabbix_agentd -c /etc/zabbix/zabbix_agentd.conf"];
        titles.extend_from_slice(&ZABBIX);
        assert!(fuzzy_sequence_match(&titles));
    }

    #[test]
    fn test_fuzzy_sequence_match_unrelated() {
        assert!(!fuzzy_sequence_match(&[
            "/usr/sbin/zabbix_agentd: active checks #1 [idle 1 sec]",
            "postgres: checkpointer process",
            "php-fpm: pool main",
        ]));
        assert!(!fuzzy_sequence_match(&[
            "YK1UYU2C: child#0",
            "LCAR8XLT: child#1",
            "6I6P9FKE: child#2",
            "4ZTJ1YEH: child#3",
            "1Y261N7W: child#4",
            "unittest: master",
        ]));
        assert!(!fuzzy_match("/usr/bin/dockerd", "cron"));
    }

    // -------------------------------------------------------------------------
    // Tests for reduce_sequence
    // -------------------------------------------------------------------------

    #[test]
    fn test_reduce_sequence_postgres() {
        assert_eq!(reduce_sequence(&POSTGRES), "postgres");
    }

    #[test]
    fn test_reduce_sequence_zabbix() {
        assert_eq!(reduce_sequence(&ZABBIX), "/usr/sbin/zabbix_agentd");
    }

    #[test]
    fn test_reduce_sequence_identical() {
        assert_eq!(
            reduce_sequence(&["php-fpm: pool main"; 4]),
            "php-fpm: pool main"
        );
    }

    #[test]
    fn test_reduce_sequence_edge_cases() {
        let empty: [&str; 0] = [];
        assert_eq!(reduce_sequence(&empty), "");
        assert_eq!(reduce_sequence(&["[kworker]"]), "kworker");
        assert_eq!(reduce_sequence(&["abc", "xyz"]), "");
    }
}
