//! Bundle name derivation.
//!
//! `name_from_cmdargs` turns one command line into a short identity.
//! `derive_bundle_name` picks the name of a finished bundle: "kernel" for
//! boundary leaders, the common title of a recognisable worker pool, or the
//! leader's command-line name.

use crate::bundle::boundary::BoundaryPredicate;
use crate::bundle::similarity::{fuzzy_sequence_match, reduce_sequence};
use crate::process::{ProcessMirror, Snapshot};
use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Name of every bundle led by a kernel-boundary process.
pub const KERNEL_BUNDLE: &str = "kernel";

/// Name used when nothing else yields one.
pub const UNKNOWN_BUNDLE: &str = "unknown";

/// Maximum length of a name derived in the general case.
pub const MAX_NAME_LEN: usize = 20;

/// Shortest accepted worker-pool title.
const MIN_REDUCED_LEN: usize = 3;

/// Pool titles are compared on this many leading characters at most.
const MAX_POOL_TITLE_LEN: usize = 256;

static INTERPRETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(python|perl|ruby|node|nodejs|php|bash|sh|dash|zsh|ksh|lua|tclsh|java)[0-9.]*$")
        .unwrap_or_else(|e| panic!("invalid interpreter pattern: {}", e))
});

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

/// True for tokens naming a script interpreter, with or without a path or
/// version suffix.
pub fn is_interpreter(token: &str) -> bool {
    INTERPRETER.is_match(basename(token))
}

/// Processes that rewrote their own title leave several tokens, some of
/// them empty.
fn is_self_titled(tokens: &[&str]) -> bool {
    tokens.len() > 1 && tokens.iter().any(|t| t.is_empty())
}

/// Tokens that carry the identity of a process: no flags, no interpreters,
/// and a leading absolute path reduced to its file name.
fn identity_tokens<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut kept: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !t.is_empty() && !t.starts_with('-') && !is_interpreter(t))
        .collect();
    if let Some(first) = kept.first_mut() {
        if first.starts_with('/') {
            *first = basename(first);
        }
    }
    kept
}

/// Derives a name from command-line tokens.
///
/// Processes that rewrote their own title (several tokens, some of them
/// empty) are trusted: the first word of the first token is returned.
/// Otherwise flags and interpreters are dropped, an absolute path is reduced
/// to its file name, the rest is joined with `:` and cut to
/// `MAX_NAME_LEN` characters.
pub fn name_from_cmdargs<S: AsRef<str>>(tokens: &[S]) -> String {
    let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();

    if is_self_titled(&tokens) {
        let title = tokens[0]
            .split(' ')
            .next()
            .unwrap_or("")
            .trim_matches(|c| c == ':' || c == '-');
        if !title.is_empty() {
            return title.to_string();
        }
    }

    let kept = identity_tokens(&tokens);
    let fallback = || basename(tokens.first().copied().unwrap_or("")).to_string();

    if kept.is_empty() {
        return fallback();
    }

    let joined = kept.join(":");
    let name: String = joined
        .split(' ')
        .next()
        .unwrap_or("")
        .trim_end_matches(':')
        .chars()
        .take(MAX_NAME_LEN)
        .collect();

    if name.is_empty() {
        fallback()
    } else {
        name
    }
}

/// Name of a leader on its own: its command line, then its short name.
pub fn leader_name(leader: &ProcessMirror, boundary: &dyn BoundaryPredicate) -> String {
    if boundary.is_boundary(leader) {
        return KERNEL_BUNDLE.to_string();
    }
    let name = name_from_cmdargs(&leader.cmdline);
    if !name.is_empty() {
        return name;
    }
    if !leader.name.is_empty() {
        return leader.name.clone();
    }
    UNKNOWN_BUNDLE.to_string()
}

/// Largest set of members sharing one parent, if it has at least two
/// entries. Ties go to the lower parent pid.
fn largest_sibling_set<'a>(snapshot: &'a Snapshot, members: &[u32]) -> Vec<&'a ProcessMirror> {
    let mut by_parent: HashMap<u32, Vec<&ProcessMirror>> = HashMap::new();
    for m in members.iter().filter_map(|&pid| snapshot.get(pid)) {
        if m.ppid != 0 {
            by_parent.entry(m.ppid).or_default().push(m);
        }
    }

    let mut sets: Vec<(u32, Vec<&ProcessMirror>)> = by_parent.into_iter().collect();
    sets.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    match sets.into_iter().next() {
        Some((_, mut set)) if set.len() >= 2 => {
            set.sort_by_key(|m| m.pid);
            set
        }
        _ => Vec::new(),
    }
}

/// Title of one pool member as compared against its siblings. Self-titled
/// processes keep their title; everything else goes through the same token
/// filter as `name_from_cmdargs`, joined with spaces.
fn pool_title(member: &ProcessMirror) -> String {
    let tokens: Vec<&str> = member.cmdline.iter().map(String::as_str).collect();
    let title = if is_self_titled(&tokens) {
        tokens[0].trim().to_string()
    } else if tokens.is_empty() {
        member.name.clone()
    } else {
        identity_tokens(&tokens).join(" ")
    };
    title.chars().take(MAX_POOL_TITLE_LEN).collect()
}

/// Common title of a worker pool inside the bundle, if there is one.
///
/// Byte-identical titles of self-titled processes are taken whole. Any
/// other reduced title is cut to its first word unless the pool is
/// self-titled, then to `MAX_NAME_LEN`. A title that starts with an
/// interpreter is rejected.
pub fn sibling_title(snapshot: &Snapshot, members: &[u32]) -> Option<String> {
    let siblings = largest_sibling_set(snapshot, members);
    if siblings.is_empty() {
        return None;
    }

    let titles: Vec<String> = siblings.iter().copied().map(pool_title).collect();
    if !fuzzy_sequence_match(&titles) {
        return None;
    }

    let self_titled = siblings.iter().all(|m| {
        let tokens: Vec<&str> = m.cmdline.iter().map(String::as_str).collect();
        is_self_titled(&tokens)
    });
    let identical = titles.windows(2).all(|pair| pair[0] == pair[1]);

    let reduced = reduce_sequence(&titles);
    let first_word = reduced
        .split(' ')
        .next()
        .unwrap_or("")
        .trim_end_matches(':')
        .to_string();
    if is_interpreter(&first_word) {
        return None;
    }

    let name: String = if self_titled && identical {
        reduced
    } else if self_titled {
        reduced.chars().take(MAX_NAME_LEN).collect()
    } else {
        first_word.chars().take(MAX_NAME_LEN).collect()
    };
    let name = name.trim_end_matches(|c| c == ':' || c == ' ').to_string();

    if name.chars().count() < MIN_REDUCED_LEN {
        return None;
    }
    Some(name)
}

/// Final name of a bundle with the given leader and members.
pub fn derive_bundle_name(
    snapshot: &Snapshot,
    leader: &ProcessMirror,
    members: &[u32],
    boundary: &dyn BoundaryPredicate,
) -> String {
    if boundary.is_boundary(leader) {
        return KERNEL_BUNDLE.to_string();
    }
    sibling_title(snapshot, members).unwrap_or_else(|| leader_name(leader, boundary))
}
