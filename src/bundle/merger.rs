//! Collapses bundles that ended up with the same name.

use crate::bundle::builder::ProcBundle;
use ahash::AHashMap as HashMap;
use tracing::debug;

/// Merges bundles by name. The first bundle carrying a name keeps its slot
/// and its leader; later ones append their members to it.
pub fn merge_by_name(bundles: Vec<ProcBundle>) -> Vec<ProcBundle> {
    let mut merged: Vec<ProcBundle> = Vec::with_capacity(bundles.len());
    let mut slot_by_name: HashMap<String, usize> = HashMap::new();

    for bundle in bundles {
        match slot_by_name.get(&bundle.name) {
            Some(&slot) => {
                debug!(
                    "Merging {} processes into bundle '{}'",
                    bundle.members.len(),
                    bundle.name
                );
                merged[slot].members.extend(bundle.members);
            }
            None => {
                slot_by_name.insert(bundle.name.clone(), merged.len());
                merged.push(bundle);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(name: &str, leader: u32, members: &[u32]) -> ProcBundle {
        ProcBundle {
            name: name.to_string(),
            leader,
            members: members.to_vec(),
        }
    }

    #[test]
    fn test_same_name_is_merged_into_first() {
        let merged = merge_by_name(vec![
            bundle("nginx", 10, &[10, 11]),
            bundle("sshd", 20, &[20]),
            bundle("nginx", 30, &[30, 31, 32]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "nginx");
        assert_eq!(merged[0].leader, 10);
        assert_eq!(merged[0].members, vec![10, 11, 30, 31, 32]);
        assert_eq!(merged[1].name, "sshd");
    }

    #[test]
    fn test_unique_names_untouched() {
        let input = vec![bundle("a", 1, &[1]), bundle("b", 2, &[2, 3])];
        assert_eq!(merge_by_name(input.clone()), input);
        assert!(merge_by_name(Vec::new()).is_empty());
    }
}
