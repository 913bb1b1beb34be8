//! Terminal references and derived mutual (transfer-impedance) pairs.

use serde::{Deserialize, Serialize};

/// Maximum length of a mutual-pair logical name. Engine-side object names
/// are length-limited, so over-long concatenations are trimmed up front.
pub const MUTUAL_NAME_LIMIT: usize = 40;

/// A measurement terminal in the study model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalRef {
    /// Logical name used in result keys.
    pub name: String,
    /// Location path(s) of the underlying model element.
    pub locations: Vec<String>,
    /// Opt-in flag for transfer-impedance (mutual) measurements.
    #[serde(default)]
    pub include_in_transfer_impedance: bool,
}

/// An ordered terminal pair measuring transfer impedance from `from` to `to`.
///
/// The logical name is `from-to`, trimmed deterministically when over
/// [`MUTUAL_NAME_LIMIT`]; `planned_name` keeps the untrimmed form so reports
/// can show what the name would have been.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutualPairRef {
    pub from: String,
    pub to: String,
    pub planned_name: String,
    pub used_name: String,
}

impl MutualPairRef {
    pub fn was_trimmed(&self) -> bool {
        self.planned_name != self.used_name
    }
}

/// Derive mutual pairs from every ordered pair of distinct terminals where
/// either endpoint opts into transfer impedance.
///
/// The permissive either-endpoint rule means a terminal that opts in sees
/// its transfer impedance against every other terminal, in both directions.
pub fn derive_mutual_pairs(terminals: &[TerminalRef]) -> Vec<MutualPairRef> {
    let mut pairs = Vec::new();
    for from in terminals {
        for to in terminals {
            if from.name == to.name {
                continue;
            }
            if !(from.include_in_transfer_impedance || to.include_in_transfer_impedance) {
                continue;
            }
            let planned = format!("{}-{}", from.name, to.name);
            let used = trim_pair_name(&from.name, &to.name, MUTUAL_NAME_LIMIT);
            pairs.push(MutualPairRef {
                from: from.name.clone(),
                to: to.name.clone(),
                planned_name: planned,
                used_name: used,
            });
        }
    }
    pairs
}

/// Fit `{from}-{to}` into `limit` characters, trimming the longer half
/// first so both endpoints stay recognisable.
fn trim_pair_name(from: &str, to: &str, limit: usize) -> String {
    let full = format!("{}-{}", from, to);
    if full.chars().count() <= limit {
        return full;
    }
    let budget = limit.saturating_sub(1); // separator
    let from_len = from.chars().count();
    let to_len = to.chars().count();
    let half = budget / 2;
    let (keep_from, keep_to) = if from_len <= half {
        (from_len, budget - from_len)
    } else if to_len <= half {
        (budget - to_len, to_len)
    } else {
        (budget - half, half)
    };
    let head: String = from.chars().take(keep_from).collect();
    let tail: String = to.chars().take(keep_to).collect();
    format!("{}-{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal(name: &str, include: bool) -> TerminalRef {
        TerminalRef {
            name: name.into(),
            locations: vec![format!("grid/{name}")],
            include_in_transfer_impedance: include,
        }
    }

    #[test]
    fn either_endpoint_opting_in_creates_both_directions() {
        let terminals = vec![terminal("A", true), terminal("B", false)];
        let pairs = derive_mutual_pairs(&terminals);
        let names: Vec<_> = pairs.iter().map(|p| p.used_name.as_str()).collect();
        assert_eq!(names, vec!["A-B", "B-A"]);
    }

    #[test]
    fn no_opt_in_no_pairs() {
        let terminals = vec![terminal("A", false), terminal("B", false)];
        assert!(derive_mutual_pairs(&terminals).is_empty());
    }

    #[test]
    fn three_terminals_all_in_give_six_ordered_pairs() {
        let terminals = vec![terminal("A", true), terminal("B", true), terminal("C", true)];
        assert_eq!(derive_mutual_pairs(&terminals).len(), 6);
    }

    #[test]
    fn long_names_are_trimmed_deterministically() {
        let long_a = "SUBSTATION_NORTH_400KV_BUSBAR_SECTION_ONE";
        let long_b = "SUBSTATION_SOUTH_400KV_BUSBAR_SECTION_TWO";
        let terminals = vec![terminal(long_a, true), terminal(long_b, true)];
        let pairs = derive_mutual_pairs(&terminals);
        let pair = &pairs[0];
        assert!(pair.was_trimmed());
        assert_eq!(pair.used_name.chars().count(), MUTUAL_NAME_LIMIT);
        assert_eq!(pair.planned_name, format!("{}-{}", long_a, long_b));
        // deterministic: recomputing gives the same trimmed name
        let again = derive_mutual_pairs(&terminals);
        assert_eq!(again[0].used_name, pair.used_name);
    }

    #[test]
    fn short_plus_long_keeps_short_side_whole() {
        let used = trim_pair_name("PCC", "A_VERY_LONG_TERMINAL_NAME_THAT_OVERFLOWS_THE_LIMIT", 20);
        assert!(used.starts_with("PCC-"));
        assert_eq!(used.chars().count(), 20);
    }
}
