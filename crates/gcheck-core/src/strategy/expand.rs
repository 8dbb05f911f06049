//! Cartesian expansion of parameter groups and per-strategy normalization

use super::{ParameterGroup, SubstitutionTable};
use crate::error::{Error, Result};

/// Separator splitting one token into several program arguments
pub(crate) const SUB_TOKEN_SEPARATOR: char = '&';

/// Upper bound on raw combinations produced by one group batch
pub(crate) const MAX_RAW_STRATEGIES: usize = 1_000_000;

/// Product of the group sizes, `None` on overflow
pub(crate) fn raw_count(groups: &[ParameterGroup]) -> Option<usize> {
    groups
        .iter()
        .try_fold(1usize, |acc, group| acc.checked_mul(group.alternatives.len()))
}

/// Expand groups into `total` raw token lists.
///
/// The first declared group varies slowest and the last one fastest, the
/// same order nested loops in declaration order would produce.
pub(crate) fn expand(groups: &[ParameterGroup], total: usize) -> Result<Vec<Vec<String>>> {
    let mut raw = vec![Vec::with_capacity(groups.len()); total];
    let mut previous_steps = 1;

    for group in groups {
        previous_steps = apply_group(&mut raw, &group.alternatives, previous_steps, total)?;
    }

    if previous_steps != total {
        return Err(Error::Internal(format!(
            "expanded {previous_steps} combinations, expected {total}"
        )));
    }

    Ok(raw)
}

/// Append one group's token to every slot, returning the new step count
fn apply_group(
    raw: &mut [Vec<String>],
    alternatives: &[String],
    previous_steps: usize,
    total: usize,
) -> Result<usize> {
    if alternatives.is_empty() {
        return Err(Error::Internal("parameter group has no alternatives".into()));
    }
    if total == 0 || previous_steps == 0 {
        return Err(Error::Internal("expansion step count is zero".into()));
    }
    if raw.len() != total {
        return Err(Error::Internal(format!(
            "slot count {} differs from combination count {total}",
            raw.len()
        )));
    }

    let current_steps = previous_steps
        .checked_mul(alternatives.len())
        .filter(|steps| *steps <= total && total % steps == 0)
        .ok_or_else(|| Error::Internal("group sizes do not divide the combination count".into()))?;
    let block_length = total / current_steps;

    for (slot, tokens) in raw.iter_mut().enumerate() {
        let block = slot / block_length;
        tokens.push(alternatives[block % alternatives.len()].clone());
    }

    Ok(current_steps)
}

/// Substitute placeholders, split sub-tokens and drop repeated ones.
///
/// The first occurrence of a sub-token keeps its position. Empty sub-tokens
/// are dropped, so the result may be empty.
pub(crate) fn normalize(raw: &[String], table: &SubstitutionTable) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());

    for token in raw {
        let substituted = table.apply(token);
        for part in substituted.split(SUB_TOKEN_SEPARATOR) {
            if part.is_empty() || tokens.iter().any(|t| t == part) {
                continue;
            }
            tokens.push(part.to_string());
        }
    }

    tokens
}

/// Order-insensitive identity of a token list
pub(crate) fn signature(tokens: &[String]) -> Vec<String> {
    let mut sorted = tokens.to_vec();
    sorted.sort();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(alternatives: &[&str]) -> ParameterGroup {
        ParameterGroup {
            name: None,
            alternatives: alternatives.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_raw_count() {
        assert_eq!(raw_count(&[group(&["a", "b"]), group(&["c", "d", "e"])]), Some(6));
        assert_eq!(raw_count(&[]), Some(1));

        let huge: Vec<String> = (0..65_536).map(|i| i.to_string()).collect();
        let wide = ParameterGroup { name: None, alternatives: huge };
        let groups = vec![wide.clone(), wide.clone(), wide.clone(), wide.clone(), wide];
        assert_eq!(raw_count(&groups), None);
    }

    #[test]
    fn test_first_group_varies_slowest() {
        let groups = [group(&["a", "b"]), group(&["1", "2", "3"]), group(&["x", "y"])];
        let raw = expand(&groups, 12).unwrap();

        let joined: Vec<String> = raw.iter().map(|t| t.join("")).collect();
        assert_eq!(
            joined,
            vec![
                "a1x", "a1y", "a2x", "a2y", "a3x", "a3y", "b1x", "b1y", "b2x", "b2y", "b3x", "b3y"
            ]
        );
    }

    #[test]
    fn test_inconsistent_total_is_internal_error() {
        let groups = [group(&["a", "b"]), group(&["1", "2", "3"])];
        assert!(matches!(expand(&groups, 4), Err(Error::Internal(_))));
    }

    #[test]
    fn test_normalize_splits_and_dedups() {
        let table = SubstitutionTable::new().with("FAKESNI", "google.com");
        let raw = vec![
            "--a&--sni=FAKESNI".to_string(),
            "--b&&--a".to_string(),
            "--sni=google.com".to_string(),
        ];
        assert_eq!(normalize(&raw, &table), vec!["--a", "--sni=google.com", "--b"]);
    }

    #[test]
    fn test_normalize_can_be_empty() {
        let raw = vec!["&".to_string(), String::new()];
        assert!(normalize(&raw, &SubstitutionTable::new()).is_empty());
    }

    #[test]
    fn test_signature_is_order_insensitive() {
        let a = vec!["--x".to_string(), "--y".to_string()];
        let b = vec!["--y".to_string(), "--x".to_string()];
        assert_eq!(signature(&a), signature(&b));
    }
}
