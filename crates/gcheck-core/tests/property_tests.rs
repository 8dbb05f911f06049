//! Property tests for the strategy compiler

use gcheck_core::strategy::{compile, SubstitutionTable};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Groups of alternatives drawn from a small token pool so duplicates are common
fn groups() -> impl Strategy<Value = Vec<Vec<String>>> {
    let token = prop::sample::select(vec!["-a", "-b", "-c", "-d", "--x=1", "--y&-a", "-e&-f"])
        .prop_map(str::to_string);
    prop::collection::vec(prop::collection::vec(token, 1..4), 1..4)
}

fn source(groups: &[Vec<String>]) -> String {
    let mut out = String::from("#PROTO=TCP\n");
    for group in groups {
        out.push_str("#KEY#");
        out.push_str(&group.join(";"));
        out.push_str("#\n");
    }
    out.push_str("#ENDGROUP#\n");
    out
}

proptest! {
    #[test]
    fn prop_count_bounded_by_product(groups in groups()) {
        let product: usize = groups.iter().map(Vec::len).product();
        let set = compile(&source(&groups), &SubstitutionTable::new()).unwrap();
        prop_assert!(set.len() <= product);
        prop_assert!(!set.is_empty());
    }

    #[test]
    fn prop_no_repeated_tokens(groups in groups()) {
        let set = compile(&source(&groups), &SubstitutionTable::new()).unwrap();
        for strategy in &set.strategies {
            let unique: HashSet<&String> = strategy.tokens.iter().collect();
            prop_assert_eq!(unique.len(), strategy.tokens.len());
            prop_assert!(strategy.tokens.iter().all(|t| !t.is_empty() && !t.contains('&')));
        }
    }

    #[test]
    fn prop_token_sets_are_distinct(groups in groups()) {
        let set = compile(&source(&groups), &SubstitutionTable::new()).unwrap();
        let mut seen = HashSet::new();
        for strategy in &set.strategies {
            let key: BTreeSet<&String> = strategy.tokens.iter().collect();
            prop_assert!(seen.insert(key));
        }
    }

    #[test]
    fn prop_compilation_is_deterministic(groups in groups()) {
        let text = source(&groups);
        let first = compile(&text, &SubstitutionTable::new()).unwrap();
        let second = compile(&text, &SubstitutionTable::new()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_first_strategy_takes_first_alternatives(groups in groups()) {
        let set = compile(&source(&groups), &SubstitutionTable::new()).unwrap();
        let mut expected: Vec<String> = Vec::new();
        for group in &groups {
            for part in group[0].split('&') {
                if !expected.iter().any(|t| t == part) {
                    expected.push(part.to_string());
                }
            }
        }
        prop_assert_eq!(&set.strategies[0].tokens, &expected);
    }
}
