#![allow(missing_docs)]

use pathbench::pattern::compile;
use proptest::prelude::*;
use regex::Regex;

proptest! {
    #[test]
    fn prop_literal_patterns_are_only_anchored(pattern in "[a-z0-9_/.-]{0,24}") {
        prop_assert_eq!(compile(&pattern), format!("^{pattern}$"));
    }

    #[test]
    fn prop_label_wildcard_stays_within_one_segment(
        prefix in "/[a-z]{1,6}",
        label in "[a-z0-9]{0,8}",
        tail in "[a-z]{1,6}",
    ) {
        let matcher = Regex::new(&compile(&format!("{prefix}/*"))).unwrap();
        let same_segment = format!("{prefix}/{label}");
        let nested = format!("{prefix}/{label}/{tail}");
        prop_assert!(matcher.is_match(&same_segment));
        prop_assert!(!matcher.is_match(&nested));
    }

    #[test]
    fn prop_descendant_wildcard_matches_any_depth(
        root in "/[a-z]{1,6}",
        middle in prop::collection::vec("[a-z]{1,4}", 0..4),
        leaf in "[a-z]{1,6}",
    ) {
        let matcher = Regex::new(&compile(&format!("{root}/**/{leaf}"))).unwrap();
        let mut path = root.clone();
        for segment in &middle {
            path.push('/');
            path.push_str(segment);
        }
        path.push('/');
        path.push_str(&leaf);
        prop_assert!(matcher.is_match(&path));
    }

    #[test]
    fn prop_compiled_output_is_anchored(pattern in "[a-z/*.]{0,16}") {
        let compiled = compile(&pattern);
        prop_assert!(compiled.starts_with('^'));
        prop_assert!(compiled.ends_with('$'));
    }
}
