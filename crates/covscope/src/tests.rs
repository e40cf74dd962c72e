//! Hypothesis tests for coverage scoping
//!
//! Each test states a falsifiable claim about the pipeline as a whole.

#![allow(clippy::unwrap_used, clippy::redundant_clone)]

use super::*;
use proptest::prelude::*;

fn path(s: &str) -> RepoRelativePath {
    RepoRelativePath::parse(s).unwrap()
}

fn headers() -> HeaderPolicy {
    HeaderPolicy::new(DEFAULT_HEADER_EXTENSIONS, 1)
}

// ============================================================================
// Strategies
// ============================================================================

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("buck2".to_string()),
        Just("tests".to_string()),
        Just("testsXYZ".to_string()),
        Just("pkg".to_string()),
        "[a-z]{1,6}",
    ]
}

fn file_path() -> impl Strategy<Value = RepoRelativePath> {
    (
        prop::collection::vec(segment(), 0..3),
        "[a-z]{1,5}",
        prop::sample::select(vec!["rs", "cpp", "h", "go"]),
    )
        .prop_map(|(dirs, stem, ext)| {
            let mut segments = vec!["fbcode".to_string()];
            segments.extend(dirs);
            segments.push(format!("{stem}.{ext}"));
            RepoRelativePath::from_segments(segments).unwrap()
        })
}

fn hits() -> impl Strategy<Value = HitSummary> {
    prop::collection::btree_map(1u32..50, 0u64..5, 0..6).prop_map(|lines| {
        let mut hits = HitSummary::new();
        for (line, count) in lines {
            hits.record_line(line, count);
        }
        hits
    })
}

fn language() -> impl Strategy<Value = LanguageTag> {
    prop::sample::select(vec![LanguageTag::Rust, LanguageTag::Cxx, LanguageTag::Go])
}

fn facts() -> impl Strategy<Value = Vec<(RepoRelativePath, HitSummary, LanguageTag)>> {
    prop::collection::vec((file_path(), hits(), language()), 0..20)
}

fn token() -> impl Strategy<Value = ScopeToken> {
    prop_oneof![
        prop::collection::vec(segment(), 0..2).prop_map(|dirs| {
            let mut segments = vec!["fbcode".to_string()];
            segments.extend(dirs);
            ScopeToken::PathPrefix(segments)
        }),
        file_path().prop_map(ScopeToken::ExactPath),
    ]
}

fn index_over(files: &[RepoRelativePath]) -> DependencyIndex {
    // Every header is included by every unit that compiles a sibling file
    let mut builder = DependencyIndex::builder();
    for (i, file) in files.iter().enumerate() {
        if file.extension() != Some("h") {
            let unit = format!("unit{i}");
            builder.add_edge(&unit, file.clone(), EdgeKind::Compiles);
            for header in files.iter().filter(|f| f.extension() == Some("h")) {
                builder.add_edge(&unit, header.clone(), EdgeKind::Includes);
            }
        }
    }
    builder.build()
}

// ============================================================================
// Scope filtering
// ============================================================================

proptest! {
    /// H₀-SCOPE-01: the filter never fabricates records
    #[test]
    fn prop_result_is_subset(facts in facts(), tokens in prop::collection::vec(token(), 0..4)) {
        let covered = CoverageSet::aggregate(facts.clone());
        let files: Vec<_> = facts.into_iter().map(|(p, _, _)| p).collect();
        let index = index_over(&files);
        let policy = headers();
        let result = ScopeFilter::new(&index, &policy).filter(&covered, &tokens);
        for file in result.iter() {
            prop_assert_eq!(covered.get(&file.logical_path), Some(file));
        }
    }

    /// H₀-SCOPE-02: no tokens, no output
    #[test]
    fn prop_no_tokens_is_empty(facts in facts()) {
        let covered = CoverageSet::aggregate(facts);
        let index = DependencyIndex::default();
        let policy = headers();
        prop_assert!(ScopeFilter::new(&index, &policy).filter(&covered, &[]).is_empty());
    }

    /// H₀-SCOPE-03: prefix matching respects segment boundaries
    #[test]
    fn prop_prefix_is_segment_wise(facts in facts()) {
        let covered = CoverageSet::aggregate(facts);
        let index = DependencyIndex::default();
        let policy = headers();
        let token = ScopeToken::PathPrefix(vec!["fbcode".into(), "buck2".into(), "tests".into()]);
        let result = ScopeFilter::new(&index, &policy).filter(&covered, &[token]);
        for file in result.iter() {
            let segments = file.logical_path.segments();
            prop_assert_eq!(segments[1].as_str(), "buck2");
            prop_assert_eq!(segments[2].as_str(), "tests");
        }
        for file in covered.iter() {
            let segments = file.logical_path.segments();
            let expected = segments.len() > 3 && segments[1] == "buck2" && segments[2] == "tests";
            prop_assert_eq!(result.contains(&file.logical_path), expected);
        }
    }

    /// H₀-SCOPE-04: token order does not change the result
    #[test]
    fn prop_tokens_commute(facts in facts(), mut tokens in prop::collection::vec(token(), 0..4)) {
        let covered = CoverageSet::aggregate(facts.clone());
        let files: Vec<_> = facts.into_iter().map(|(p, _, _)| p).collect();
        let index = index_over(&files);
        let policy = headers();
        let filter = ScopeFilter::new(&index, &policy);
        let forward = filter.filter(&covered, &tokens);
        tokens.reverse();
        prop_assert_eq!(forward, filter.filter(&covered, &tokens));
    }
}

// ============================================================================
// Aggregation
// ============================================================================

proptest! {
    /// H₀-AGG-01: input order does not change the aggregate
    #[test]
    fn prop_aggregate_order_independent(facts in facts()) {
        let forward = CoverageSet::aggregate(facts.clone());
        let backward = CoverageSet::aggregate(facts.into_iter().rev());
        prop_assert_eq!(forward, backward);
    }

    /// H₀-AGG-02: splitting the input across workers does not change the aggregate
    #[test]
    fn prop_partial_sets_reduce_to_whole(facts in facts(), split in 0usize..20) {
        let split = split.min(facts.len());
        let whole = CoverageSet::aggregate(facts.clone());
        let (left, right) = facts.split_at(split);
        let reduced = CoverageSet::aggregate(left.to_vec()).merge(CoverageSet::aggregate(right.to_vec()));
        prop_assert_eq!(whole, reduced);
    }

    /// H₀-AGG-03: one record per logical path
    #[test]
    fn prop_paths_unique(facts in facts()) {
        let distinct: std::collections::BTreeSet<_> = facts.iter().map(|(p, _, _)| p.clone()).collect();
        prop_assert_eq!(CoverageSet::aggregate(facts).len(), distinct.len());
    }
}

// ============================================================================
// Header expansion
// ============================================================================

mod header_expansion_tests {
    use super::*;

    const PKG: &str = "fbcode/testing_frameworks/code_coverage/rust";

    fn scenario() -> (CoverageSet, DependencyIndex) {
        let header = path(&format!("{PKG}/AdderWithHeaderCode.h"));
        let cpp = path(&format!("{PKG}/AdderWithHeaderCode.cpp"));
        let bridge = path(&format!(
            "fbcode/a1b2c3d4e5f60718/testing_frameworks/code_coverage/rust/\
             __tests_with_code_in_cpp_header-bridge_generated.cc__/out/generated.cc"
        ))
        .with_volatile_segment(1);
        let folly = path("fbcode/folly/Range.h");

        let index = DependencyIndex::builder()
            .edge("cpp", cpp.clone(), EdgeKind::Compiles)
            .edge("cpp", header.clone(), EdgeKind::Includes)
            .edge("cpp", folly.clone(), EdgeKind::Includes)
            .edge("bridge", bridge.clone(), EdgeKind::Compiles)
            .edge("bridge", header.clone(), EdgeKind::Includes)
            .build();
        let covered = CoverageSet::aggregate([
            (header, HitSummary::new(), LanguageTag::Cxx),
            (cpp, HitSummary::new(), LanguageTag::Cxx),
            (bridge, HitSummary::new(), LanguageTag::Cxx),
            (folly, HitSummary::new(), LanguageTag::Cxx),
            (path(&format!("{PKG}/lib.rs")), HitSummary::new(), LanguageTag::Rust),
        ]);
        (covered, index)
    }

    /// H₀-HDR-01: a header token pulls in the units that include it
    #[test]
    fn test_header_token_includes_dependents() {
        let (covered, index) = scenario();
        let policy = headers();
        let parser = ScopeParser::new("fbcode", &policy);
        let tokens = parser
            .parse_all(&["testing_frameworks/code_coverage/rust/AdderWithHeaderCode.h"])
            .unwrap();
        let paths = ScopeFilter::new(&index, &policy).filter(&covered, &tokens).paths();

        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&format!("{PKG}/AdderWithHeaderCode.cpp")));
        assert!(paths.contains(&format!("{PKG}/AdderWithHeaderCode.h")));
        assert!(paths.iter().any(|p| p.ends_with("bridge_generated.cc__/out/generated.cc")));
        assert!(!paths.iter().any(|p| p.contains("folly")));
        assert!(!paths.iter().any(|p| p.ends_with("lib.rs")));
    }

    /// H₀-HDR-02: expanding twice gives the same answer
    #[test]
    fn test_header_expansion_idempotent() {
        let (covered, index) = scenario();
        let policy = headers();
        let token = [ScopeToken::ExactPath(path(&format!("{PKG}/AdderWithHeaderCode.h")))];
        let filter = ScopeFilter::new(&index, &policy);
        assert_eq!(filter.filter(&covered, &token), filter.filter(&covered, &token));
    }

    /// H₀-HDR-03: a package prefix matches generated code through its package view
    #[test]
    fn test_prefix_matches_generated_code() {
        let (covered, index) = scenario();
        let policy = headers();
        let tokens = ScopeParser::new("fbcode", &policy)
            .parse_all(&["fbcode/testing_frameworks/code_coverage/rust"])
            .unwrap();
        let result = ScopeFilter::new(&index, &policy).filter(&covered, &tokens);
        assert_eq!(result.len(), 4);
    }
}
