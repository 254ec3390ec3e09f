//! Integration tests for bundlescope
//!
//! End-to-end coverage over the CLI binary plus cross-module property
//! checks that exercise the library the way the commands do.
//!
//! ```bash
//! cargo test --test integration_tests
//! cargo test --test integration_tests cli_beautify
//! ```

mod common;

use common::{TestBundle, SAMPLE_BUNDLE};

// ============================================================================
// beautify
// ============================================================================

mod cli_beautify {
    use super::*;

    #[test]
    fn splits_statements_and_writes_offset_map() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "a=1;b=2;c=3");
        bundle.run_cli_success(&["beautify", "b.js"]);

        let text = std::fs::read_to_string(bundle.path().join("b.js.beautified.js")).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["a=1;", "b=2;", "c=3"]);

        let map: Vec<usize> = serde_json::from_str(
            &std::fs::read_to_string(bundle.path().join("b.js.offsetmap.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(map, vec![0, 4, 8]);
    }

    #[test]
    fn copies_strings_verbatim() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", r#"x="a;b{c}";y=2"#);
        bundle.run_cli_success(&["beautify", "b.js"]);
        let text = std::fs::read_to_string(bundle.path().join("b.js.beautified.js")).unwrap();
        assert!(text.contains(r#""a;b{c}""#));
    }

    #[test]
    fn missing_file_exits_nonzero() {
        let bundle = TestBundle::new();
        let (code, _, stderr) = bundle.run_cli_failure(&["beautify", "absent.js"]);
        assert_eq!(code, 1);
        assert!(stderr.contains("absent.js"));
    }
}

// ============================================================================
// slice and context
// ============================================================================

mod cli_slice {
    use super::*;

    #[test]
    fn slices_requested_range() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let offset = SAMPLE_BUNDLE.find("queuedCommands").unwrap();
        let out = bundle.run_cli_success(&["slice", "b.js", &offset.to_string(), "20"]);
        assert!(out.contains("queuedCommands"));
    }

    #[test]
    fn context_shows_function_and_landmarks() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let offset = SAMPLE_BUNDLE.find("drained").unwrap();
        let out = bundle.run_cli_success(&["context", "b.js", &offset.to_string()]);
        assert!(out.contains("zO6"));
        assert!(out.contains("drained"));
        assert!(out.contains(">>>"));
    }
}

// ============================================================================
// find
// ============================================================================

mod cli_find {
    use super::*;

    #[test]
    fn groups_matches_by_function() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&["find", "b.js", "gA()"]);
        // gA() is called from the click handler
        assert!(out.contains("hnd"));
    }

    #[test]
    fn count_mode_tallies_per_function() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "function a(){t();t()}function b(){t()}");
        let out = bundle.run_cli_success(&["find", "b.js", "t()", "--count"]);
        assert!(out.contains("3 matches in 2 functions"));
    }

    #[test]
    fn regex_captures_are_reported() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&[
            "find",
            "b.js",
            r"async function (%V%)\(",
            "--regex",
            "--captures",
        ]);
        assert!(out.contains("zO6"));
    }

    #[test]
    fn limit_prints_truncation_footer() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "q q q q q");
        let out = bundle.run_cli_success(&["find", "b.js", "q", "--limit", "2"]);
        assert!(out.contains("and 3 more"));
    }
}

// ============================================================================
// match and patch-check (S4, S5)
// ============================================================================

mod cli_patch {
    use super::*;

    #[test]
    fn unique_pattern_exits_zero() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", r#"function foo(){return "unique_string"}"#);
        let out = bundle.run_cli_success(&["patch-check", "b.js", "unique_string"]);
        assert!(out.contains("UNIQUE"));
        assert!(out.contains("1 matches"));
    }

    #[test]
    fn ambiguous_pattern_exits_two() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", r#"var a="dup";var b="dup""#);
        let (code, stdout, _) = bundle.run_cli_failure(&["patch-check", "b.js", "dup"]);
        assert_eq!(code, 2);
        assert!(stdout.contains("AMBIGUOUS"));
        assert!(stdout.contains("2 matches"));
    }

    #[test]
    fn missing_pattern_exits_one() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "var a=1;");
        let (code, stdout, _) = bundle.run_cli_failure(&["patch-check", "b.js", "nothing_here"]);
        assert_eq!(code, 1);
        assert!(stdout.contains("NOT FOUND"));
    }

    #[test]
    fn match_extracts_captures() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&[
            "match",
            "b.js",
            r"async function (%V%)\((%V%),(%V%)\)",
        ]);
        assert!(out.contains("UNIQUE"));
        assert!(out.contains("zO6"));
        assert!(out.contains("\"A\""));
        assert!(out.contains("\"q\""));
    }

    #[test]
    fn match_ambiguous_exits_two() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "aa bb cc");
        let (code, _, _) = bundle.run_cli_failure(&["match", "b.js", "%V%"]);
        assert_eq!(code, 2);
    }

    #[test]
    fn replacement_preview_expands_captures() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "function solo(x){return x}");
        let out = bundle.run_cli_success(&[
            "match",
            "b.js",
            r"function (%V%)\(",
            "--replace",
            "function renamed_$1(",
        ]);
        assert!(out.contains("renamed_solo"));
    }
}

// ============================================================================
// extract-fn (S3)
// ============================================================================

mod cli_extract {
    use super::*;

    #[test]
    fn nesting_stack_is_smallest_first() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "function outer(){function inner(){return 1}}");
        let out = bundle.run_cli_success(&["extract-fn", "b.js", "35", "--stack"]);
        let inner_pos = out.find("inner").unwrap();
        let outer_pos = out.rfind("outer").unwrap();
        assert!(out.contains("depth 0"));
        assert!(out.contains("depth 1"));
        assert!(inner_pos < outer_pos);
    }

    #[test]
    fn depth_selects_stack_entry() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "function outer(){function inner(){return 1}}");
        let out = bundle.run_cli_success(&["extract-fn", "b.js", "35", "--depth", "1"]);
        assert!(out.contains("outer"));
    }

    #[test]
    fn module_scope_offset_fails_without_fallback() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "var a=1;function f(){return 1}");
        let (code, _, stderr) =
            bundle.run_cli_failure(&["extract-fn", "b.js", "2", "--no-ast-fallback"]);
        assert_eq!(code, 1);
        assert!(stderr.contains("not inside any function"));
    }

    #[test]
    fn class_method_resolves_via_tree_fallback() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "class W{compute(x){return x*2}}");
        let out = bundle.run_cli_success(&["extract-fn", "b.js", "20"]);
        assert!(out.contains("compute"));
        assert!(out.contains("tree fallback"));
    }
}

// ============================================================================
// strings (S7)
// ============================================================================

mod cli_strings {
    use super::*;

    #[test]
    fn lists_landmarks_with_functions() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&["strings", "b.js"]);
        assert!(out.contains("deep_marker"));
        assert!(out.contains("drained"));
        assert!(out.contains("in inner"));
    }

    #[test]
    fn filter_narrows_results() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&["strings", "b.js", "--filter", "deep"]);
        assert!(out.contains("deep_marker"));
        assert!(!out.contains("drained"));
    }

    #[test]
    fn diff_filters_code_like_strings() {
        let bundle = TestBundle::new();
        let f1 = r#"a="function foo(){return 1}";b="normal string here ok";"#;
        let f2 = r#"a="if(x){y=z;return}";b="different string here";"#;
        bundle.add_bundle("v1.js", f1);
        bundle.add_bundle("v2.js", f2);

        let out = bundle.run_cli_success(&[
            "strings", "v1.js", "--diff", "v2.js", "--min-length", "10",
        ]);
        assert!(out.contains("normal string here ok"));
        assert!(out.contains("different string here"));
        assert!(!out.contains("function foo"));

        let raw = bundle.run_cli_success(&[
            "strings", "v1.js", "--diff", "v2.js", "--min-length", "10", "--raw",
        ]);
        assert!(raw.contains("function foo"));
    }
}

// ============================================================================
// scope, refs, calls (deep path)
// ============================================================================

mod cli_deep {
    use super::*;

    #[test]
    fn scope_chain_reaches_module() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let offset = SAMPLE_BUNDLE.find("deep_marker").unwrap();
        let out = bundle.run_cli_success(&["scope", "b.js", &offset.to_string()]);
        assert!(out.contains("function"));
        assert!(out.contains("module"));
    }

    #[test]
    fn refs_reports_external_names() {
        let bundle = TestBundle::new();
        bundle.add_bundle(
            "b.js",
            "var shared=1;function f(){var local=2;return shared+local+globalThing}",
        );
        let offset = 40;
        let out = bundle.run_cli_success(&["refs", "b.js", &offset.to_string()]);
        assert!(out.contains("shared"));
        assert!(out.contains("globalThing"));
        assert!(!out.contains("local ("));
    }

    #[test]
    fn calls_shows_outgoing_and_incoming() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let offset = SAMPLE_BUNDLE.find("return V1").unwrap();
        let out = bundle.run_cli_success(&["calls", "b.js", &offset.to_string()]);
        assert!(out.contains("gA"));
        assert!(out.contains("incoming"));
        // the click handler calls gA()
        assert!(out.contains("hnd") || out.contains("e.type"));
    }

    #[test]
    fn refs_at_module_scope_exits_one() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", "var a=1;");
        let (code, _, stderr) = bundle.run_cli_failure(&["refs", "b.js", "2"]);
        assert_eq!(code, 1);
        assert!(stderr.contains("not inside any function"));
    }
}

// ============================================================================
// map and diff-fns (S6)
// ============================================================================

mod cli_map {
    use super::*;

    #[test]
    fn map_json_is_ordered_by_start() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        bundle.run_cli_success(&["map", "b.js", "--json", "--strings"]);

        let payload = std::fs::read_to_string(bundle.path().join("b.js.map.json")).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&payload).unwrap();
        assert!(entries.len() >= 5);
        let starts: Vec<u64> = entries
            .iter()
            .map(|e| e["start"].as_u64().unwrap())
            .collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);

        let zo6 = entries
            .iter()
            .find(|e| e["name"] == "zO6")
            .expect("zO6 in map");
        assert_eq!(zo6["is_async"], true);
        assert_eq!(zo6["param_count"], 2);
    }

    #[test]
    fn diff_detects_shift_for_identical_function() {
        let bundle = TestBundle::new();
        bundle.add_bundle("v1.js", r#"function foo(){return "hello"}"#);
        bundle.add_bundle("v2.js", r#"var x=1;function foo(){return "hello"}"#);

        let out = bundle.run_cli_success(&["diff-fns", "v1.js", "v2.js", "--json"]);
        let diff: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(diff["unchanged"].as_array().unwrap().len(), 1);
        assert!(diff["unchanged"][0]["shift"].as_i64().unwrap() > 0);
        assert!(diff["modified"].as_array().unwrap().is_empty());
        assert!(diff["added"].as_array().unwrap().is_empty());
        assert!(diff["removed"].as_array().unwrap().is_empty());
    }

    #[test]
    fn diff_reports_string_delta_for_modified() {
        let bundle = TestBundle::new();
        bundle.add_bundle(
            "v1.js",
            r#"function h(a){log("alpha");log("beta");log("gamma")}"#,
        );
        bundle.add_bundle(
            "v2.js",
            r#"function h2(b){log("alpha");log("beta");log("gamma");log("fresh_string")}"#,
        );

        let out = bundle.run_cli_success(&["diff-fns", "v1.js", "v2.js"]);
        assert!(out.contains("1 modified"));
        assert!(out.contains("fresh_string"));
    }

    #[test]
    fn diff_summary_buckets_changes() {
        let bundle = TestBundle::new();
        bundle.add_bundle("v1.js", r#"function v(){return "1.0.3"}"#);
        bundle.add_bundle("v2.js", r#"function v(){return "1.0.4"}"#);
        let out = bundle.run_cli_success(&["diff-fns", "v1.js", "v2.js", "--summary"]);
        assert!(out.contains("version bump"));
    }

    #[test]
    fn strings_only_diff_skips_parse() {
        let bundle = TestBundle::new();
        bundle.add_bundle("v1.js", r#"x="the first long marker string";"#);
        bundle.add_bundle("v2.js", r#"x="the second long marker string";"#);
        let out =
            bundle.run_cli_success(&["diff-fns", "v1.js", "v2.js", "--strings-only"]);
        assert!(out.contains("first long marker"));
        assert!(out.contains("second long marker"));
    }
}

// ============================================================================
// trace-io
// ============================================================================

mod cli_trace_io {
    use super::*;

    #[test]
    fn classifies_binary_writer() {
        let bundle = TestBundle::new();
        bundle.add_bundle("b.js", SAMPLE_BUNDLE);
        let out = bundle.run_cli_success(&["trace-io", "b.js", "proc.stdout.write"]);
        assert!(out.contains("BINARY"));
        assert!(out.contains("wr"));
    }

    #[test]
    fn warns_on_protocol_mismatch() {
        let bundle = TestBundle::new();
        let src = concat!(
            r#"function w(m){var b=Buffer.alloc(4);b.writeUInt32BE(m,0);ch.write(b)}"#,
            r#"function r(s){rl.createInterface(s)}"#,
        );
        bundle.add_bundle("b.js", src);
        let out = bundle.run_cli_success(&["trace-io", "b.js", "ch.write"]);
        assert!(out.contains("protocol mismatch"));
    }
}

// ============================================================================
// decompile
// ============================================================================

mod cli_decompile {
    use super::*;

    #[test]
    fn proposes_rename_from_destructured_key() {
        let bundle = TestBundle::new();
        bundle.add_bundle(
            "b.js",
            "function p(A){var {queuedCommands:q}=A;return q.length?!0:!1}",
        );
        let out = bundle.run_cli_success(&["decompile", "b.js", "30"]);
        assert!(out.contains("queuedCommands"));
        assert!(out.contains("true /* !0 */"));
        assert!(out.contains("false /* !1 */"));
        assert!(out.contains("confidence"));
    }
}

// ============================================================================
// cross-module properties over the library surface
// ============================================================================

mod properties {
    use super::*;
    use bundlescope::{beautify_source, boundary, collect_functions, diff_maps, patch_check};
    use bundlescope::{PatchStatus, Scanner};

    #[test]
    fn scanner_partitions_sample_bundle() {
        let mut scanner = Scanner::new(SAMPLE_BUNDLE.as_bytes());
        let mut steps = 0;
        while scanner.step().is_some() {
            steps += 1;
        }
        assert_eq!(steps, SAMPLE_BUNDLE.len());
    }

    #[test]
    fn beautify_offset_map_points_at_copied_bytes() {
        let result = beautify_source(SAMPLE_BUNDLE.as_bytes());
        let src = SAMPLE_BUNDLE.as_bytes();
        for (i, line) in result.text.lines().enumerate() {
            let Some(first) = line.trim_start().bytes().next() else {
                continue;
            };
            assert_eq!(
                src[result.line_offsets[i]], first,
                "line {} maps to the wrong offset",
                i
            );
        }
    }

    #[test]
    fn extract_roundtrip_contains_offset() {
        let buf = SAMPLE_BUNDLE.as_bytes();
        for marker in ["queuedCommands", "deep_marker", "writeUInt32LE"] {
            let offset = SAMPLE_BUNDLE.find(marker).unwrap();
            let span = boundary::enclosing_at(buf, offset).unwrap();
            assert!(span.contains(offset), "span must contain {}", marker);
            let stack = boundary::nesting_stack_at(buf, offset).unwrap();
            for pair in stack.windows(2) {
                assert!(pair[0].len() <= pair[1].len());
            }
        }
    }

    #[test]
    fn patch_uniqueness_survives_application() {
        let src = SAMPLE_BUNDLE.replace("deep_marker", "patch_anchor_one");
        let checked = patch_check(&src, "patch_anchor_one", false, None).unwrap();
        assert_eq!(checked.status, PatchStatus::Unique);

        let patched = src.replacen("patch_anchor_one", "patch_anchor_two", 1);
        let rechecked = patch_check(&patched, "patch_anchor_two", false, None).unwrap();
        assert_eq!(rechecked.status, PatchStatus::Unique);
    }

    #[test]
    fn diff_of_map_with_itself_is_identity() {
        let tree = bundlescope::parse::parse_source(SAMPLE_BUNDLE).unwrap();
        let map = collect_functions(&tree, SAMPLE_BUNDLE, true);
        let diff = diff_maps(&map, &map);
        assert_eq!(diff.unchanged.len(), map.len());
        assert!(diff.unchanged.iter().all(|u| u.shift == 0));
        assert!(diff.modified.is_empty() && diff.added.is_empty() && diff.removed.is_empty());
    }
}
