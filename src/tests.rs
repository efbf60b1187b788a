use crate::errors::{CheckFailedError, CheckWarning, InvalidCheckFile, TestFailed};
use crate::{filecheck, Config, InputFile, Test};

fn verify(checks: &str, input: &str, config: &Config) -> Result<Vec<crate::MatchInfo>, TestFailed> {
    let mut test = Test::new(checks.to_string(), config);
    test.verify(input.to_string())
        .map_err(|report| report.downcast::<TestFailed>().expect("expected a test failure"))
}

fn verify_err(checks: &str, input: &str, config: &Config) -> TestFailed {
    verify(checks, input, config).expect_err("expected the test to fail")
}

#[test]
fn sanity_literal_lines_in_order_always_pass() {
    let input = "\
region_a:
    op 1
    op 2
final
";
    // Any directive sequence consisting of the input's own lines, in
    // order, must succeed
    let checks = "\
CHECK: region_a:
CHECK: op 1
CHECK: op 2
CHECK: final
";
    filecheck!(input, checks);
}

#[test]
fn adjacency() {
    filecheck!(
        "region_a:\n    op 1\n    op 2\n",
        "\
CHECK-LABEL: region_a:
CHECK-NEXT: op 1
CHECK-NEXT: op 2
"
    );
}

#[test]
fn adjacency_violation_reports_the_wrong_line() {
    let errors = verify_err(
        "\
CHECK: region_a:
CHECK-NEXT: op 2
",
        "region_a:\n    op 1\n    op 2\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchFoundButWrongLine { .. }]
    ));
}

#[test]
fn capture_and_back_reference() {
    let matches = filecheck!(
        "assign x\nprint x\n",
        "\
CHECK: assign [[V:[a-z]+]]
CHECK: print [[V]]
"
    );
    assert_eq!(matches.len(), 2);
}

#[test]
fn back_reference_must_equal_the_binding() {
    let errors = verify_err(
        "\
CHECK: assign [[V:[a-z]+]]
CHECK: print [[V]]
",
        "assign x\nprint y\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
}

#[test]
fn dag_group_admits_permutations() {
    let input = "\
test b = 2
test a = 1
test c = 3
add a + b = c
test final
";
    let dags = [
        "CHECK-DAG: test [[v1:\\w+]] = 1",
        "CHECK-DAG: test [[v2:\\w+]] = 2",
        "CHECK-DAG: test [[v3:\\w+]] = 3",
    ];
    // Every source-order permutation of the group succeeds on the same input
    let orders: &[[usize; 3]] = &[
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let checks = format!(
            "{}\n{}\n{}\nCHECK-DAG: add [[v1]] + [[v2]] = [[v3]]\nCHECK: test final\n",
            dags[order[0]], dags[order[1]], dags[order[2]]
        );
        filecheck!(input, &checks);
    }
}

#[test]
fn dag_matches_may_not_overlap() {
    // Two identical DAG patterns cannot claim the same position twice
    filecheck!(
        "value 1\nvalue 1\n",
        "\
CHECK-DAG: value 1
CHECK-DAG: value 1
"
    );
    let errors = verify_err(
        "\
CHECK-DAG: value 1
CHECK-DAG: value 1
",
        "value 1\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchAllFailed { .. }]
    ));
}

#[test]
fn dag_failure_interleaved_with_not() {
    let input = "\
test 2
test final
test 1
";
    let errors = verify_err(
        "\
CHECK-DAG: test 1
CHECK-DAG: test 2
CHECK-NOT: test final
CHECK-DAG: test 3
",
        input,
        &Config::default(),
    );
    // The unmatched DAG directive is named, and the interleaved NOT fires
    // on the excluded line inside the group's span
    let dag_failure = errors.errors().iter().find_map(|error| match error {
        CheckFailedError::MatchAllFailed { failed } => Some(failed),
        _ => None,
    });
    assert!(matches!(
        dag_failure.expect("expected a DAG group failure").as_slice(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
    assert!(errors
        .errors()
        .iter()
        .any(|error| matches!(error, CheckFailedError::MatchFoundButExcluded { .. })));
}

#[test]
fn dag_interleaved_not_ignores_claimed_positions() {
    // The NOT pattern overlaps text claimed by the DAG matches, so it must
    // not fire there
    filecheck!(
        "test a\ntest b\n",
        "\
CHECK-DAG: test a
CHECK-NOT: test
CHECK-DAG: test b
"
    );
}

#[test]
fn numeric_capture_formats() {
    let matches = filecheck!(
        "print 0xFF00FF00\nprint 100\nprint -100 -100\n",
        "\
CHECK: [[#%.8X,]]
CHECK: [[#%.3,]]
CHECK: [[#%.3d,ARG:]] [[ARG]]
"
    );
    assert_eq!(matches.len(), 3);
}

#[test]
fn numeric_reference_re_renders_in_captured_format() {
    filecheck!(
        "addr 0xff00 stored\nreload ff00 now\n",
        "\
CHECK: addr 0x[[#%x,ADDR:]] stored
CHECK: reload [[#ADDR]] now
"
    );
}

#[test]
fn empty_capture_warns_and_rejects() {
    let config = Config::default();
    // Without --reject-empty-vars this passes, with a warning
    let mut test = Test::new("CHECK: test [[VAL:]]\nCHECK-SAME: [[VAL]]\n", &config);
    let result = test
        .run(InputFile::new("<stdin>", "test 123\n"))
        .expect("check file is valid");
    assert!(result.is_ok());
    assert!(matches!(
        result.warnings(),
        [CheckWarning::EmptyCapture { name, .. }] if name == "VAL"
    ));

    let config = Config {
        options: crate::Options {
            reject_empty_vars: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let errors = verify_err(
        "CHECK: test [[VAL:]]\nCHECK-SAME: [[VAL]]\n",
        "test 123\n",
        &config,
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::EmptyCapture { name, .. }] if name == "VAL"
    ));
    assert!(matches!(
        errors.warnings(),
        [CheckWarning::EmptyCapture { .. }]
    ));
}

#[test]
fn not_between_checks_fails_iff_pattern_occurs_between() {
    let checks = "\
CHECK: start
CHECK-NOT: boom
CHECK: end
";
    filecheck!("start\nquiet\nend\n", checks);
    filecheck!("boom\nstart\nquiet\nend\nboom\n", checks);

    let errors = verify_err(checks, "start\nboom\nend\n", &Config::default());
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchFoundButExcluded { .. }]
    ));
}

#[test]
fn not_resolves_at_end_of_input() {
    let errors = verify_err(
        "\
CHECK: start
CHECK-NOT: boom
",
        "start\nboom\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchFoundButExcluded { .. }]
    ));
}

#[test]
fn not_resolves_at_label_boundary() {
    // The NOT closes at the label's line, so a hit after it is fine
    filecheck!(
        "start\nnext:\nboom\n",
        "\
CHECK: start
CHECK-NOT: boom
CHECK-LABEL: next:
"
    );
}

#[test]
fn count_requires_consecutive_matches() {
    filecheck!(
        "header\nop\nop\nop\ntrailer\n",
        "\
CHECK: header
CHECK-COUNT-3: op
CHECK-NEXT: trailer
"
    );

    let errors = verify_err(
        "CHECK-COUNT-3: op\n",
        "op\nop\ngap\nop\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchRepeatedError { n: 2, count: 3, .. }]
    ));
}

#[test]
fn count_rebinds_captures_each_iteration() {
    filecheck!(
        "op 1\nop 2\nop 3\nlast 3\n",
        "\
CHECK-COUNT-3: op [[N:[0-9]]]
CHECK-NEXT: last [[N]]
"
    );
}

#[test]
fn label_partitions_the_input() {
    let input = "\
func_a:
  ret 1
func_b:
  ret 2
";
    filecheck!(
        input,
        "\
CHECK-LABEL: func_a:
CHECK: ret 1
CHECK-LABEL: func_b:
CHECK: ret 2
"
    );

    // `ret 2` only exists in func_b's region, so func_a's check must not
    // reach across the boundary
    let errors = verify_err(
        "\
CHECK-LABEL: func_a:
CHECK: ret 2
CHECK-LABEL: func_b:
",
        input,
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
}

#[test]
fn failed_label_skips_its_region_but_checking_continues() {
    let errors = verify_err(
        "\
CHECK-LABEL: func_a:
CHECK: ret 1
CHECK-LABEL: func_x:
CHECK: anything
CHECK-LABEL: func_b:
CHECK: ret 2
",
        "func_a:\n  ret 1\nfunc_b:\n  ret 2\n",
        &Config::default(),
    );
    // Exactly one failure: the unmatched label. Its region's directives are
    // skipped, and func_b's region still verifies.
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
}

#[test]
fn ambiguous_label_is_an_error() {
    let errors = verify_err(
        "CHECK-LABEL: block:\n",
        "block:\nblock:\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::LabelNotUnique { .. }]
    ));
}

#[test]
fn var_scope_discards_local_bindings_at_label_boundaries() {
    let checks = "\
CHECK: bind [[V:[0-9]+]]
CHECK-LABEL: next:
CHECK: use [[V]]
";
    let input = "bind 7\nnext:\nuse 7\n";
    // Without scoping the binding crosses the label
    filecheck!(input, checks);

    let config = Config {
        options: crate::Options {
            enable_var_scope: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let errors = verify_err(checks, input, &config);
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::UndefinedVariable { name, .. }] if name == "V"
    ));
}

#[test]
fn global_variables_survive_label_scoping() {
    let config = Config {
        options: crate::Options {
            enable_var_scope: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut test = Test::new(
        "\
CHECK: bind [[$G:[0-9]+]]
CHECK-LABEL: next:
CHECK: use [[$G]]
",
        &config,
    );
    test.verify("bind 7\nnext:\nuse 7\n".to_string()).unwrap();
}

#[test]
fn cli_defined_variables_are_pre_bound() {
    let config = Config {
        options: crate::Options {
            variables: vec!["TARGET=x86".parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    };
    let mut test = Test::new("CHECK: arch [[TARGET]]\n", &config);
    test.verify("arch x86\n".to_string()).unwrap();
}

#[test]
fn undefined_reference_is_a_match_time_error() {
    let errors = verify_err("CHECK: use [[MISSING]]\n", "use x\n", &Config::default());
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::UndefinedVariable { name, .. }] if name == "MISSING"
    ));
}

#[test]
fn check_same_continues_on_the_matched_line() {
    filecheck!(
        "op a, b\n",
        "\
CHECK: op a
CHECK-SAME: b
"
    );
    let errors = verify_err(
        "\
CHECK: op a
CHECK-SAME: b
",
        "op a\nb\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchFoundButWrongLine { .. }]
    ));
}

#[test]
fn check_empty_requires_a_zero_length_line() {
    filecheck!(
        "header\n\nbody\n",
        "\
CHECK: header
CHECK-EMPTY:
CHECK-NEXT: body
"
    );
    let errors = verify_err(
        "\
CHECK: header
CHECK-EMPTY:
",
        "header\nbody\n",
        &Config::default(),
    );
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchFoundButWrongLine { .. }]
    ));
}

#[test]
fn match_full_lines_anchors_positive_patterns() {
    let config = Config {
        options: crate::Options {
            match_full_lines: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut test = Test::new("CHECK: whole line\n", &config);
    test.verify("whole line\n".to_string()).unwrap();

    let errors = verify_err("CHECK: whole\n", "whole line\n", &config);
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
}

#[test]
fn strict_whitespace_disables_canonicalization() {
    let checks = "CHECK: a b\n";
    filecheck!("a \t b\n", checks);

    let config = Config {
        options: crate::Options {
            strict_whitespace: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let errors = verify_err(checks, "a \t b\n", &config);
    assert!(matches!(
        errors.errors(),
        [CheckFailedError::MatchNoneButExpected { .. }]
    ));
}

#[test]
fn empty_input_is_rejected_unless_allowed() {
    let errors = verify_err("CHECK-NOT: anything\n", "", &Config::default());
    assert!(matches!(errors.errors(), [CheckFailedError::EmptyInput]));

    let config = Config {
        options: crate::Options {
            allow_empty: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut test = Test::new("CHECK-NOT: anything\n", &config);
    test.verify("".to_string()).unwrap();
}

#[test]
fn multiple_failures_surface_from_one_run() {
    let errors = verify_err(
        "\
CHECK: alpha
CHECK: beta
",
        "gamma\n",
        &Config::default(),
    );
    assert_eq!(errors.errors().len(), 2);
}

#[test]
fn near_miss_points_at_a_candidate_line() {
    let errors = verify_err(
        "\
CHECK: consumed
CHECK: target line
",
        "target line\nconsumed\n",
        &Config::default(),
    );
    // The second check fails (its only match is before the cursor), and the
    // note points back at the line it probably meant
    match errors.errors() {
        [CheckFailedError::MatchNoneButExpected { note: Some(note), .. }] => {
            assert!(note.contains("possible intended match"), "note: {note}");
            assert!(note.contains("target line"), "note: {note}");
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[test]
fn invalid_check_file_reports_all_parse_errors() {
    let config = Config::default();
    let mut test = Test::new(
        "\
CHECK-COUNT-0: a
CHECK:
",
        &config,
    );
    let err = test.verify("input\n".to_string()).unwrap_err();
    let err = err.downcast::<InvalidCheckFile>().unwrap();
    assert_eq!(err.errors.len(), 2);
}

#[test]
fn verdicts_are_idempotent() {
    let checks = "\
CHECK: assign [[V:[a-z]+]]
CHECK: print [[V]]
";
    let input = "assign x\nprint x\n";
    let config = Config::default();
    let first = verify(checks, input, &config).unwrap();
    let second = verify(checks, input, &config).unwrap();
    assert_eq!(first, second);

    let failing = "CHECK: absent\n";
    let first = verify_err(failing, input, &config);
    let second = verify_err(failing, input, &config);
    assert_eq!(first.errors().len(), second.errors().len());
}

#[test]
fn mlir_value_names_via_feature_flag() {
    let config = Config {
        features: crate::FeatureSet {
            mlir_regex_cls: true,
        },
        ..Default::default()
    };
    let mut test = Test::new("CHECK: {{\\V}} = arith.addi\n", &config);
    test.verify("%sum = arith.addi %a, %b\n".to_string())
        .unwrap();
}

#[test]
fn comment_prefixes_neutralize_directives() {
    // The COM'd out CHECK would fail if it were live
    filecheck!(
        "real\n",
        "\
CHECK: real
COM: CHECK: not present in the input
"
    );
}
