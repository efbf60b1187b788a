use filecheck::{
    filecheck, CheckFailedError, Config, FeatureSet, InputFile, Options, Test, TestFailed,
};

#[test]
fn integration_sanity() {
    filecheck!(
        "
Some random

content to show output
and some rules
",
        "
; CHECK: Some random
; CHECK-EMPTY:
; CHECK-NEXT: content to show output
; CHECK-SAME: {{$}}
; CHECK: and some rules
"
    );
}

#[test]
fn integration_failure_carries_structured_errors() {
    let config = Config::default();
    let mut test = Test::new(
        "
; CHECK: Some random
; CHECK-NEXT: content to show output
",
        &config,
    );
    let result = test.verify(
        "
Some random

content to show output
",
    );
    let error = result.unwrap_err().downcast::<TestFailed>().unwrap();
    assert!(matches!(
        error.errors(),
        [CheckFailedError::MatchFoundButWrongLine { .. }]
    ));
}

#[test]
fn integration_compiler_ir_example() {
    const SOURCE: &str = "\
define void @inc4(i64* %p) {
entry:
        %0 = tail call i64 @llvm.atomic.load.add.i64.p0i64(i64* %p, i64 1)
        ret void
}

define void @sub1(i32* %p, i32 %v) {
entry:
        %1 = tail call i32 @llvm.atomic.load.sub.i32.p0i32(i32* %p, i32 %v)
        ret void
}
";
    const CHECKS: &str = r"
; CHECK-LABEL: @inc4
; CHECK: entry:
; CHECK-NEXT: [[SSA:%[0-9]+]] = tail call i64 @llvm.atomic.load.add.i64
; CHECK-SAME: i64 1
; CHECK-NEXT: ret void

; CHECK-LABEL: @sub1
; CHECK: entry:
; CHECK-NEXT: {{%[0-9]+}} = tail call i32 @llvm.atomic.load.sub.i32
";
    filecheck!(SOURCE, CHECKS);
}

#[test]
fn integration_custom_prefixes_and_defines() {
    let config = Config {
        options: Options {
            check_prefixes: vec!["VERIFY".to_string()],
            variables: vec!["WIDTH=i64".parse().unwrap()],
            ..Options::default()
        },
        ..Config::default()
    };
    let mut test = Test::new(
        "
; VERIFY: load [[WIDTH]]
; VERIFY-NOT: trap
; VERIFY: ret [[WIDTH]]
",
        &config,
    );
    test.verify("load i64, ptr %p\ncall void @fn()\nret i64 %v\n")
        .unwrap();
}

#[test]
fn integration_dag_reordering_with_captures() {
    filecheck!(
        "
mul r5, r1, r2
add r3, r1, r2
ret r3
",
        "
; CHECK-DAG: add [[D1:r[0-9]+]]
; CHECK-DAG: mul [[D2:r[0-9]+]]
; CHECK: ret [[D1]]
"
    );
}

#[test]
fn integration_mlir_feature_tokens() {
    let (features, unknown) = FeatureSet::from_tokens("MLIR_REGEX_CLS,BOGUS");
    assert!(features.mlir_regex_cls);
    assert_eq!(unknown, vec!["BOGUS".to_string()]);
}

#[test]
fn integration_run_reports_warnings_on_success() {
    let config = Config::default();
    let mut test = Test::new("; CHECK: value [[EMPTY:]]\n", &config);
    let result = test
        .run(InputFile::new("input", "value 1\n"))
        .expect("check file is valid");
    assert!(result.is_ok());
    assert_eq!(result.warnings().len(), 1);
}
