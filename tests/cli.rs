// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! End-to-end tests for the stagecraft binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const RECIPE: &str = r#"
name: variant-calling
execution:
  name: run1
  output_dir: results
tools:
  align:
    inputs:
      - slot: in_reads
        pattern: '\.fq$'
    outputs:
      - slot: out_bam
        name: "{sample}.bam"
    params:
      - reference
      - name: threads
        default: 4
    command: "bwa mem -t {threads} {reference} {in_reads} > {out_bam}"
  merge:
    inputs:
      - slot: in_bams
        pattern: '\.bam$'
        n: ">=1"
    outputs:
      - slot: out_merged
        name: "merged.bam"
    command: "samtools merge {out_merged} {in_bams}"
stages:
  - name: inputs
    tasks:
      - tags: {sample: A, reference: hg38.fa}
        files: ["data/A.fq"]
      - tags: {sample: B, reference: hg38.fa}
        files: ["data/B.fq"]
  - name: align
    tool: align
    parents: [inputs]
    out: "align/{sample}"
  - name: merge
    tool: merge
    parents: [align]
    rel:
      type: many2one
      keywords: []
"#;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("data")).unwrap();
    fs::write(temp.path().join("data/A.fq"), "@A\n").unwrap();
    fs::write(temp.path().join("data/B.fq"), "@B\n").unwrap();
    fs::write(temp.path().join("recipe.yaml"), RECIPE).unwrap();
    temp
}

fn stagecraft(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stagecraft").unwrap();
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env_remove("STAGECRAFT_EXECUTION");
    cmd
}

#[test]
fn test_validate_valid_recipe() {
    let dir = project();
    stagecraft(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recipe is valid!"));
}

#[test]
fn test_validate_reports_errors() {
    let dir = project();
    fs::write(
        dir.path().join("broken.yaml"),
        "name: broken\nstages:\n  - name: a\n    tool: nothing\n    parents: [z]\n",
    )
    .unwrap();

    stagecraft(&dir)
        .args(["validate", "broken.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown tool 'nothing'"))
        .stdout(predicate::str::contains("parent 'z' does not exist"));
}

#[test]
fn test_missing_recipe_fails() {
    let dir = TempDir::new().unwrap();
    stagecraft(&dir)
        .args(["plan", "nowhere.yaml"])
        .assert()
        .failure();
}

#[test]
fn test_plan_saves_execution() {
    let dir = project();
    stagecraft(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("5 tasks (5 new, 0 reused)"));

    stagecraft(&dir)
        .args(["plan", "--keep-failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 tasks (0 new, 5 reused)"));

    stagecraft(&dir)
        .args(["store", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("run1 5 tasks"));
}

#[test]
fn test_execution_name_override() {
    let dir = project();
    stagecraft(&dir)
        .args(["plan", "-e", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("into other"));

    stagecraft(&dir)
        .args(["store", "show", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution other"));
}

#[test]
fn test_script_for_stage() {
    let dir = project();
    stagecraft(&dir)
        .args(["script", "recipe.yaml", "align"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set -o pipefail"))
        .stdout(predicate::str::contains("bwa mem -t 4 hg38.fa data/A.fq"))
        .stdout(predicate::str::contains("data/B.fq"));
}

#[test]
fn test_script_after_plan() {
    let dir = project();
    stagecraft(&dir).arg("plan").assert().success();

    stagecraft(&dir)
        .args(["script", "recipe.yaml", "merge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("samtools merge"));
}

#[test]
fn test_script_unknown_stage() {
    let dir = project();
    stagecraft(&dir)
        .args(["script", "recipe.yaml", "call"])
        .assert()
        .failure();
}

#[test]
fn test_graph_formats() {
    let dir = project();
    stagecraft(&dir)
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph"));

    stagecraft(&dir)
        .args(["graph", "--tasks", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-->"));
}

#[test]
fn test_submit_dry_run() {
    let dir = project();
    stagecraft(&dir)
        .arg("submit")
        .assert()
        .success()
        .stdout(predicate::str::contains("All tasks completed."));

    stagecraft(&dir)
        .args(["store", "show", "run1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("successful"));

    stagecraft(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("5 tasks (0 new, 5 reused)"));
}

#[test]
fn test_store_clear() {
    let dir = project();
    stagecraft(&dir).arg("plan").assert().success();

    stagecraft(&dir)
        .args(["store", "clear", "run1", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution cleared."));

    stagecraft(&dir)
        .args(["store", "show", "run1"])
        .assert()
        .failure();
}
