//! End-to-end runs of the migration pipeline against notebooks on disk,
//! with the text-generation service replaced by scripted replies.

use core_test_support::FakeGenerator;
use core_test_support::LogCapture;
use core_test_support::Reply;
use core_test_support::cell_sources;
use core_test_support::repo;
use core_test_support::write_notebook;
use nbmigrate_core::MigrateConfig;
use nbmigrate_core::Migrator;
use nbmigrate_core::OutputMode;
use nbmigrate_core::RuleSet;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn config(root: &Path) -> MigrateConfig {
    MigrateConfig::new(root, RuleSet::builtin().unwrap())
}

#[tokio::test]
async fn test_ix_cell_is_rewritten_in_place() {
    let dir = repo();
    let nb = write_notebook(
        dir.path(),
        "lessons/pandas.ipynb",
        &[("markdown", "# `df.ix` is gone"), ("code", "df.ix[0]")],
    );
    let generator = FakeGenerator::replying(["df.loc[0]"]);

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(cell_sources(&nb), vec!["# `df.ix` is gone", "df.loc[0]"]);
    assert_eq!(report.changed(), ["lessons/pandas.ipynb"]);
    assert_eq!(report.stats.rewrites, 1);

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].context.contains("File: lessons/pandas.ipynb"));
    assert!(calls[0].context.contains("- DataFrame.ix  →  DataFrame.loc / DataFrame.iloc"));
    assert!(calls[0].context.contains("```\ndf.ix[0]\n```"));
}

#[tokio::test]
async fn test_invalid_rewrite_without_fallback_leaves_cell_and_file_untouched() {
    let dir = repo();
    let nb = write_notebook(dir.path(), "series.ipynb", &[("code", "s.ravel()")]);
    let before = fs::read(&nb).unwrap();
    let generator = FakeGenerator::replying(["s.ravel("]);
    let (logs, _guard) = LogCapture::install();

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(fs::read(&nb).unwrap(), before);
    assert!(report.is_empty());
    assert_eq!(report.stats.rejected, 1);
    assert_eq!(report.stats.fallbacks, 0);

    let warnings = logs.lines_at("WARN");
    assert_eq!(warnings.len(), 1, "{}", logs.contents());
    assert!(warnings[0].contains("series.ipynb[cell 0]"));
    assert!(warnings[0].contains("not valid Python"));
    assert!(warnings[0].contains("leaving cell unchanged"));
}

#[tokio::test]
async fn test_invalid_rewrite_falls_back_to_substitution() {
    let dir = repo();
    let nb = write_notebook(dir.path(), "fb.ipynb", &[("code", "row = df.ix[3]\nprint(row)")]);
    let generator = FakeGenerator::replying(["row = df.loc[3\nprint(row)"]);

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(cell_sources(&nb), vec!["row = df.loc[3]\nprint(row)"]);
    assert_eq!(report.stats.fallbacks, 1);
    assert_eq!(report.changed(), ["fb.ipynb"]);
}

#[tokio::test]
async fn test_clean_notebooks_are_never_written_or_sent() {
    let dir = repo();
    let clean = write_notebook(
        dir.path(),
        "clean.ipynb",
        &[("code", "import pandas as pd\ndf = pd.DataFrame()"), ("markdown", "df.ix[0]")],
    );
    let before = fs::read(&clean).unwrap();
    let modified_before = fs::metadata(&clean).unwrap().modified().unwrap();
    let generator = FakeGenerator::new();

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert!(generator.calls().is_empty());
    assert_eq!(fs::read(&clean).unwrap(), before);
    assert_eq!(fs::metadata(&clean).unwrap().modified().unwrap(), modified_before);
    assert!(report.is_empty());
    assert_eq!(report.stats.cells_scanned, 1);
    assert!(report.to_string().contains("nothing to do"));
}

#[tokio::test]
async fn test_only_matching_cells_change() {
    let dir = repo();
    let nb = write_notebook(
        dir.path(),
        "mixed.ipynb",
        &[
            ("code", "import pandas as pd"),
            ("code", "x = df.ix[0]"),
            ("code", "total = s.sum()"),
        ],
    );
    let generator = FakeGenerator::replying(["x = df.iloc[0]"]);

    Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(
        cell_sources(&nb),
        vec!["import pandas as pd", "x = df.iloc[0]", "total = s.sum()"]
    );
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn test_service_error_skips_cell_and_run_continues() {
    let dir = repo();
    let first = write_notebook(dir.path(), "a.ipynb", &[("code", "df.ix[0]")]);
    let second = write_notebook(dir.path(), "b.ipynb", &[("code", "df.ix[1]")]);
    let generator = FakeGenerator::new();
    generator.push(Reply::Fail("connection reset".to_string()));
    generator.push(Reply::Text("df.loc[1]".to_string()));

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(cell_sources(&first), vec!["df.ix[0]"]);
    assert_eq!(cell_sources(&second), vec!["df.loc[1]"]);
    assert_eq!(report.stats.service_errors, 1);
    assert_eq!(report.changed(), ["b.ipynb"]);
}

#[tokio::test]
async fn test_broken_notebook_is_skipped() {
    let dir = repo();
    fs::write(dir.path().join("broken.ipynb"), "{ not json").unwrap();
    let good = write_notebook(dir.path(), "good.ipynb", &[("code", "df.ix[0]")]);
    let generator = FakeGenerator::replying(["df.loc[0]"]);

    let report = Migrator::new(config(dir.path()), &generator).run().await.unwrap();

    assert_eq!(report.stats.notebooks, 2);
    assert_eq!(report.stats.notebooks_skipped, 1);
    assert_eq!(cell_sources(&good), vec!["df.loc[0]"]);
}

#[tokio::test]
async fn test_dry_run_reports_but_does_not_write() {
    let dir = repo();
    let nb = write_notebook(dir.path(), "dry.ipynb", &[("code", "df.ix[0]")]);
    let before = fs::read(&nb).unwrap();
    let generator = FakeGenerator::replying(["df.loc[0]"]);

    let report = Migrator::new(config(dir.path()).with_dry_run(true), &generator)
        .run()
        .await
        .unwrap();

    assert_eq!(fs::read(&nb).unwrap(), before);
    assert_eq!(report.changed(), ["dry.ipynb"]);
}

#[tokio::test]
async fn test_diff_mode_rejects_prose() {
    let dir = repo();
    let nb = write_notebook(dir.path(), "d.ipynb", &[("code", "df.ix[0]")]);
    let before = fs::read(&nb).unwrap();
    let generator = FakeGenerator::replying(["I would use .loc instead."]);

    let config = config(dir.path())
        .with_mode(OutputMode::Diff)
        .with_patch_program("nbmigrate-no-such-patch-program");
    let report = Migrator::new(config, &generator).run().await.unwrap();

    assert_eq!(fs::read(&nb).unwrap(), before);
    assert_eq!(report.stats.rejected, 1);
    assert!(generator.calls()[0].instruction.contains("unified diff"));
}

#[tokio::test]
async fn test_diff_mode_patch_failure_is_recoverable() {
    let dir = repo();
    write_notebook(dir.path(), "d.ipynb", &[("code", "df.ix[0]")]);
    let generator = FakeGenerator::replying(["```diff\n--- /abs/d.ipynb\n+++ /abs/d.ipynb\n@@ -1 +1 @@\n-x\n+y\n```"]);

    let config = config(dir.path())
        .with_mode(OutputMode::Diff)
        .with_patch_program("nbmigrate-no-such-patch-program");
    let report = Migrator::new(config, &generator).run().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.stats.patch_failures, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_diff_mode_success_leaves_writing_to_patch_program() {
    let dir = repo();
    let nb = write_notebook(dir.path(), "d.ipynb", &[("code", "df.ix[0]")]);
    let before = fs::read(&nb).unwrap();
    let generator = FakeGenerator::replying([
        "--- d.ipynb\n+++ d.ipynb\n@@ -1 +1 @@\n-    \"df.ix[0]\"\n+    \"df.loc[0]\"\n",
    ]);

    // `true` accepts any diff and changes nothing on disk.
    let config = config(dir.path())
        .with_mode(OutputMode::Diff)
        .with_patch_program("true");
    let report = Migrator::new(config, &generator).run().await.unwrap();

    assert_eq!(report.changed(), ["d.ipynb"]);
    assert_eq!(report.stats.patches_applied, 1);
    assert_eq!(report.stats.patch_failures, 0);
    assert_eq!(report.stats.rewrites, 0);
    assert_eq!(fs::read(&nb).unwrap(), before);
    assert!(report.to_string().contains(" • d.ipynb"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dynamic_scan_attributes_warnings_to_cells() {
    use nbmigrate_core::ScanStrategy;
    use nbmigrate_core::warnings::KernelRunner;

    let dir = repo();
    let nb = write_notebook(
        dir.path(),
        "dyn.ipynb",
        &[("code", "x = 1"), ("code", "flat = s.ravel()")],
    );
    let kernel = KernelRunner::with_command(
        "sh",
        ["-c", "echo \"FutureWarning: The 'ravel' method is deprecated\" >&2"],
    );
    let generator = FakeGenerator::replying(["flat = s.to_numpy()"]);

    let config = config(dir.path()).with_scan(ScanStrategy::Dynamic);
    let report = Migrator::new(config, &generator)
        .with_kernel(kernel)
        .run()
        .await
        .unwrap();

    assert_eq!(cell_sources(&nb), vec!["x = 1", "flat = s.to_numpy()"]);
    assert_eq!(report.stats.cells_with_issues, 1);
    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].context.contains("FutureWarning: The 'ravel' method is deprecated"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dynamic_scan_without_warnings_skips_notebook() {
    use nbmigrate_core::ScanStrategy;
    use nbmigrate_core::warnings::KernelRunner;

    let dir = repo();
    let nb = write_notebook(dir.path(), "quiet.ipynb", &[("code", "df.ix[0]")]);
    let before = fs::read(&nb).unwrap();
    let generator = FakeGenerator::new();

    let config = config(dir.path()).with_scan(ScanStrategy::Dynamic);
    let report = Migrator::new(config, &generator)
        .with_kernel(KernelRunner::with_command("sh", ["-c", "true"]))
        .run()
        .await
        .unwrap();

    assert!(generator.calls().is_empty());
    assert_eq!(fs::read(&nb).unwrap(), before);
    assert_eq!(report.stats.cells_scanned, 0);
}
