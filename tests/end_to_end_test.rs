//! End-to-end runs with the default collaborators
//!
//! CSV input in a temp directory goes through loading, statistics, SVG/HTML
//! plots and Markdown reports; the state file then drives a resumed run.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use autoanalyst::{Collaborators, Orchestrator, PipelineConfig, PipelineError, Stage, StageStatus};

fn write_sales_csv(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let regions = ["north", "south", "east"];
    let mut csv = String::from("x,y,region\n");
    for i in 0..30 {
        let y = 3.0 * i as f64 + 2.0 + (i % 3) as f64 * 0.5;
        csv.push_str(&format!("{},{},{}\n", i, y, regions[i % 3]));
    }
    fs::write(dir.join("sales.csv"), csv)?;
    Ok(())
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        input_dir: dir.path().join("input"),
        processed_dir: dir.path().join("processed"),
        output_dir: dir.path().join("output"),
        target: Some("y".to_string()),
        ..Default::default()
    }
}

/// Full run writes processed data, plots, reports and state
#[test]
fn test_full_run_with_default_collaborators() -> Result<()> {
    let dir = TempDir::new()?;
    write_sales_csv(&dir.path().join("input"))?;
    let config = config(&dir);
    config.ensure_directories()?;

    let mut orch = Orchestrator::new(config.clone(), Collaborators::from_config(&config));
    orch.run()?;

    assert!(config.processed_dir.join("sales_processed.csv").is_file());

    let context = &orch.state().context;
    let table = &context.processed_datasets["sales"];
    assert!(table.column("region_encoded").is_some());

    let analysis = &context.analysis_results["sales"];
    let regression = analysis.regression.as_ref().expect("regression with numeric target");
    assert!(regression.r_squared > 0.99);
    assert!(!regression.coefficients.contains_key("y"));
    assert!(analysis.clustering.is_some());

    let files = &context.visualization_files["sales"];
    assert!(!files.is_empty());
    for path in files.all() {
        assert!(path.is_file(), "missing plot {}", path.display());
    }

    assert_eq!(context.report_paths.len(), 2);
    let technical = fs::read_to_string(&context.report_paths[0])?;
    assert!(technical.starts_with("# Data Analysis Report (Technical)"));
    let business = fs::read_to_string(&context.report_paths[1])?;
    assert!(business.contains("## Key Insights"));

    let results: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.analysis_results_path())?)?;
    assert!(results["sales"]["regression_analysis"]["r_squared"].is_number());

    let state: serde_json::Value = serde_json::from_str(&fs::read_to_string(config.state_path())?)?;
    for stage in Stage::ALL {
        assert_eq!(state["task_status"][stage.as_str()]["status"], "completed");
    }

    Ok(())
}

/// A finished run resumes to a no-op
#[test]
fn test_resume_after_completion_is_noop() -> Result<()> {
    let dir = TempDir::new()?;
    write_sales_csv(&dir.path().join("input"))?;
    let config = config(&dir);
    config.ensure_directories()?;

    let mut first = Orchestrator::new(config.clone(), Collaborators::from_config(&config));
    first.run()?;
    let reports = first.state().context.report_paths.clone();

    let mut second = Orchestrator::resume(config.clone(), Collaborators::from_config(&config))?;
    assert_eq!(second.next_task(), None);
    second.run()?;

    assert_eq!(second.state().context.report_paths, reports);
    assert_eq!(fs::read_dir(config.reports_dir())?.count(), 2);

    Ok(())
}

/// Missing input directory fails the loading stage
#[test]
fn test_missing_input_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(&dir);

    let mut orch = Orchestrator::new(config.clone(), Collaborators::from_config(&config));
    let err = orch.run().unwrap_err();

    assert_eq!(err.stage(), Some(Stage::DataLoading));
    assert!(matches!(err, PipelineError::Stage { .. }));
    assert_eq!(orch.state().board.status(Stage::DataLoading), StageStatus::Failed);

    let plan = orch.recovery_plan(&err);
    assert_eq!(plan.failed_task, Some(Stage::DataLoading));
    assert_eq!(plan.recovery_steps[0], "Verify input data exists and is accessible");
    assert!(!orch.store().exists());

    Ok(())
}
