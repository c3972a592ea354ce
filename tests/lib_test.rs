//! Library integration tests.

use relay::RelayError;

#[test]
fn error_types_are_public() {
    let err = RelayError::WorkflowNotFound {
        workflow: "test".into(),
    };
    assert!(err.to_string().contains("test"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> relay::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;
    use relay::cli::{Cli, Commands};

    let cli = Cli::parse_from(["relay", "workflows", "--id-only"]);
    if let Some(Commands::Workflows(args)) = cli.command {
        assert!(args.id_only);
    } else {
        panic!("Expected Workflows command");
    }
}

#[test]
fn runner_is_usable_as_library() {
    use relay::config::parse_config;
    use relay::log::{LoggerOpts, LoggerType, SharedBuffer};
    use relay::modes::RunModes;
    use relay::runner::{RunConfig, StepRunStatus, WorkflowRunner};
    use relay::steps::ShellStepExecutor;
    use std::path::Path;

    let yaml = r#"
workflows:
  primary:
    steps:
      - greet:
          script: echo library-run
"#;
    let buffer = SharedBuffer::new();
    let run_config = RunConfig {
        modes: RunModes::default(),
        config: parse_config(yaml, Path::new("relay.yml")).unwrap(),
        secrets: vec![],
        workflow: "primary".to_string(),
        cwd: None,
    };
    let mut runner = WorkflowRunner::new(
        run_config,
        Box::new(ShellStepExecutor),
        LoggerOpts::new(LoggerType::Console, buffer.sink()),
    );

    let results = runner.run().unwrap();
    assert_eq!(results.workflows[0].steps[0].status, StepRunStatus::Success);
    assert!(buffer.contents().contains("library-run"));
}
