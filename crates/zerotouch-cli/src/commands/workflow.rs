//! `zerotouch workflow` - Run or validate YAML-defined workflows.

use std::time::Duration;

use console::style;

use zerotouch_core::dispatcher::worst_case_duration;
use zerotouch_core::models::{AgentTask, Workflow, WorkflowDefinition, WorkflowStatus};
use zerotouch_core::AppState;

use super::print_json;

/// Grace period on top of the computed worst case before a run is cancelled.
const DEADLINE_SLACK: Duration = Duration::from_secs(5);

/// Run a workflow file to completion and print the final snapshot.
pub async fn run(state: &AppState, workflow_file: &str, skip_health_check: bool) -> Result<(), String> {
    let definition = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!(
        "{} {} ({} task(s))",
        style("Loaded workflow:").bold(),
        definition.kind,
        definition.tasks.len()
    );

    if !skip_health_check {
        state
            .orchestrator
            .ensure_remote()
            .await
            .map_err(|e| format!("{} ({})", e, state.config.remote.base_url))?;
    }

    let workflow = execute(state, definition).await?;
    print_json(&serde_json::to_value(&workflow).map_err(|e| e.to_string())?);

    if workflow.status == WorkflowStatus::Completed {
        println!("\n{}", style("Workflow completed successfully").green());
        Ok(())
    } else {
        let failed: Vec<_> = workflow
            .results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.task_id.clone())
            .collect();
        Err(format!(
            "Workflow {} failed. Unsuccessful tasks: {}",
            workflow.workflow_id,
            failed.join(", ")
        ))
    }
}

/// Submit and run a definition, cancelling it if it overruns its worst case.
pub async fn execute(state: &AppState, definition: WorkflowDefinition) -> Result<Workflow, String> {
    let orchestrator = &state.orchestrator;
    let tasks: Vec<AgentTask> = definition
        .tasks
        .iter()
        .cloned()
        .map(|t| t.into_task(orchestrator.config()))
        .collect();
    let deadline = worst_case_duration(&tasks, orchestrator.config()).saturating_add(DEADLINE_SLACK);

    let (workflow_id, mut handle) = orchestrator
        .submit_and_run(&definition.kind, definition.tasks)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!("Workflow {} running (deadline {:?})", workflow_id, deadline);

    let joined = match tokio::time::timeout(deadline, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!("Workflow {} overran {:?}, cancelling", workflow_id, deadline);
            orchestrator
                .cancel(&workflow_id)
                .await
                .map_err(|e| e.to_string())?;
            handle.await
        }
    };
    joined
        .map_err(|e| format!("Workflow task panicked: {}", e))?
        .map_err(|e| e.to_string())
}

/// Check a workflow file without contacting the remote service.
pub async fn validate(state: &AppState, workflow_file: &str) -> Result<(), String> {
    let definition = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;
    check(state, &definition)?;

    println!(
        "{} Workflow '{}' is valid",
        style("✓").green(),
        definition.kind
    );
    if let Some(description) = &definition.description {
        println!("   {}", description);
    }
    println!("   Tasks: {}", definition.tasks.len());
    for (i, task) in definition.tasks.iter().enumerate() {
        println!(
            "   {}. {} (agent: {}, priority: {})",
            i + 1,
            task.task_id,
            task.agent_kind,
            task.priority
        );
    }
    Ok(())
}

/// The submission checks `run` would apply, without registering anything.
pub fn check(state: &AppState, definition: &WorkflowDefinition) -> Result<(), String> {
    if definition.kind.trim().is_empty() {
        return Err("Workflow kind must not be empty".to_string());
    }
    let orchestrator = &state.orchestrator;
    let tasks: Vec<AgentTask> = definition
        .tasks
        .iter()
        .cloned()
        .map(|t| t.into_task(orchestrator.config()))
        .collect();
    orchestrator
        .dispatcher()
        .validate(&tasks)
        .map_err(|e| e.to_string())
}
