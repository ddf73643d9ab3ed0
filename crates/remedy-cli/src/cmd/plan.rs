use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use remedy_core::{
    config::Config,
    gate::{self, Gate, TestScope},
    plan::StepOutcome,
    session::{RunKind, Session},
    RemedyError,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum PlanSubcommand {
    /// Show the current remediation plan
    Show,
    /// Mark the next pending category in progress
    Advance,
    /// Verify the in-progress category: analysis scope plus full test suite
    Verify,
    /// Put the blocked category back in progress for another attempt
    Retry,
    /// Give up on a blocked or in-progress category
    Abandon { category: String },
}

pub fn run(root: &Path, session_id: &str, subcmd: PlanSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PlanSubcommand::Show => show(root, session_id, json),
        PlanSubcommand::Advance => advance(root, session_id, json),
        PlanSubcommand::Verify => verify(root, session_id, json),
        PlanSubcommand::Retry => retry(root, session_id, json),
        PlanSubcommand::Abandon { category } => abandon(root, session_id, &category, json),
    }
}

fn show(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let session = Session::load(root, session_id)?;
    let plan = session.plan.as_ref().ok_or(RemedyError::NoPlan)?;

    if json {
        print_json(plan)?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = plan
        .entries
        .iter()
        .map(|e| {
            vec![
                e.name.clone(),
                e.tier.number().to_string(),
                e.status.to_string(),
                e.finding_ids.len().to_string(),
            ]
        })
        .collect();
    print_table(&["category", "tier", "status", "findings"], rows);

    if !plan.abandoned.is_empty() {
        let names: Vec<&str> = plan.abandoned.iter().map(|e| e.name.as_str()).collect();
        println!("\nabandoned: {}", names.join(", "));
    }
    Ok(())
}

fn advance(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let mut session = Session::load(root, session_id)?;
    let advanced = {
        let plan = session.plan_mut()?;
        plan.advance()?
            .map(|e| (e.name.clone(), e.finding_ids.len()))
    };
    session.save(root).context("failed to save session")?;

    match advanced {
        Some((name, count)) => {
            if json {
                print_json(&serde_json::json!({ "category": name, "findings": count }))?;
            } else {
                println!("In progress: {name} ({count} finding(s))");
                println!("Apply fixes, then: remedy plan verify");
            }
        }
        None => {
            if json {
                print_json(&serde_json::json!({ "category": null, "complete": true }))?;
            } else {
                println!("Plan complete: nothing pending.");
            }
        }
    }
    Ok(())
}

fn verify(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut session = Session::load(root, session_id)?;
    let scope = session
        .plan
        .as_ref()
        .ok_or(RemedyError::NoPlan)?
        .scope
        .clone();

    let mut gate = Gate::with_memory(&config, session.gate_memory.clone());
    let analysis = match gate.run_analysis(root, &scope) {
        Ok(r) => r,
        Err(e) => {
            session.record_gate_run(RunKind::Analysis, &gate::failed_to_run(&scope.key()));
            session.save(root)?;
            return Err(e.into());
        }
    };
    session.record_gate_run(RunKind::Analysis, &analysis);

    let tests = match gate.run_tests(root, &TestScope::All) {
        Ok(r) => r,
        Err(e) => {
            session.gate_memory = gate.memory;
            session.record_gate_run(RunKind::Tests, &gate::failed_to_run(&TestScope::All.key()));
            session.save(root)?;
            return Err(e.into());
        }
    };
    session.gate_memory = gate.memory;
    session.record_gate_run(RunKind::Tests, &tests);

    let outcome = session.plan_mut()?.record_verdict(&analysis, &tests);
    // Save regardless: a regression verdict must persist the blocked status.
    session.save(root).context("failed to save session")?;

    match outcome? {
        StepOutcome::Done { category } => {
            if json {
                print_json(&serde_json::json!({ "outcome": "done", "category": category }))?;
            } else {
                println!("Done: {category}");
                println!("Next: remedy plan advance");
            }
        }
        StepOutcome::Incomplete {
            category,
            remaining,
        } => {
            if json {
                print_json(&serde_json::json!({
                    "outcome": "incomplete",
                    "category": category,
                    "remaining": remaining,
                }))?;
            } else {
                println!("Still in progress: {category} has {remaining} finding(s) left.");
            }
        }
    }
    Ok(())
}

fn retry(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let mut session = Session::load(root, session_id)?;
    let name = {
        let plan = session.plan_mut()?;
        plan.retry_blocked()?.name.clone()
    };
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "category": name, "status": "in_progress" }))?;
    } else {
        println!("Retrying: {name}");
        println!("Apply fixes, then: remedy plan verify");
    }
    Ok(())
}

fn abandon(root: &Path, session_id: &str, category: &str, json: bool) -> anyhow::Result<()> {
    let mut session = Session::load(root, session_id)?;
    session.plan_mut()?.abandon(category)?;
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "category": category, "status": "abandoned" }))?;
    } else {
        println!("Abandoned: {category}");
    }
    Ok(())
}
