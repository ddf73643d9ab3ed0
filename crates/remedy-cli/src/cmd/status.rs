use crate::output::{print_json, print_table};
use remedy_core::session::{GateRunEntry, Session};
use remedy_core::types::CategoryStatus;
use std::path::Path;

pub fn run(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let session = Session::open_or_create(root, session_id)?;

    if json {
        #[derive(serde::Serialize)]
        struct CategoryOut<'a> {
            name: &'a str,
            tier: u8,
            status: String,
            finding_ids: &'a [String],
        }

        #[derive(serde::Serialize)]
        struct CaseOut<'a> {
            id: &'a str,
            state: String,
        }

        #[derive(serde::Serialize)]
        struct StatusOut<'a> {
            session: &'a str,
            categories: Vec<CategoryOut<'a>>,
            test_cases: Vec<CaseOut<'a>>,
            last_run: Option<&'a GateRunEntry>,
        }

        let categories = session
            .plan
            .as_ref()
            .map(|p| {
                p.entries
                    .iter()
                    .map(|e| CategoryOut {
                        name: &e.name,
                        tier: e.tier.number(),
                        status: e.status.to_string(),
                        finding_ids: &e.finding_ids,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let test_cases = session
            .cycle
            .cases
            .iter()
            .map(|c| CaseOut {
                id: &c.id,
                state: c.state.to_string(),
            })
            .collect();

        print_json(&StatusOut {
            session: &session.id,
            categories,
            test_cases,
            last_run: session.last_run(),
        })?;
        return Ok(());
    }

    println!("Session: {}", session.id);

    match &session.plan {
        Some(plan) => {
            let done = plan
                .entries
                .iter()
                .filter(|e| e.status == CategoryStatus::Done)
                .count();
            println!("\nPlan: {done}/{} categories done", plan.entries.len());
            let rows: Vec<Vec<String>> = plan
                .entries
                .iter()
                .map(|e| {
                    vec![
                        e.name.clone(),
                        e.tier.number().to_string(),
                        e.status.to_string(),
                    ]
                })
                .collect();
            print_table(&["category", "tier", "status"], rows);
            if let Some(blocked) = plan.blocked_entry() {
                println!(
                    "\nblocked: '{}' — remedy plan retry | remedy plan abandon {}",
                    blocked.name, blocked.name
                );
            }
        }
        None => println!("\nPlan: none (run 'remedy scan')"),
    }

    if session.cycle.cases.is_empty() {
        println!("\nCycle: no test cases");
    } else {
        println!("\nCycle:");
        let rows: Vec<Vec<String>> = session
            .cycle
            .cases
            .iter()
            .map(|c| vec![c.id.clone(), c.state.to_string()])
            .collect();
        print_table(&["case", "state"], rows);
    }

    if let Some(run) = session.last_run() {
        println!(
            "\nlast gate run: {} {} — {} ({}ms)",
            run.kind, run.scope, run.status, run.duration_ms
        );
    }
    Ok(())
}
