use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use remedy_core::{
    config::Config,
    cycle::CycleRun,
    gate::{self, Gate, TestScope},
    session::{RunKind, Session},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum CycleSubcommand {
    /// Open a new test case in red
    Begin {
        id: String,
        /// One-liner describing the behavior under development
        #[arg(long)]
        description: Option<String>,
    },
    /// Run the case and record the failing-run evidence
    ConfirmRed { id: String },
    /// Run the full suite and move the case to green
    ConfirmGreen { id: String },
    /// Enter the refactor phase
    Refactor { id: String },
    /// Verify a structural change: the full suite must be clean
    Check { id: String },
    /// Close the cycle for a case (irreversible)
    Close { id: String },
    /// Show all test cases
    Show,
}

pub fn run(
    root: &Path,
    session_id: &str,
    subcmd: CycleSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        CycleSubcommand::Begin { id, description } => begin(root, session_id, &id, description, json),
        CycleSubcommand::ConfirmRed { id } => confirm_red(root, session_id, &id, json),
        CycleSubcommand::ConfirmGreen { id } => confirm_green(root, session_id, &id, json),
        CycleSubcommand::Refactor { id } => refactor(root, session_id, &id, json),
        CycleSubcommand::Check { id } => check(root, session_id, &id, json),
        CycleSubcommand::Close { id } => close(root, session_id, &id, json),
        CycleSubcommand::Show => show(root, session_id, json),
    }
}

/// Run the test gate, then record the result in both the gate memory and
/// the cycle run log. A gate failure is recorded in history and bubbles up
/// with no cycle state change.
fn gated_test_run(
    root: &Path,
    config: &Config,
    session: &mut Session,
    scope: &TestScope,
) -> anyhow::Result<CycleRun> {
    let mut gate = Gate::with_memory(config, session.gate_memory.clone());
    match gate.run_tests(root, scope) {
        Ok(result) => {
            session.gate_memory = gate.memory;
            session.record_gate_run(RunKind::Tests, &result);
            Ok(session.cycle.record_run(&result))
        }
        Err(e) => {
            session.record_gate_run(RunKind::Tests, &gate::failed_to_run(&scope.key()));
            session.save(root)?;
            Err(e.into())
        }
    }
}

fn begin(
    root: &Path,
    session_id: &str,
    id: &str,
    description: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut session = Session::open_or_create(root, session_id)?;
    session.cycle.begin_red(id, description)?;
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "red" }))?;
    } else {
        println!("Red: {id}");
        println!("Write the failing test, then: remedy cycle confirm-red {id}");
    }
    Ok(())
}

fn confirm_red(root: &Path, session_id: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut session = Session::load(root, session_id)?;
    let scope = TestScope::Case { id: id.to_string() };
    let run = gated_test_run(root, &config, &mut session, &scope)?;

    let outcome = session.cycle.confirm_red(id, &run);
    // Save regardless: the recorded run is evidence either way.
    session.save(root).context("failed to save session")?;
    outcome?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "red", "confirmed": true }))?;
    } else {
        println!("Red confirmed: {id} fails as expected.");
        println!("Implement minimally, then: remedy cycle confirm-green {id}");
    }
    Ok(())
}

fn confirm_green(root: &Path, session_id: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut session = Session::load(root, session_id)?;
    let run = gated_test_run(root, &config, &mut session, &TestScope::All)?;

    let outcome = session.cycle.confirm_green(id, &run);
    session.save(root).context("failed to save session")?;
    outcome?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "green" }))?;
    } else {
        println!("Green: {id}");
        println!("Next: remedy cycle refactor {id}");
    }
    Ok(())
}

fn refactor(root: &Path, session_id: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let mut session = Session::load(root, session_id)?;
    session.cycle.enter_refactor(id)?;
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "refactor" }))?;
    } else {
        println!("Refactor: {id}");
        println!("After each structural change: remedy cycle check {id}");
    }
    Ok(())
}

fn check(root: &Path, session_id: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut session = Session::load(root, session_id)?;
    let run = gated_test_run(root, &config, &mut session, &TestScope::All)?;

    let outcome = session.cycle.refactor_check(id, &run);
    session.save(root).context("failed to save session")?;
    outcome?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "refactor", "suite": "clean" }))?;
    } else {
        println!("Suite clean; {id} still in refactor.");
        println!("Keep refactoring or: remedy cycle close {id}");
    }
    Ok(())
}

fn close(root: &Path, session_id: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let mut session = Session::load(root, session_id)?;
    session.cycle.close(id)?;
    session.save(root).context("failed to save session")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "state": "closed" }))?;
    } else {
        println!("Closed: {id}");
    }
    Ok(())
}

fn show(root: &Path, session_id: &str, json: bool) -> anyhow::Result<()> {
    let session = Session::load(root, session_id)?;

    if json {
        let cases: Vec<_> = session
            .cycle
            .cases
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "state": c.state.to_string(),
                    "description": c.description,
                })
            })
            .collect();
        print_json(&cases)?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = session
        .cycle
        .cases
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.state.to_string(),
                c.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["case", "state", "description"], rows);
    println!("\nrecorded runs: {}", session.cycle.runs.len());
    Ok(())
}
