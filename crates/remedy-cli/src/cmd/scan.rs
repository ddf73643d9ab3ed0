use crate::output::print_json;
use anyhow::Context;
use remedy_core::{
    category::Categorizer,
    config::Config,
    gate::{self, AnalysisScope, Gate},
    plan::RemediationPlan,
    session::{RunKind, Session},
};
use std::path::Path;

/// Run the analysis gate, categorize the findings, and install a fresh plan
/// in the session — superseding any previous plan and its finding set.
pub fn run(root: &Path, session_id: &str, files: Vec<String>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut session = Session::open_or_create(root, session_id)?;

    let scope = if files.is_empty() {
        AnalysisScope::All
    } else {
        AnalysisScope::Files { files }
    };

    let mut gate = Gate::with_memory(&config, session.gate_memory.clone());
    let result = match gate.run_analysis(root, &scope) {
        Ok(r) => r,
        Err(e) => {
            // The gate produced nothing; keep positions unchanged but leave
            // a trace in the run history for diagnosis.
            session.record_gate_run(RunKind::Analysis, &gate::failed_to_run(&scope.key()));
            session.save(root)?;
            return Err(e.into());
        }
    };
    session.gate_memory = gate.memory;
    session.record_gate_run(RunKind::Analysis, &result);

    let categories = Categorizer::new(&config.tiers).categorize(&result.findings);
    let plan = RemediationPlan::build(scope, categories);
    let total: usize = plan.entries.iter().map(|e| e.finding_ids.len()).sum();
    let category_count = plan.entries.len();
    session.set_plan(plan);
    session.save(root)?;

    if json {
        print_json(&serde_json::json!({
            "status": result.status.to_string(),
            "findings": total,
            "categories": category_count,
            "delta": result.delta,
        }))?;
    } else if total == 0 {
        println!("Analysis clean: no findings.");
    } else {
        println!("Found {total} finding(s) in {category_count} categorie(s).");
        println!("Next: remedy plan advance");
    }
    Ok(())
}
