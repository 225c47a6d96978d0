use anyhow::{bail, Result};
use opentrace_core::now_ms;
use opentrace_store::discover::discover_root_files;
use opentrace_store::load_trace_files;
use opentrace_store::paths::default_root_dir;
use opentrace_timeline::{build_timeline, infer_handoffs, Timeline};
use std::path::Path;

pub fn run_timeline(
    root: Option<&Path>,
    project: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let root_dir = root
        .map(Path::to_path_buf)
        .unwrap_or_else(default_root_dir);
    let sources = discover_root_files(&root_dir, project, limit.max(1));
    if sources.is_empty() {
        bail!(
            "no root-session trace files found under {}",
            root_dir.display()
        );
    }

    let load = load_trace_files(&sources)?;
    let timeline = build_timeline(&load.records, now_ms());

    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }

    print_overview(&timeline, sources.len(), load.malformed_lines);
    Ok(())
}

fn print_overview(timeline: &Timeline, source_count: usize, malformed_lines: usize) {
    println!(
        "{} root session(s), {} session(s), from {} file(s)",
        timeline.roots.len(),
        timeline.sessions.len(),
        source_count
    );
    if malformed_lines > 0 {
        println!("  ({malformed_lines} malformed lines skipped)");
    }

    for root in &timeline.roots {
        println!("\n{} [{}]", root.title, root.root_session_id);
        for session_id in &root.session_ids {
            let Some(node) = timeline
                .sessions
                .iter()
                .find(|node| node.session_id == *session_id)
            else {
                continue;
            };
            let marker = if node.session_id == node.root_session_id {
                "*"
            } else {
                "-"
            };
            println!("  {marker} {} ({} children)", node.title, node.children.len());
        }
    }

    if !timeline.active_tasks.is_empty() {
        println!("\nactive tasks:");
        for task in &timeline.active_tasks {
            println!(
                "  {:>8}ms  {}  [{}]",
                task.duration_ms, task.name, task.agent
            );
        }
    }

    if !timeline.by_agent_activity.is_empty() {
        println!("\nby agent/activity:");
        for row in &timeline.by_agent_activity {
            println!(
                "  {:<20} {:<16} count={:<5} total={}ms errors={}",
                row.agent, row.activity, row.count, row.total_ms, row.errors
            );
        }
    }

    let handoffs = infer_handoffs(timeline);
    if !handoffs.is_empty() {
        println!("\nhandoffs:");
        for link in &handoffs {
            println!(
                "  {} -> {} (task {} -> {})",
                link.parent_session_id,
                link.child_session_id,
                link.parent_task_id,
                link.child_task_id
            );
        }
    }
}
