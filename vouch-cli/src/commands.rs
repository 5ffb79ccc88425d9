//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vouch_core::{
    Acceptance, ArtifactLink, ArtifactRegistry, ArtifactSnapshot, ArtifactType, CostBreakdown,
    EdgeInsert, JsonFileRegistry, ScoreReport, SizeFocus, TrustConfig, TrustEngine, TrustError,
};

/// Flags that apply to every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub workspace: PathBuf,
    pub registry: Option<PathBuf>,
    pub offline: bool,
}

pub async fn handle_command(command: Commands, options: &GlobalOptions) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, options),
        Commands::Import { file } => handle_import(&file, options).await,
        Commands::Score { id, device, json } => {
            let focus = device.map_or(SizeFocus::Mean, SizeFocus::Device);
            handle_score(&id, focus, json, options).await
        }
        Commands::Status { id } => handle_status(&id, options).await,
        Commands::Cost { id, dependencies } => handle_cost(&id, dependencies, options).await,
        Commands::Lineage { id } => handle_lineage(&id, options).await,
        Commands::Link { parent, child } => handle_link(&parent, &child, options).await,
        Commands::Sync { id } => handle_sync(id.as_deref(), options).await,
        Commands::LicenseCheck { id, repo_url } => {
            handle_license_check(&id, &repo_url, options).await
        }
        Commands::Reset { yes } => handle_reset(yes, options).await,
    }
}

/// Effective configuration: layered files and env, then CLI flags.
fn load_config(options: &GlobalOptions) -> anyhow::Result<TrustConfig> {
    let mut config = vouch_core::load_config(Some(&options.workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    if options.offline {
        config.repo_host.enabled = false;
    }
    if let Some(path) = &options.registry {
        config.registry.path = Some(path.clone());
    }
    if config.repo_host.token.is_none() {
        config.repo_host.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    }
    Ok(config)
}

fn registry_path(config: &TrustConfig, workspace: &Path) -> PathBuf {
    config
        .registry
        .resolved_path()
        .unwrap_or_else(|| workspace.join(".vouch").join("registry.json"))
}

struct Session {
    registry: Arc<JsonFileRegistry>,
    engine: TrustEngine,
}

/// Open the registry and build an engine whose lineage graph reflects it.
async fn open_session(options: &GlobalOptions) -> anyhow::Result<Session> {
    let config = load_config(options)?;
    let path = registry_path(&config, &options.workspace);
    let registry = Arc::new(JsonFileRegistry::open(&path)?);
    let engine = TrustEngine::from_config(&config, registry.clone())?;

    let summary = engine.rebuild_lineage().await?;
    for rejected in &summary.rejected {
        tracing::warn!(error = %rejected, "Declared link not added to lineage graph");
    }
    Ok(Session { registry, engine })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Many(Vec<ArtifactSnapshot>),
    One(Box<ArtifactSnapshot>),
}

fn parse_import(text: &str) -> anyhow::Result<Vec<ArtifactSnapshot>> {
    let document: ImportDocument = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("Invalid artifact JSON: {}", e))?;
    Ok(match document {
        ImportDocument::Many(items) => items,
        ImportDocument::One(item) => vec![*item],
    })
}

async fn handle_import(file: &Path, options: &GlobalOptions) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", file.display(), e))?;
    let artifacts = parse_import(&text)?;

    let session = open_session(options).await?;
    let count = artifacts.len();
    for artifact in artifacts {
        let id = artifact.id.clone();
        session.registry.insert(artifact).await?;
        let summary = session.engine.sync_lineage(&id).await?;
        for rejected in summary.rejected {
            println!("  warning: {rejected}");
        }
    }
    println!(
        "Imported {} artifact(s) into {}",
        count,
        session.registry.path().display()
    );
    Ok(())
}

async fn handle_score(
    id: &str,
    focus: SizeFocus,
    json: bool,
    options: &GlobalOptions,
) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let report = match session.engine.compute_score_with(id, focus).await {
        Ok(report) => report,
        Err(TrustError::RegistryWriteFailure {
            message, report, ..
        }) => {
            eprintln!("warning: score was computed but not saved: {message}");
            *report
        }
        Err(e) => return Err(e.into()),
    };

    let acceptance = session.engine.acceptance(&report);
    if json {
        let mut dashboard = report.to_dashboard_json();
        if let Some(object) = dashboard.as_object_mut() {
            object.insert("acceptance".into(), serde_json::to_value(&acceptance)?);
        }
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print_report(&report);
        println!("{}", describe_acceptance(&acceptance));
    }
    Ok(())
}

fn describe_acceptance(acceptance: &Acceptance) -> String {
    match acceptance {
        Acceptance::Accepted => "accepted".to_string(),
        Acceptance::Rejected { failing } => {
            format!("rejected: below threshold: {}", failing.join(", "))
        }
    }
}

async fn handle_status(id: &str, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    match session.engine.status(id).await? {
        Some(acceptance) => println!("{id}: {}", describe_acceptance(&acceptance)),
        None => println!("{id}: not scored yet"),
    }
    Ok(())
}

async fn handle_cost(id: &str, dependencies: bool, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let cost = session.engine.artifact_cost(id, dependencies).await?;
    println!("{}", serde_json::to_string_pretty(&cost_json(&cost))?);
    Ok(())
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Cost breakdown with every size also given in MB, rounded to two places.
fn cost_json(cost: &CostBreakdown) -> serde_json::Value {
    let dependencies: Vec<serde_json::Value> = cost
        .dependencies
        .iter()
        .map(|dep| {
            serde_json::json!({
                "artifact_id": dep.artifact_id,
                "size_bytes": dep.size_bytes,
                "size_mb": to_mb(dep.size_bytes),
            })
        })
        .collect();
    serde_json::json!({
        "artifact_id": cost.artifact_id,
        "standalone_bytes": cost.standalone_bytes,
        "standalone_mb": to_mb(cost.standalone_bytes),
        "total_bytes": cost.total_bytes,
        "total_mb": to_mb(cost.total_bytes),
        "dependencies": dependencies,
    })
}

fn print_report(report: &ScoreReport) {
    println!(
        "{}  net score {:.3}  (weights {}, {} ms)",
        report.artifact_id, report.net_score, report.weights_version, report.total_latency_ms
    );
    for sub in &report.sub_scores {
        println!("  {:<20} {:>6.3}  {:>6} ms", sub.metric.as_str(), sub.value, sub.latency_ms);
        if let Some(devices) = &sub.devices {
            for class in vouch_core::DeviceClass::ALL {
                println!("    {:<18} {:>6.3}", class.as_str(), devices.get(class));
            }
        }
    }
}

async fn handle_lineage(id: &str, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let view = session.engine.get_lineage(id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Insert the edge, then record it on the child so it survives restarts.
async fn handle_link(parent: &str, child: &str, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let outcome = session.engine.insert_lineage_edge(parent, child).await?;
    if outcome == EdgeInsert::AlreadyPresent {
        println!("{parent} -> {child} already recorded");
        return Ok(());
    }

    let parent_type = session.registry.fetch_snapshot(parent).await?.artifact_type;
    let child_record = session.registry.fetch_snapshot(child).await?;
    match declare_link(child_record, parent, parent_type) {
        Some(updated) => {
            session.registry.insert(updated).await?;
            println!("Linked {parent} -> {child}");
        }
        None => println!(
            "Linked {parent} -> {child} for this session only: {child} already declares a different {parent_type} link"
        ),
    }
    Ok(())
}

/// Child record with the parent declared in the slot for its type, or `None`
/// when that slot already names another artifact.
fn declare_link(
    mut child: ArtifactSnapshot,
    parent_id: &str,
    parent_type: ArtifactType,
) -> Option<ArtifactSnapshot> {
    let slot_taken = |existing: Option<&str>| existing.is_some_and(|id| id != parent_id);
    match parent_type {
        ArtifactType::Model => {
            if slot_taken(child.parent_model.as_deref()) {
                return None;
            }
            child.parent_model = Some(parent_id.to_string());
        }
        ArtifactType::Dataset => {
            if slot_taken(child.dataset.as_ref().map(|l| l.id.as_str())) {
                return None;
            }
            child.dataset.get_or_insert_with(|| ArtifactLink::new(parent_id));
        }
        ArtifactType::Code => {
            if slot_taken(child.code.as_ref().map(|l| l.id.as_str())) {
                return None;
            }
            child.code.get_or_insert_with(|| ArtifactLink::new(parent_id));
        }
    }
    Some(child)
}

async fn handle_sync(id: Option<&str>, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let summary = match id {
        Some(id) => session.engine.sync_lineage(id).await?,
        // Opening the session already synced every artifact.
        None => vouch_core::SyncSummary::default(),
    };
    for rejected in &summary.rejected {
        println!("  rejected: {rejected}");
    }
    let lineage = session.engine.lineage();
    println!(
        "Lineage graph: {} node(s), {} edge(s)",
        lineage.node_count(),
        lineage.edge_count()
    );
    if let Some(id) = id {
        let parents: Vec<String> = lineage
            .parents(id)
            .into_iter()
            .map(|(node, relation)| format!("{} ({relation})", node.artifact_id))
            .collect();
        println!("{id} parents: {}", parents.join(", "));
    }
    Ok(())
}

async fn handle_license_check(
    id: &str,
    repo_url: &str,
    options: &GlobalOptions,
) -> anyhow::Result<()> {
    let session = open_session(options).await?;
    let compatible = session.engine.license_check(id, repo_url).await?;
    println!("{}", serde_json::json!({ "artifact_id": id, "compatible": compatible }));
    Ok(())
}

async fn handle_reset(yes: bool, options: &GlobalOptions) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("Refusing to reset without --yes");
    }
    let session = open_session(options).await?;
    session.engine.reset().await?;
    println!("Registry reset: {}", session.registry.path().display());
    Ok(())
}

fn handle_config(action: ConfigAction, options: &GlobalOptions) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(options)?;
            print!("{}", config.to_toml_string()?);
            println!(
                "# registry file: {}",
                registry_path(&config, &options.workspace).display()
            );
            Ok(())
        }
        ConfigAction::Init => {
            let config_dir = options.workspace.join(".vouch");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&TrustConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
    }
}
