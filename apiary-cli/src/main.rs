use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use apiary_client::{Client, ClientConfig};
use apiary_core::differ::{create_plan, destroy_plan};
use apiary_core::effect::Effect;
use apiary_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use apiary_core::manifest::Manifest;
use apiary_core::plan::Plan;
use apiary_core::provider::Provider;
use apiary_core::resource::{Resource, ResourceId, ResourceKind, ResourceSpec, State};
use apiary_provider_hive::HiveProvider;
use apiary_state::{LocalBackend, ResourceRecord, StateBackend, StateFile};

#[derive(Parser)]
#[command(name = "apiary")]
#[command(about = "Declarative management of a Hive Fabric cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest file
    Validate {
        /// Path to the manifest
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// Show the execution plan without applying changes
    Plan {
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// Apply changes to reach the declared state
    Apply {
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// Destroy all resources declared in the manifest
    Destroy {
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Show the current remote state of the declared resources
    Show {
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// State management commands
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resources tracked in the state file
    List {
        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// Remove a resource from the state without touching the fabric
    Rm {
        /// Resource address, e.g. virtual_machine.jump
        address: String,

        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
    /// Force-release a stale state lock
    Unlock {
        lock_id: String,

        #[arg(default_value = "apiary.toml")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file } => run_apply(&file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Show { file } => run_show(&file).await,
        Commands::State { command } => run_state_command(command).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn state_backend(manifest_path: &Path) -> LocalBackend {
    let dir = manifest_path.parent().unwrap_or(Path::new("."));
    LocalBackend::with_path(dir.join(LocalBackend::DEFAULT_STATE_FILE))
}

async fn connect_provider(manifest: &Manifest) -> Result<HiveProvider, String> {
    let password = manifest
        .connection
        .password
        .clone()
        .or_else(|| std::env::var("APIARY_PASSWORD").ok())
        .ok_or("no password in manifest and APIARY_PASSWORD is not set")?;

    let client = Client::connect(&ClientConfig {
        host: manifest.connection.host.clone(),
        username: manifest.connection.username.clone(),
        password,
        realm: manifest.connection.realm.clone(),
        insecure: manifest.connection.insecure,
    })
    .await
    .map_err(|e| format!("Failed to connect to {}: {}", manifest.connection.host, e))?;

    Ok(HiveProvider::new(client).with_timeouts((&manifest.timeouts).into()))
}

/// Read the remote state of every declared resource, using the recorded
/// identifiers to address the ones that need them.
async fn read_current_states(
    provider: &HiveProvider,
    resources: &[Resource],
    state_file: &StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current = HashMap::new();
    for resource in resources {
        let identifier = state_file
            .find_resource(resource.id.kind, &resource.id.name)
            .and_then(|r| r.identifier.clone());
        let state = provider
            .read(&resource.id, identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        current.insert(resource.id.clone(), state);
    }
    Ok(current)
}

fn recorded_specs(state_file: &StateFile, resources: &[Resource]) -> HashMap<ResourceId, ResourceSpec> {
    let mut recorded = HashMap::new();
    for resource in resources {
        if let Some(spec) = state_file
            .find_resource(resource.id.kind, &resource.id.name)
            .and_then(|r| r.spec.clone())
        {
            recorded.insert(resource.id.clone(), spec);
        }
    }
    recorded
}

async fn load_state(backend: &LocalBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to load state: {}", e))?
        .unwrap_or_default())
}

fn print_plan(plan: &Plan) {
    for effect in plan.effects() {
        let line = effect.to_string();
        let line = match effect {
            Effect::Create(_) => line.green(),
            Effect::Update { .. } => line.yellow(),
            Effect::Replace { .. } | Effect::Delete { .. } => line.red(),
            Effect::Read(_) => line.normal(),
        };
        println!("  {}", line);
    }
    println!();
    println!("{}", plan.summary());
}

/// Fold apply outcomes back into the state file, pairing each outcome
/// with the effect that produced it.
fn record_outcomes(state_file: &mut StateFile, plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(result.outcomes.iter()) {
        let Ok(outcome) = outcome else { continue };
        match (effect, outcome) {
            (Effect::Create(resource), EffectOutcome::Created { state })
            | (Effect::Update { to: resource, .. }, EffectOutcome::Updated { state })
            | (Effect::Replace { to: resource, .. }, EffectOutcome::Replaced { state }) => {
                let mut record = ResourceRecord::new(resource.id.kind, resource.id.name.clone())
                    .with_spec(resource.spec.clone())
                    .with_computed(state.computed.clone());
                if let Some(identifier) = &state.identifier {
                    record = record.with_identifier(identifier.clone());
                }
                state_file.upsert_resource(record);
            }
            (Effect::Delete { id, .. }, EffectOutcome::Deleted) => {
                state_file.remove_resource(id.kind, &id.name);
            }
            _ => {}
        }
    }
}

fn print_apply_result(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(result.outcomes.iter()) {
        match outcome {
            Ok(_) => println!("  {} {}", "✓".green(), effect),
            Err(e) => println!("  {} {} - {}", "✗".red(), effect, e),
        }
    }
    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "Apply failed. {} succeeded, {} failed.",
                result.success_count, result.failure_count
            )
            .red()
            .bold()
        );
    }
}

fn run_validate(file: &PathBuf) -> Result<(), String> {
    let manifest = Manifest::from_file(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources();

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    for resource in &resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn run_plan(file: &PathBuf) -> Result<(), String> {
    let manifest = Manifest::from_file(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources();

    let backend = state_backend(file);
    let state_file = load_state(&backend).await?;
    let provider = connect_provider(&manifest).await?;

    let current = read_current_states(&provider, &resources, &state_file).await?;
    let recorded = recorded_specs(&state_file, &resources);
    let plan = create_plan(&resources, &current, &recorded);

    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }
    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &PathBuf) -> Result<(), String> {
    let manifest = Manifest::from_file(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources();

    let backend = state_backend(file);
    let mut state_file = load_state(&backend).await?;
    let provider = connect_provider(&manifest).await?;

    let current = read_current_states(&provider, &resources, &state_file).await?;
    let recorded = recorded_specs(&state_file, &resources);
    let plan = create_plan(&resources, &current, &recorded);

    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;

    let result = Interpreter::new(provider).apply(&plan).await;

    record_outcomes(&mut state_file, &plan, &result);
    state_file.increment_serial();
    let write_result = backend.write_state(&state_file).await;
    backend.release_lock(&lock).await.map_err(|e| e.to_string())?;
    write_result.map_err(|e| format!("Failed to write state: {}", e))?;

    print_apply_result(&plan, &result);
    if result.is_success() { Ok(()) } else { Err("apply did not complete".to_string()) }
}

async fn run_destroy(file: &PathBuf, auto_approve: bool) -> Result<(), String> {
    let manifest = Manifest::from_file(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources();

    if resources.is_empty() {
        println!("{}", "No resources declared in the manifest.".yellow());
        return Ok(());
    }

    let backend = state_backend(file);
    let mut state_file = load_state(&backend).await?;

    // Dependents go first: destruction runs the creation order in
    // reverse.
    let targets: Vec<(ResourceId, Option<String>)> = resources
        .iter()
        .rev()
        .map(|r| {
            let identifier = state_file
                .find_resource(r.id.kind, &r.id.name)
                .and_then(|record| record.identifier.clone());
            (r.id.clone(), identifier)
        })
        .collect();

    let plan = destroy_plan(&targets);
    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Destroy all resources above? Only 'yes' is accepted:")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying...".cyan().bold());
    println!();

    let provider = connect_provider(&manifest).await?;
    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;

    let result = Interpreter::new(provider).apply(&plan).await;

    record_outcomes(&mut state_file, &plan, &result);
    state_file.increment_serial();
    let write_result = backend.write_state(&state_file).await;
    backend.release_lock(&lock).await.map_err(|e| e.to_string())?;
    write_result.map_err(|e| format!("Failed to write state: {}", e))?;

    print_apply_result(&plan, &result);
    if result.is_success() { Ok(()) } else { Err("destroy did not complete".to_string()) }
}

async fn run_show(file: &PathBuf) -> Result<(), String> {
    let manifest = Manifest::from_file(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources();

    let backend = state_backend(file);
    let state_file = load_state(&backend).await?;
    let provider = connect_provider(&manifest).await?;

    for resource in &resources {
        let identifier = state_file
            .find_resource(resource.id.kind, &resource.id.name)
            .and_then(|r| r.identifier.clone());
        let state = provider
            .read(&resource.id, identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;

        if !state.exists {
            println!("{} {}", resource.id.to_string().bold(), "(absent)".yellow());
            continue;
        }

        println!(
            "{} id={}",
            resource.id.to_string().bold(),
            state.identifier.as_deref().unwrap_or("-")
        );
        if let Some(runtime) = &state.computed.state {
            println!("    state: {}", runtime);
        }
        if let Some(name) = &state.computed.storage_name {
            println!("    storage: {}", name);
        }
        if let Some(kind) = &state.computed.storage_kind {
            println!("    type: {}", kind);
        }
    }
    Ok(())
}

async fn run_state_command(command: StateCommands) -> Result<(), String> {
    match command {
        StateCommands::List { file } => {
            let backend = state_backend(&file);
            let state_file = load_state(&backend).await?;
            if state_file.resources.is_empty() {
                println!("{}", "State is empty.".yellow());
                return Ok(());
            }
            println!("Serial {} (lineage {})", state_file.serial, state_file.lineage);
            for record in &state_file.resources {
                println!(
                    "  {}.{} id={}",
                    record.kind,
                    record.name,
                    record.identifier.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        StateCommands::Rm { address, file } => {
            let (kind, name) = address
                .split_once('.')
                .ok_or("address must look like kind.name, e.g. virtual_machine.jump")?;
            let kind = ResourceKind::from_str(kind)?;

            let backend = state_backend(&file);
            let mut state_file = load_state(&backend).await?;
            if state_file.remove_resource(kind, name).is_none() {
                return Err(format!("{} not found in state", address));
            }
            state_file.increment_serial();
            backend
                .write_state(&state_file)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", format!("Removed {} from state.", address).green());
            Ok(())
        }
        StateCommands::Unlock { lock_id, file } => {
            let backend = state_backend(&file);
            backend
                .force_unlock(&lock_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", "Lock released.".green());
            Ok(())
        }
    }
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{} ", prompt);
    io::stdout().flush().map_err(|e| e.to_string())?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| e.to_string())?;
    Ok(line.trim() == "yes")
}
