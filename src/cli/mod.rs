//! SV-040: CLI subcommands: init, validate, list, show, save, remove, upload,
//! import, sync, targets, run, reset-mirror, exec-unit.

use crate::core::error::{Error, Result};
use crate::core::repository::{DirectoryCatalog, Repository, SaveRequest};
use crate::core::types::{BuildContext, ExecutableUnit, Interpreter, Parameter, VaultConfig, MASTER};
use crate::core::{dispatcher, parser, resolver};
use crate::runtime;
use crate::transport::Inventory;
use clap::Subcommand;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new script vault
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate vault.yaml without touching any node
    Validate {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,
    },

    /// List catalog records
    List {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,
    },

    /// Show one record and its body
    Show {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Script id
        id: String,
    },

    /// Store a script from a local file under the given id
    Save {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Script id (spaces become underscores)
        id: String,

        /// File holding the script body
        #[arg(long)]
        body: PathBuf,

        /// Display name (default: the id)
        #[arg(long)]
        name: Option<String>,

        /// Free-form comment
        #[arg(long, default_value = "")]
        comment: String,

        /// Interpreter: shebang or engine
        #[arg(long, default_value = "engine")]
        interpreter: String,

        /// Only allow runs on the master
        #[arg(long)]
        master_only: bool,

        /// Allow runs by non-administrators
        #[arg(long)]
        non_admin: bool,

        /// Declared parameter (repeatable): NAME or NAME=DEFAULT
        #[arg(long = "param")]
        params: Vec<String>,
    },

    /// Delete a script body and its record
    Remove {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Script id
        id: String,
    },

    /// Copy a local file into the script directory under its file name
    Upload {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// File to upload
        source: PathBuf,

        /// Interpreter for a new record: shebang or engine
        #[arg(long, default_value = "engine")]
        interpreter: String,

        /// Allow runs by non-administrators
        #[arg(long)]
        non_admin: bool,
    },

    /// Import a script by id from another catalog directory
    Import {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Directory of the source catalog
        #[arg(long)]
        from: PathBuf,

        /// Catalog name recorded as origin (default: directory name)
        #[arg(long)]
        catalog: Option<String>,

        /// Script id in the source catalog
        id: String,
    },

    /// Reconcile the catalog with the script directory
    Sync {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,
    },

    /// List the targets a script may run on
    Targets {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Script id
        id: String,
    },

    /// Run a script on a target alias and print the combined report
    Run {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,

        /// Script id
        id: String,

        /// Target: master, all, "all agents", or an agent name
        #[arg(short, long, default_value = MASTER)]
        target: String,

        /// Parameter value (repeatable): NAME=VALUE
        #[arg(long = "param")]
        params: Vec<String>,

        /// Build name to bind for master-only engine scripts
        #[arg(long)]
        build_name: Option<String>,

        /// Build number
        #[arg(long, default_value_t = 0)]
        build_number: u64,

        /// Build workspace (working directory for shell scripts)
        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Restore the script directory to the mirror's last known state
    ResetMirror {
        /// Path to vault.yaml
        #[arg(short, long, default_value = "vault.yaml")]
        file: PathBuf,
    },

    /// Execute a unit read as JSON from stdin (target side)
    #[command(hide = true)]
    ExecUnit {
        /// Name of this node
        #[arg(long, default_value = MASTER)]
        node: String,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::List { file } => cmd_list(&file),
        Commands::Show { file, id } => cmd_show(&file, &id),
        Commands::Save {
            file,
            id,
            body,
            name,
            comment,
            interpreter,
            master_only,
            non_admin,
            params,
        } => {
            let body = std::fs::read_to_string(&body)?;
            let req = SaveRequest {
                display_name: name,
                comment,
                restricted_to_master: master_only,
                non_administer_executable: non_admin,
                declared_parameters: params.iter().map(|p| Parameter::parse_assignment(p)).collect(),
                ..SaveRequest::new(id, parse_interpreter(&interpreter)?, body)
            };
            cmd_save(&file, req)
        }
        Commands::Remove { file, id } => cmd_remove(&file, &id),
        Commands::Upload {
            file,
            source,
            interpreter,
            non_admin,
        } => cmd_upload(&file, &source, parse_interpreter(&interpreter)?, non_admin),
        Commands::Import {
            file,
            from,
            catalog,
            id,
        } => cmd_import(&file, &from, catalog, &id),
        Commands::Sync { file } => cmd_sync(&file),
        Commands::Targets { file, id } => cmd_targets(&file, &id),
        Commands::Run {
            file,
            id,
            target,
            params,
            build_name,
            build_number,
            workspace,
        } => {
            let build = build_name.map(|name| BuildContext {
                name,
                number: build_number,
                workspace,
            });
            let report = run_report(&file, &id, &target, &params, build)?;
            print!("{}", report);
            Ok(())
        }
        Commands::ResetMirror { file } => cmd_reset_mirror(&file),
        Commands::ExecUnit { node } => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            println!("{}", exec_unit(&input, &node)?);
            Ok(())
        }
    }
}

fn parse_interpreter(name: &str) -> Result<Interpreter> {
    match Interpreter::parse(name) {
        Some(Interpreter::SourceMissing) | None => Err(Error::Config(format!(
            "unknown interpreter '{}' (expected shebang or engine)",
            name
        ))),
        Some(kind) => Ok(kind),
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    let vault_path = path.join("vault.yaml");
    if vault_path.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            vault_path.display()
        )));
    }

    let script_dir = path.join("scripts");
    std::fs::create_dir_all(&script_dir)?;

    let template = r#"version: "1.0"
name: my-scripts
description: "Managed by scriptvault"

script_dir: scripts
catalog: catalog.yaml
scan_extension: rhai
mirror: journal

agents: {}
"#;
    std::fs::write(&vault_path, template)?;

    println!("Initialized script vault at {}", path.display());
    println!("  Created: {}", vault_path.display());
    println!("  Created: {}/", script_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let config = parse_and_validate(file)?;
    println!(
        "OK: {} ({} agents, mirror: {:?})",
        config.name,
        config.agents.len(),
        config.mirror
    );
    Ok(())
}

/// Parse and validate a vault file, printing every validation error.
fn parse_and_validate(file: &Path) -> Result<VaultConfig> {
    let config = parser::parse_vault_file(file)?;
    let errors = parser::validate_vault(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(Error::Config(format!("{} validation error(s)", errors.len())))
}

fn open_repository(file: &Path) -> Result<(VaultConfig, Repository)> {
    let config = parse_and_validate(file)?;
    let repo = Repository::open(file, &config)?;
    Ok((config, repo))
}

fn cmd_list(file: &Path) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let catalog = repo.load_catalog()?;
    if catalog.is_empty() {
        println!("No scripts.");
        return Ok(());
    }
    for record in catalog.scripts.values() {
        let mut flags = Vec::new();
        if record.restricted_to_master {
            flags.push("master-only");
        }
        if record.non_administer_executable {
            flags.push("non-admin");
        }
        if !record.available {
            flags.push("MISSING");
        }
        println!(
            "  {} [{}] {}{}",
            record.id,
            record.interpreter,
            record.display_name,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }
    Ok(())
}

fn cmd_show(file: &Path, id: &str) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let catalog = repo.load_catalog()?;
    let record = repo.load(&catalog, id, true)?;

    println!("Script: {} ({})", record.display_name, record.id);
    println!("  Interpreter: {}", record.interpreter);
    println!("  Available: {}", record.available);
    println!("  Master only: {}", record.restricted_to_master);
    if !record.comment.is_empty() {
        println!("  Comment: {}", record.comment);
    }
    for p in &record.declared_parameters {
        println!("  Param: {}", p);
    }
    if let Some(ref origin) = record.origin {
        println!("  Origin: {}/{}", origin.catalog, origin.id);
    }
    if let Some(ref body) = record.body {
        println!();
        print!("{}", body);
        if !body.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn cmd_save(file: &Path, req: SaveRequest) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let mut catalog = repo.load_catalog()?;
    let record = repo.save(&mut catalog, req)?;
    println!("Saved {}", record.id);
    Ok(())
}

fn cmd_remove(file: &Path, id: &str) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let mut catalog = repo.load_catalog()?;
    if repo.delete(&mut catalog, id)? {
        println!("Removed {}", id);
    } else {
        println!("Removed {} (not in catalog)", id);
    }
    Ok(())
}

fn cmd_upload(
    file: &Path,
    source: &Path,
    interpreter: Interpreter,
    non_admin: bool,
) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let mut catalog = repo.load_catalog()?;
    let record = repo.upload(&mut catalog, source, interpreter, non_admin)?;
    println!("Uploaded {}", record.id);
    Ok(())
}

fn cmd_import(file: &Path, from: &Path, catalog_name: Option<String>, id: &str) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let name = catalog_name.unwrap_or_else(|| {
        from.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| from.display().to_string())
    });
    let remote = DirectoryCatalog::new(name, from);
    let mut catalog = repo.load_catalog()?;
    let record = repo.import(&mut catalog, &remote, id)?;
    println!("Imported {} as {}", id, record.id);
    Ok(())
}

fn cmd_sync(file: &Path) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    let mut catalog = repo.load_catalog()?;
    let report = repo.reconcile(&mut catalog)?;
    if report.is_noop() {
        println!("Catalog in sync ({} scripts).", catalog.len());
        return Ok(());
    }
    for id in &report.adopted {
        println!("  + {}", id);
    }
    for id in &report.restored {
        println!("  ~ {}", id);
    }
    for id in &report.missing {
        println!("  ! {} (source missing)", id);
    }
    println!(
        "Sync: {} adopted, {} restored, {} missing.",
        report.adopted.len(),
        report.restored.len(),
        report.missing.len()
    );
    Ok(())
}

fn cmd_targets(file: &Path, id: &str) -> Result<()> {
    let (config, repo) = open_repository(file)?;
    let catalog = repo.load_catalog()?;
    let record = repo.load(&catalog, id, false)?;
    let fleet = Inventory::from_config(&config);
    for target in dispatcher::selectable_targets(&record, &fleet) {
        println!("{}", target);
    }
    Ok(())
}

/// Resolve, dispatch, and return the combined report of one run.
fn run_report(
    file: &Path,
    id: &str,
    target: &str,
    params: &[String],
    build: Option<BuildContext>,
) -> Result<String> {
    let (config, repo) = open_repository(file)?;
    let catalog = repo.load_catalog()?;
    let record = repo.load(&catalog, id, true)?;

    let supplied: Vec<Parameter> = params.iter().map(|p| Parameter::parse_assignment(p)).collect();
    let parameters = resolver::bind_parameters(&record.declared_parameters, &supplied);
    let unit = resolver::resolve(&record, parameters, build)?;

    let fleet = Inventory::from_config(&config);
    dispatcher::run(target, &unit, &fleet)
}

fn cmd_reset_mirror(file: &Path) -> Result<()> {
    let (_, repo) = open_repository(file)?;
    repo.reset_mirror()?;
    println!("Mirror reset: {}", repo.script_dir().display());
    Ok(())
}

/// Target side of a channel: JSON unit in, JSON result out.
fn exec_unit(input: &str, node: &str) -> Result<String> {
    let unit: ExecutableUnit = serde_json::from_str(input)?;
    let result = runtime::execute(&unit, node)?;
    Ok(serde_json::to_string(&result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitResult;

    fn vault(dir: &Path, agents: &str) -> PathBuf {
        let file = dir.join("vault.yaml");
        std::fs::write(
            &file,
            format!(
                "version: \"1.0\"\nname: test\nmirror: journal\nagents:\n{}",
                agents
            ),
        )
        .unwrap();
        file
    }

    fn save(file: &Path, id: &str, body: &str, master_only: bool) {
        let mut req = SaveRequest::new(id, Interpreter::Engine, body);
        req.restricted_to_master = master_only;
        req.declared_parameters = vec![Parameter::new("WHO", Some("nobody".into()))];
        cmd_save(file, req).unwrap();
    }

    #[test]
    fn test_sv040_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("vault");
        std::fs::create_dir_all(&sub).unwrap();
        cmd_init(&sub).unwrap();
        assert!(sub.join("vault.yaml").exists());
        assert!(sub.join("scripts").is_dir());
        cmd_validate(&sub.join("vault.yaml")).unwrap();
    }

    #[test]
    fn test_sv040_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vault.yaml"), "x").unwrap();
        let err = cmd_init(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_sv040_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vault.yaml");
        std::fs::write(
            &file,
            "version: \"2.0\"\nname: \"\"\nagents:\n  master:\n    addr: 10.0.0.1\n",
        )
        .unwrap();
        let err = cmd_validate(&file).unwrap_err();
        assert!(err.to_string().contains("3 validation error(s)"));
    }

    #[test]
    fn test_sv040_parse_interpreter() {
        assert_eq!(parse_interpreter("shell").unwrap(), Interpreter::Shebang);
        assert_eq!(parse_interpreter("engine").unwrap(), Interpreter::Engine);
        assert!(parse_interpreter("source_missing").is_err());
        assert!(parse_interpreter("perl").is_err());
    }

    #[test]
    fn test_sv040_run_on_master_with_params() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  {}\n");
        save(&file, "hello.rhai", "print(\"hi \" + WHO);", false);

        let report = run_report(&file, "hello.rhai", "master", &[], None).unwrap();
        assert_eq!(
            report,
            format!(
                "{s}\n[master]:\nhi nobody\n{s}\n",
                s = dispatcher::SEPARATOR
            )
        );

        let report =
            run_report(&file, "hello.rhai", "master", &["WHO=ops".to_string()], None).unwrap();
        assert!(report.contains("hi ops\n"));
    }

    #[test]
    fn test_sv040_run_all_with_local_and_offline_agents() {
        let dir = tempfile::tempdir().unwrap();
        let agents = "  box:\n    addr: 127.0.0.1\n  far:\n    addr: 10.255.0.1\n    online: false\n";
        let file = vault(dir.path(), agents);
        save(&file, "who.rhai", "print(node);", false);

        let report = run_report(&file, "who.rhai", "all", &[], None).unwrap();
        let s = dispatcher::SEPARATOR;
        assert_eq!(
            report,
            format!("{s}\n[box]:\nbox\n{s}\n[far]:\n{s}\n[master]:\nmaster\n{s}\n")
        );
    }

    #[test]
    fn test_sv040_run_master_only_refuses_agents() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  box:\n    addr: 127.0.0.1\n");
        save(&file, "admin.rhai", "print(1);", true);

        let err = run_report(&file, "admin.rhai", "box", &[], None).unwrap_err();
        assert!(matches!(err, Error::MasterOnly { .. }));
        let ok = run_report(&file, "admin.rhai", "master", &[], None).unwrap();
        assert!(ok.contains("[master]:\n1\n"));
    }

    #[test]
    fn test_sv040_run_master_only_binds_build() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  {}\n");
        save(&file, "b.rhai", "print(build.name + \" \" + build.number);", true);
        let build = BuildContext {
            name: "nightly".into(),
            number: 12,
            workspace: None,
        };
        let report = run_report(&file, "b.rhai", "master", &[], Some(build)).unwrap();
        assert!(report.contains("nightly 12\n"));
    }

    #[test]
    fn test_sv040_run_unknown_script() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  {}\n");
        let err = run_report(&file, "nope.rhai", "master", &[], None).unwrap_err();
        assert!(matches!(err, Error::ScriptNotFound(_)));
    }

    #[test]
    fn test_sv040_sync_remove_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  {}\n");
        std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/found.rhai"), "print(2);").unwrap();

        cmd_sync(&file).unwrap();
        cmd_list(&file).unwrap();
        cmd_show(&file, "found.rhai").unwrap();
        let catalog = crate::core::catalog::load_catalog(&dir.path().join("catalog.yaml")).unwrap();
        assert!(catalog.get("found.rhai").unwrap().available);

        cmd_remove(&file, "found.rhai").unwrap();
        cmd_sync(&file).unwrap();
        let catalog = crate::core::catalog::load_catalog(&dir.path().join("catalog.yaml")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_sv040_upload_import_targets_reset() {
        let dir = tempfile::tempdir().unwrap();
        let file = vault(dir.path(), "  web1:\n    addr: 10.0.0.5\n");
        let src = dir.path().join("up.rhai");
        std::fs::write(&src, "print(3);").unwrap();
        cmd_upload(&file, &src, Interpreter::Engine, false).unwrap();

        let shared = dir.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("in.rhai"), "print(4);").unwrap();
        cmd_import(&file, &shared, None, "in.rhai").unwrap();

        let catalog = crate::core::catalog::load_catalog(&dir.path().join("catalog.yaml")).unwrap();
        assert_eq!(catalog.ids(), vec!["up.rhai", "in.rhai"]);
        assert_eq!(catalog.get("in.rhai").unwrap().origin.as_ref().unwrap().catalog, "shared");

        cmd_targets(&file, "up.rhai").unwrap();
        std::fs::write(dir.path().join("scripts/up.rhai"), "broken").unwrap();
        cmd_reset_mirror(&file).unwrap();
        let body = std::fs::read_to_string(dir.path().join("scripts/up.rhai")).unwrap();
        assert_eq!(body, "print(3);");
    }

    #[test]
    fn test_sv040_exec_unit_round_trip() {
        let unit = ExecutableUnit {
            script_id: "x.rhai".into(),
            strategy: crate::core::types::Strategy::Engine {
                master_context: false,
            },
            master_only: false,
            body: "print(node); 6 * 7".into(),
            parameters: Default::default(),
            build: None,
        };
        let input = serde_json::to_string(&unit).unwrap();
        let out = exec_unit(&input, "web1").unwrap();
        let result: UnitResult = serde_json::from_str(&out).unwrap();
        assert!(result.success);
        assert_eq!(result.output, "web1\n");
        assert_eq!(result.value.as_deref(), Some("42"));

        assert!(matches!(exec_unit("{", "web1"), Err(Error::Json(_))));
    }
}
