//! Argo CLI - workflow commands against an Argo Server or local manifests
//!
//! Commands only parse arguments, resolve a client and print. All mode
//! handling lives in `argo-client`; this binary is the one place that turns
//! an error into a process exit status.

use argo_client::{ApiClient, ClientFactory};
use argo_core::catalog::parse_manifests;
use argo_core::{ArgoError, CallContext, ClientConfig, Manifest, Mode, ObjectKind};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "argo")]
#[command(about = "Argo Workflows command-line client", long_about = None)]
struct Cli {
    /// Client config file (TOML)
    #[arg(long, global = true, env = "ARGO_CONFIG")]
    config: Option<PathBuf>,

    /// Answer from local manifest files instead of an Argo Server
    #[arg(long, global = true)]
    offline: bool,

    /// Manifest files or directories to load in offline mode
    #[arg(long = "offline-files", global = true, value_delimiter = ',')]
    offline_files: Vec<PathBuf>,

    /// Namespace; overrides ARGO_NAMESPACE
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Argo Server host:port or URL; overrides ARGO_SERVER
    #[arg(short = 's', long = "argo-server", global = true)]
    argo_server: Option<String>,

    /// Path prefix when the server sits behind a base href
    #[arg(long = "argo-base-href", global = true)]
    argo_base_href: Option<String>,

    /// Whether the server uses TLS
    #[arg(short = 'e', long, global = true, num_args = 0..=1, default_missing_value = "true")]
    secure: Option<bool>,

    /// Do not verify the server's certificate
    #[arg(short = 'k', long = "insecure-skip-verify", global = true)]
    insecure_skip_verify: bool,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    headers: Vec<String>,

    /// Controller instance id applied to created objects
    #[arg(long = "instanceid", global = true)]
    instance_id: Option<String>,

    /// Seconds before a server request is abandoned
    #[arg(long = "request-timeout", global = true)]
    request_timeout: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    loglevel: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Output::Name)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Name,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Display details about workflows
    Get {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List workflows
    List,

    /// Submit workflows from manifest files
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate manifest files of any workflow kind
    Lint {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Manipulate workflow templates
    Template {
        #[command(subcommand)]
        command: ObjectCommand,
    },

    /// Manipulate cluster workflow templates
    #[command(name = "cluster-template")]
    ClusterTemplate {
        #[command(subcommand)]
        command: ObjectCommand,
    },

    /// Manipulate cron workflows
    Cron {
        #[command(subcommand)]
        command: ObjectCommand,
    },
}

#[derive(Subcommand)]
enum ObjectCommand {
    /// Display details by name
    Get {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List all
    List,
    /// Create from manifest files
    Create {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate manifest files
    Lint {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.loglevel);

    if let Err(e) = run(&cli) {
        if cli.output == Output::Json {
            let error_json = serde_json::json!({
                "code": e.code(),
                "message": e.to_string(),
                "fatal": e.is_fatal(),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error_json).unwrap_or_else(|_| e.to_string())
            );
        } else if e.is_fatal() {
            eprintln!("{} {}", "fatal:".red(), e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(exit_status(&e));
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_status(err: &ArgoError) -> i32 {
    if err.is_cancelled() {
        130
    } else {
        1
    }
}

/// Layer command-line flags over file and environment configuration
fn build_config(cli: &Cli) -> argo_core::Result<ClientConfig> {
    let mut config = ClientConfig::resolve(cli.config.as_deref())?;

    if cli.offline {
        config.mode = Mode::Offline;
    }
    if !cli.offline_files.is_empty() {
        config.offline_files = cli.offline_files.clone();
    }
    if let Some(ns) = &cli.namespace {
        config.namespace = Some(ns.clone());
    }
    if let Some(server) = &cli.argo_server {
        config.server.url = Some(server.clone());
    }
    if let Some(href) = &cli.argo_base_href {
        config.server.base_href = href.clone();
    }
    if let Some(secure) = cli.secure {
        config.server.secure = secure;
    }
    if cli.insecure_skip_verify {
        config.server.insecure_skip_verify = true;
    }
    if !cli.headers.is_empty() {
        config.server.headers.extend(cli.headers.iter().cloned());
    }
    if let Some(id) = &cli.instance_id {
        config.instance_id = Some(id.clone());
    }
    if let Some(secs) = cli.request_timeout {
        config.request_timeout_secs = secs;
    }

    // Offline lint resolves references between the files being linted
    if config.mode == Mode::Offline {
        if let Some(files) = lint_files(&cli.command) {
            config.offline_files.extend(files.iter().cloned());
        }
    }

    Ok(config)
}

fn lint_files(command: &Commands) -> Option<&[PathBuf]> {
    match command {
        Commands::Lint { files } => Some(files.as_slice()),
        Commands::Template { command }
        | Commands::ClusterTemplate { command }
        | Commands::Cron { command } => match command {
            ObjectCommand::Lint { files } => Some(files.as_slice()),
            _ => None,
        },
        _ => None,
    }
}

fn run(cli: &Cli) -> argo_core::Result<()> {
    let factory = ClientFactory::new(build_config(cli)?);
    let config = factory.config();
    debug!(
        mode = ?config.mode,
        files = config.offline_files.len(),
        "resolved client configuration"
    );
    let ctx = CallContext::background()
        .with_timeout(config.request_timeout() + Duration::from_secs(5));
    let (ctx, client) = factory.new_api_client(ctx)?;

    match &cli.command {
        Commands::Get { names } => cmd_get(&client, &ctx, ObjectKind::Workflow, names, cli.output),
        Commands::List => cmd_list(&client, &ctx, ObjectKind::Workflow, cli.output),
        Commands::Submit { files } => {
            cmd_create(&client, &ctx, ObjectKind::Workflow, files, cli.output)
        }
        Commands::Lint { files } => cmd_lint(&client, &ctx, None, files),
        Commands::Template { command } => {
            cmd_object(&client, &ctx, ObjectKind::WorkflowTemplate, command, cli.output)
        }
        Commands::ClusterTemplate { command } => cmd_object(
            &client,
            &ctx,
            ObjectKind::ClusterWorkflowTemplate,
            command,
            cli.output,
        ),
        Commands::Cron { command } => {
            cmd_object(&client, &ctx, ObjectKind::CronWorkflow, command, cli.output)
        }
    }
}

fn cmd_object(
    client: &ApiClient,
    ctx: &CallContext,
    kind: ObjectKind,
    command: &ObjectCommand,
    output: Output,
) -> argo_core::Result<()> {
    match command {
        ObjectCommand::Get { names } => cmd_get(client, ctx, kind, names, output),
        ObjectCommand::List => cmd_list(client, ctx, kind, output),
        ObjectCommand::Create { files } => cmd_create(client, ctx, kind, files, output),
        ObjectCommand::Lint { files } => cmd_lint(client, ctx, Some(kind), files),
    }
}

fn get_one(
    client: &ApiClient,
    ctx: &CallContext,
    kind: ObjectKind,
    name: &str,
) -> argo_core::Result<Manifest> {
    let ns = ctx.namespace();
    match kind {
        ObjectKind::Workflow => client.new_workflow_service_client().get_workflow(ctx, ns, name),
        ObjectKind::WorkflowTemplate => client
            .new_workflow_template_service_client()
            .get_workflow_template(ctx, ns, name),
        ObjectKind::ClusterWorkflowTemplate => client
            .new_cluster_workflow_template_service_client()
            .get_cluster_workflow_template(ctx, name),
        ObjectKind::CronWorkflow => client
            .new_cron_workflow_service_client()
            .get_cron_workflow(ctx, ns, name),
    }
}

fn cmd_get(
    client: &ApiClient,
    ctx: &CallContext,
    kind: ObjectKind,
    names: &[String],
    output: Output,
) -> argo_core::Result<()> {
    for name in names {
        let object = get_one(client, ctx, kind, name)?;
        print_objects(std::slice::from_ref(&object), output)?;
    }
    Ok(())
}

fn cmd_list(
    client: &ApiClient,
    ctx: &CallContext,
    kind: ObjectKind,
    output: Output,
) -> argo_core::Result<()> {
    let ns = ctx.namespace();
    let objects = match kind {
        ObjectKind::Workflow => client.new_workflow_service_client().list_workflows(ctx, ns)?,
        ObjectKind::WorkflowTemplate => client
            .new_workflow_template_service_client()
            .list_workflow_templates(ctx, ns)?,
        ObjectKind::ClusterWorkflowTemplate => client
            .new_cluster_workflow_template_service_client()
            .list_cluster_workflow_templates(ctx)?,
        ObjectKind::CronWorkflow => client
            .new_cron_workflow_service_client()
            .list_cron_workflows(ctx, ns)?,
    };
    print_objects(&objects, output)
}

fn cmd_create(
    client: &ApiClient,
    ctx: &CallContext,
    kind: ObjectKind,
    files: &[PathBuf],
    output: Output,
) -> argo_core::Result<()> {
    let ns = ctx.namespace();
    for (_, manifest) in read_manifests(files)? {
        let created = match kind {
            ObjectKind::Workflow => client
                .new_workflow_service_client()
                .create_workflow(ctx, ns, manifest)?,
            ObjectKind::WorkflowTemplate => client
                .new_workflow_template_service_client()
                .create_workflow_template(ctx, ns, manifest)?,
            ObjectKind::ClusterWorkflowTemplate => client
                .new_cluster_workflow_template_service_client()
                .create_cluster_workflow_template(ctx, manifest)?,
            ObjectKind::CronWorkflow => client
                .new_cron_workflow_service_client()
                .create_cron_workflow(ctx, ns, manifest)?,
        };
        if output == Output::Name {
            println!("{} {}", "Created".green(), object_ref(&created));
        } else {
            print_objects(std::slice::from_ref(&created), output)?;
        }
    }
    Ok(())
}

/// Lint every object in `files`; with `only` set, other kinds are rejected.
fn cmd_lint(
    client: &ApiClient,
    ctx: &CallContext,
    only: Option<ObjectKind>,
    files: &[PathBuf],
) -> argo_core::Result<()> {
    let ns = ctx.namespace();
    let mut failures = 0;

    for (path, manifest) in read_manifests(files)? {
        let label = object_ref(&manifest);
        let kind = only.unwrap_or(manifest.kind);
        let result = match kind {
            ObjectKind::Workflow => client
                .new_workflow_service_client()
                .lint_workflow(ctx, ns, manifest),
            ObjectKind::WorkflowTemplate => client
                .new_workflow_template_service_client()
                .lint_workflow_template(ctx, ns, manifest),
            ObjectKind::ClusterWorkflowTemplate => client
                .new_cluster_workflow_template_service_client()
                .lint_cluster_workflow_template(ctx, manifest),
            ObjectKind::CronWorkflow => client
                .new_cron_workflow_service_client()
                .lint_cron_workflow(ctx, ns, manifest),
        };
        match result {
            Ok(_) => {}
            Err(e) if e.is_cancelled() || e.is_recoverable() => return Err(e),
            Err(e) => {
                failures += 1;
                println!("{}: {}: {}", path.display(), label, e.to_string().red());
            }
        }
    }

    if failures > 0 {
        return Err(ArgoError::lint(
            "manifests",
            format!("{} object(s) have errors", failures),
        ));
    }
    println!("{}", "no linting errors found".green());
    Ok(())
}

fn read_manifests(files: &[PathBuf]) -> argo_core::Result<Vec<(PathBuf, Manifest)>> {
    let mut manifests = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file).map_err(|source| ArgoError::ManifestRead {
            path: file.clone(),
            source,
        })?;
        manifests.extend(
            parse_manifests(Path::new(file), &content)?
                .into_iter()
                .map(|m| (file.clone(), m)),
        );
    }
    Ok(manifests)
}

fn object_ref(manifest: &Manifest) -> String {
    format!(
        "{}/{}",
        manifest.kind.as_str().to_lowercase(),
        manifest.display_name()
    )
}

fn print_objects(objects: &[Manifest], output: Output) -> argo_core::Result<()> {
    match output {
        Output::Name => {
            for object in objects {
                println!("{}", object_ref(object));
            }
        }
        Output::Json => {
            for object in objects {
                println!("{}", serde_json::to_string_pretty(object)?);
            }
        }
        Output::Yaml => {
            for object in objects {
                let yaml = serde_yaml::to_string(object)
                    .map_err(|e| ArgoError::InvalidConfig(format!("yaml output: {}", e)))?;
                println!("---\n{}", yaml.trim_end());
            }
        }
    }
    Ok(())
}
