//! The `iam-lens` command line: simulate, who-can and principal-can.

use {
    crate::{
        aggregate::PrincipalCan,
        catalog::StaticCatalog,
        condition::eval::ContextMap,
        config::{load_collect_configs, open_store},
        identity::principal_exists,
        principal::PrincipalRef,
        shrink::{ActionListShrinker, PolicyShrinker},
        sim::{SimulationOutcome, SimulationRequest, Simulator, SnapshotSimulator},
        store::{CachedStore, SnapshotStore},
        whocan::{who_can, WhoCanRequest},
        LensError,
    },
    clap::{Args, Parser, Subcommand, ValueEnum},
    serde_json::json,
    std::path::PathBuf,
};

/// Authorization queries over a collected snapshot of AWS IAM state.
#[derive(Debug, Parser)]
#[command(name = "iam-lens", version)]
pub struct Cli {
    /// iam-collect configuration files describing the snapshot.
    #[arg(
        long = "collectConfigs",
        env = "IAM_LENS_COLLECT_CONFIGS",
        global = true,
        default_value = "./iam-collect.jsonc"
    )]
    pub collect_configs: Vec<PathBuf>,

    /// The AWS partition the snapshot belongs to.
    #[arg(long, env = "IAM_LENS_PARTITION", global = true, default_value = "aws")]
    pub partition: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a principal performing an action on a resource.
    Simulate(SimulateArgs),

    /// Enumerate principals across all accounts that can act on a resource.
    WhoCan(WhoCanArgs),

    /// Emit the consolidated effective permissions of a principal.
    PrincipalCan(PrincipalCanArgs),
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// The principal ARN making the request.
    #[arg(long, env = "IAM_LENS_PRINCIPAL")]
    pub principal: String,

    /// The resource ARN being accessed.
    #[arg(long, env = "IAM_LENS_RESOURCE")]
    pub resource: String,

    /// The account owning the resource, when the ARN does not carry it.
    #[arg(long = "resourceAccount", env = "IAM_LENS_RESOURCE_ACCOUNT")]
    pub resource_account: Option<String>,

    /// The `service:Action` to simulate.
    #[arg(long, env = "IAM_LENS_ACTION")]
    pub action: String,

    /// Request context entries, `key=value` separated by commas.
    #[arg(long, env = "IAM_LENS_CONTEXT", value_delimiter = ',')]
    pub context: Vec<String>,

    #[arg(long, env = "IAM_LENS_VERBOSE")]
    pub verbose: bool,

    /// Fail unless the simulation produced this outcome.
    #[arg(long, env = "IAM_LENS_EXPECT", value_enum)]
    pub expect: Option<Expectation>,

    /// Proceed with empty identity policies when the principal is not in the
    /// snapshot.
    #[arg(long = "ignoreMissingPrincipal", env = "IAM_LENS_IGNORE_MISSING_PRINCIPAL")]
    pub ignore_missing_principal: bool,
}

#[derive(Args, Debug)]
pub struct WhoCanArgs {
    /// The resource ARN being accessed.
    #[arg(long, env = "IAM_LENS_RESOURCE")]
    pub resource: Option<String>,

    /// The account owning the resource.
    #[arg(long = "resourceAccount", env = "IAM_LENS_RESOURCE_ACCOUNT")]
    pub resource_account: Option<String>,

    /// Actions to test, comma separated.
    #[arg(long, env = "IAM_LENS_ACTIONS", value_delimiter = ',')]
    pub actions: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PrincipalCanArgs {
    /// The principal ARN to describe.
    #[arg(long, env = "IAM_LENS_PRINCIPAL")]
    pub principal: String,

    /// Collapse action lists against the action catalog.
    #[arg(long = "shrinkActionLists", env = "IAM_LENS_SHRINK_ACTION_LISTS")]
    pub shrink_action_lists: bool,
}

/// Simulation outcomes acceptable to `--expect`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Expectation {
    #[value(name = "Allowed")]
    Allowed,

    #[value(name = "ImplicitlyDenied")]
    ImplicitlyDenied,

    #[value(name = "ExplicitlyDenied")]
    ExplicitlyDenied,

    /// Either deny outcome.
    #[value(name = "AnyDeny")]
    AnyDeny,
}

impl Expectation {
    fn matches(self, outcome: SimulationOutcome) -> bool {
        match self {
            Self::Allowed => outcome == SimulationOutcome::Allowed,
            Self::ImplicitlyDenied => outcome == SimulationOutcome::ImplicitlyDenied,
            Self::ExplicitlyDenied => outcome == SimulationOutcome::ExplicitlyDenied,
            Self::AnyDeny => !outcome.is_allowed(),
        }
    }
}

/// Run a parsed command line, returning the process exit code.
pub fn run(cli: Cli) -> i32 {
    match run_command(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("iam-lens: {}", e);
            1
        }
    }
}

fn run_command(cli: Cli) -> Result<i32, LensError> {
    let configs = load_collect_configs(&cli.collect_configs)?;
    let store = CachedStore::new(open_store(&configs)?);
    let catalog = StaticCatalog;

    match cli.command {
        Command::Simulate(args) => run_simulate(&store, &cli.partition, args),
        Command::WhoCan(args) => run_who_can(&store, &catalog, args),
        Command::PrincipalCan(args) => run_principal_can(&store, &catalog, &cli.partition, args),
    }
}

fn run_simulate(store: &dyn SnapshotStore, partition: &str, args: SimulateArgs) -> Result<i32, LensError> {
    let outcome = match simulate_outcome(store, partition, &args) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("iam-lens: {}", e);
            if args.verbose {
                println!("{}", json!({ "error": e.to_string() }));
            }
            return Ok(1);
        }
    };

    if args.verbose {
        println!(
            "{}",
            json!({
                "principal": args.principal,
                "action": args.action,
                "resource": args.resource,
                "result": outcome.to_string(),
            })
        );
    } else {
        println!("{}", outcome);
    }

    match args.expect {
        Some(expectation) if !expectation.matches(outcome) => {
            eprintln!("iam-lens: expected {:?}, got {}", expectation, outcome);
            Ok(1)
        }
        _ => Ok(0),
    }
}

fn simulate_outcome(
    store: &dyn SnapshotStore,
    partition: &str,
    args: &SimulateArgs,
) -> Result<SimulationOutcome, LensError> {
    let principal = PrincipalRef::parse(&args.principal)?;
    check_partition(partition, &principal)?;

    if !principal_exists(store, &principal)? && !args.ignore_missing_principal {
        return Err(LensError::InvalidPrincipal(format!("{} is not in the snapshot", args.principal)));
    }

    let mut builder = SimulationRequest::builder();
    builder
        .principal(args.principal.clone())
        .action(args.action.clone())
        .resource(args.resource.clone())
        .context(parse_context(&args.context)?);
    if let Some(account) = &args.resource_account {
        builder.resource_account(account.clone());
    }
    let request = builder.build().map_err(|e| LensError::Store(format!("simulation request: {}", e)))?;

    SnapshotSimulator::new(store).simulate(&request)
}

fn run_who_can(store: &dyn SnapshotStore, catalog: &StaticCatalog, args: WhoCanArgs) -> Result<i32, LensError> {
    if args.resource.is_none() && (args.resource_account.is_none() || args.actions.is_empty()) {
        eprintln!("iam-lens: who-can needs --resource, or --resourceAccount with --actions");
        return Ok(1);
    }

    let request = WhoCanRequest {
        resource: args.resource,
        resource_account: args.resource_account,
        actions: args.actions,
    };
    let simulator = SnapshotSimulator::new(store);
    let results = who_can(store, catalog, &simulator, &request)?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(0)
}

fn run_principal_can(
    store: &dyn SnapshotStore,
    catalog: &StaticCatalog,
    partition: &str,
    args: PrincipalCanArgs,
) -> Result<i32, LensError> {
    let principal = PrincipalRef::parse(&args.principal)?;
    check_partition(partition, &principal)?;

    let shrinker = ActionListShrinker::new(catalog);
    let shrinker: Option<&dyn PolicyShrinker> = if args.shrink_action_lists {
        Some(&shrinker)
    } else {
        None
    };

    let document = PrincipalCan::new(store, catalog).effective_policy(&args.principal, shrinker)?;
    println!("{}", document);
    Ok(0)
}

fn check_partition(partition: &str, principal: &PrincipalRef) -> Result<(), LensError> {
    if principal.partition() != partition {
        return Err(LensError::InvalidPrincipal(format!(
            "{} is not in partition {}",
            principal.arn(),
            partition
        )));
    }
    Ok(())
}

fn parse_context(entries: &[String]) -> Result<ContextMap, LensError> {
    let mut context = ContextMap::new();
    for entry in entries {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            LensError::InvalidConfig(format!("context entry {:?} is not key=value", entry))
        })?;
        context.entry(key.to_lowercase()).or_default().push(value.to_string());
    }
    Ok(context)
}
