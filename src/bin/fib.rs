//! `fib`: command line front end for the FIB API client, the agent tools and
//! the evaluation runner.

use clap::{Parser, Subcommand};
use fibagent::api::{endpoint, Record};
use fibagent::auth::{login_interactive, OAuthClient, LOGIN_TIMEOUT};
use fibagent::agent_loop::final_text;
use fibagent::eval::{
    load_questions, output_filename, AgentAnswerer, Answerer, BackendAnswerer, CheckpointSink,
    EvalRunner, QuestionFilter,
};
use fibagent::mcp::McpServer;
use fibagent::models::*;
use fibagent::provider::{BackendSettings, ModelRegistry, ModelSpec, DEFAULT_MODEL};
use fibagent::tools::{all_tools, find_tool};
use fibagent::{
    ApiError, Completeness, Endpoint, Fetched, FibAgent, FibClient, FibConfig, ToolError,
};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "fib",
    version,
    about = "FIB API client, agent tools and evaluation runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with your FIB account (opens the OAuth authorization page)
    Login,
    /// Forget the stored credential
    Logout,
    /// Show whether a credential is stored and when it expires
    Status,
    /// Fetch every record of a resource, e.g. `assignatures` or `jo/avisos`
    Fetch {
        resource: String,
        /// Keep the records fetched before a failing page
        #[arg(long)]
        best_effort: bool,
        /// Page size requested from the API
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        pretty: bool,
    },
    /// List the agent tools
    Tools,
    /// Run one agent tool with JSON arguments
    Tool {
        name: String,
        /// JSON object, e.g. '{"course_code": "IA"}'
        args: Option<String>,
    },
    /// Ask the FIB agent one question
    Ask {
        question: String,
        /// `gemini-2.5-flash`, `gemini-2.5-flash-lite`, `gemini-2.5-pro` or
        /// `local:<model>@<base_url>`
        #[arg(short, long, default_value = DEFAULT_MODEL)]
        model: ModelSpec,
    },
    /// Serve every tool over MCP on stdin/stdout
    Mcp,
    /// Answer the evaluation questions with a model and record the results
    Eval(EvalArgs),
}

#[derive(clap::Args)]
struct EvalArgs {
    /// Questions file (JSON array)
    #[arg(long, default_value = "evaluation/questions.json")]
    questions: PathBuf,
    /// Run only this question id (e.g. q_001)
    #[arg(short = 'q', long)]
    question_id: Option<String>,
    /// Filter by category (e.g. courses, exams, professors)
    #[arg(short, long)]
    category: Option<String>,
    /// Filter by complexity (simple, multi_step, contextual, ambiguous)
    #[arg(long)]
    complexity: Option<String>,
    /// Skip questions that need a logged-in user
    #[arg(long)]
    skip_auth: bool,
    /// Only the first N questions after filtering
    #[arg(short, long)]
    limit: Option<usize>,
    /// `gemini-2.5-flash`, `gemini-2.5-flash-lite`, `gemini-2.5-pro` or
    /// `local:<model>@<base_url>`
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: ModelSpec,
    /// Ask the bare model, without the agent and its tools
    #[arg(long)]
    no_tools: bool,
    /// Output file (default: results/inference_<model>_<timestamp>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Continue an existing results file, skipping completed questions
    #[arg(short, long, conflicts_with = "output")]
    resume: Option<PathBuf>,
    /// Print the report to stdout instead of writing a file
    #[arg(long, conflicts_with_all = ["output", "resume"])]
    stdout: bool,
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    if let Err(e) = run(cli.command, &cancel).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Command, cancel: &CancellationToken) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Eval(args) => return eval(args, cancel).await,
        Command::Tools => {
            // Tool metadata needs no credentials.
            let config = FibConfig::from_env().unwrap_or_else(|_| FibConfig::new("unset"));
            for tool in all_tools(&FibClient::new(&config)?) {
                println!("{:<24} {}", tool.name(), tool.description());
            }
            return Ok(());
        }
        _ => {}
    }

    let config = FibConfig::from_env()?;
    let client = FibClient::new(&config)?;

    match command {
        Command::Login => {
            let oauth = OAuthClient::new(&config)?;
            let show_url = |url: &str| {
                println!("Open this URL in your browser to log in:\n\n  {}\n", url);
            };
            let credential =
                login_interactive(&oauth, client.tokens(), LOGIN_TIMEOUT, cancel, show_url)
                    .await?;
            println!(
                "Logged in. Token valid for {} more minutes.",
                credential.seconds_until_expiry() / 60
            );
        }
        Command::Logout => {
            client.tokens().logout();
            println!("Logged out.");
        }
        Command::Status => match client.tokens().credential() {
            Some(credential) => {
                let secs = credential.seconds_until_expiry();
                if secs > 0 {
                    println!("Authenticated, token expires in {} minutes.", secs / 60);
                } else if credential.can_refresh() {
                    println!("Token expired, it will be refreshed on next use.");
                } else {
                    println!("Token expired. Run `fib login`.");
                }
            }
            None => println!("Not logged in. Run `fib login` for personal data."),
        },
        Command::Fetch {
            resource,
            best_effort,
            page_size,
            pretty,
        } => {
            let mut endpoint = endpoint::by_resource(&resource)
                .ok_or_else(|| ApiError::Config(format!("Unknown resource: {}", resource)))?;
            if let Some(size) = page_size {
                endpoint = endpoint.with_page_size(size);
            }
            let opts = FetchOptions {
                best_effort,
                pretty,
            };
            fetch_resource(&client, &endpoint, opts, cancel).await?;
        }
        Command::Tool { name, args } => {
            let tools = all_tools(&client);
            let tool =
                find_tool(&tools, &name).ok_or_else(|| ToolError::NotFound(name.clone()))?;
            let params = match args {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::json!({}),
            };
            let call_id = uuid::Uuid::new_v4().to_string();
            let result = tool.execute(&call_id, params, cancel.clone()).await?;
            println!("{}", result.text());
        }
        Command::Ask { question, model } => {
            let backend = ModelRegistry::default().build(&model, &BackendSettings::from_env())?;
            let agent = FibAgent::new(backend, &client);
            let messages = agent.run(&question, cancel).await?;
            println!("{}", final_text(&messages).unwrap_or("(no answer)"));
        }
        Command::Mcp => {
            let server = McpServer::new(all_tools(&client));
            server
                .serve(tokio::io::stdin(), tokio::io::stdout(), cancel)
                .await?;
        }
        Command::Tools | Command::Eval(_) => {}
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct FetchOptions {
    best_effort: bool,
    pretty: bool,
}

async fn fetch_resource(
    client: &FibClient,
    endpoint: &Endpoint,
    opts: FetchOptions,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn Error>> {
    match endpoint.resource {
        r if r == endpoint::COURSES.resource => {
            fetch_typed::<Course>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::EXAMS.resource => {
            fetch_typed::<Exam>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::PROFESSORS.resource => {
            fetch_typed::<Professor>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::CLASSROOMS.resource => {
            fetch_typed::<Classroom>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::ACADEMIC_TERMS.resource => {
            fetch_typed::<AcademicTerm>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::NEWS.resource => {
            fetch_typed::<NewsItem>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::MY_PROFILE.resource => {
            let profile: UserProfile = client.fetch_one(endpoint, cancel).await?;
            print_json(&profile, opts.pretty)
        }
        r if r == endpoint::MY_COURSES.resource => {
            fetch_typed::<UserCourse>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::MY_CLASSES.resource => {
            fetch_typed::<UserClass>(client, endpoint, opts, cancel).await
        }
        r if r == endpoint::MY_NOTICES.resource => {
            fetch_typed::<UserNotice>(client, endpoint, opts, cancel).await
        }
        other => Err(ApiError::Config(format!("Unknown resource: {}", other)).into()),
    }
}

async fn fetch_typed<T: Record + Serialize>(
    client: &FibClient,
    endpoint: &Endpoint,
    opts: FetchOptions,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn Error>> {
    let fetched: Fetched<T> = if opts.best_effort {
        client.fetch_all_best_effort(endpoint, &[], cancel).await
    } else {
        client.fetch_all(endpoint, &[], cancel).await?
    };

    info!(
        "{}: {} records from {} page(s), {} skipped",
        endpoint.resource,
        fetched.records.len(),
        fetched.pages,
        fetched.warnings.len()
    );
    match &fetched.completeness {
        Completeness::Complete => {}
        Completeness::PageCapReached { cap } => warn!("Stopped at the {} page limit", cap),
        Completeness::Interrupted { error } => {
            warn!("Incomplete result: {}", error.user_message())
        }
    }
    print_json(&fetched.records, opts.pretty)
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), Box<dyn Error>> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

async fn eval(args: EvalArgs, cancel: &CancellationToken) -> Result<(), Box<dyn Error>> {
    let previous = match &args.resume {
        Some(path) => match CheckpointSink::load(path)? {
            Some(report) => {
                info!(
                    "Resuming from {} ({} questions already completed)",
                    path.display(),
                    report.results.len()
                );
                if report.model != args.model {
                    warn!(
                        "Checkpoint was produced by {}, continuing with {}",
                        report.model, args.model
                    );
                }
                report.results
            }
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let filter = QuestionFilter {
        question_id: args.question_id.clone(),
        category: args.category.clone(),
        complexity: args.complexity.clone(),
        skip_auth: args.skip_auth,
        limit: args.limit,
    };
    let questions = filter.apply(load_questions(&args.questions)?);

    info!("Creating answerer with model: {}", args.model);
    let backend = ModelRegistry::default().build(&args.model, &BackendSettings::from_env())?;
    let answerer: Arc<dyn Answerer> = if args.no_tools {
        Arc::new(BackendAnswerer::new(backend, args.model.clone()))
    } else {
        let client = FibClient::new(&FibConfig::from_env()?)?;
        if !client.is_authenticated() {
            warn!("Not logged in, personal-data tools will ask for a login");
        }
        let agent = FibAgent::new(backend, &client);
        Arc::new(AgentAnswerer::new(agent, args.model.clone()))
    };
    let mut runner = EvalRunner::new(answerer);

    let output = if args.stdout {
        None
    } else {
        Some(match (args.resume, args.output) {
            (Some(path), _) | (None, Some(path)) => path,
            (None, None) => {
                let name = output_filename(&args.model, runner.run_timestamp());
                PathBuf::from("results").join(name)
            }
        })
    };
    if let Some(path) = &output {
        info!("Results will be saved to: {}", path.display());
        runner = runner.with_checkpoint(CheckpointSink::new(path).pretty(args.pretty));
    }

    let report = runner.run(&questions, previous, cancel).await?;
    info!(
        "{} completed, {} successful, {} failed",
        report.completed, report.successful, report.failed
    );
    match output {
        Some(path) => {
            // Covers the case where every question was already done.
            CheckpointSink::new(&path).pretty(args.pretty).write(&report)?;
            info!("Results written to {}", path.display());
        }
        None => print_json(&report, args.pretty)?,
    }
    Ok(())
}
