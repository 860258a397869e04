use anyhow::Context;
use mindmatrix::cli::{init, output::Output, Cli, Commands};
use mindmatrix::{
    Agent, BaseAgent, ConfigManager, InMemoryMemoryStore, LLMClient, MindMatrix, MindMatrixConfig,
    OpenAIClient,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init { ref path, force }) => {
            if let init::InitResult::Error(e) = init::run(path, force, &output) {
                anyhow::bail!("init failed: {}", e);
            }
            Ok(())
        }
        Some(Commands::Config { validate }) => show_config(&cli, validate, &output),
        Some(Commands::Agents) => list_agents(&cli, &output),
        Some(Commands::Serve) | None => serve(&cli, &output).await,
    }
}

fn load_config(cli: &Cli, output: &Output) -> anyhow::Result<ConfigManager> {
    ConfigManager::new(&cli.config).map_err(|e| {
        output.error(&e.to_string());
        output.hint("Run `mindmatrix-server init` to create a starter configuration");
        anyhow::anyhow!(e)
    })
}

fn init_tracing(config: &MindMatrixConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.server.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

/// Wire the orchestrator from configuration: OpenAI-compatible client,
/// in-process memory and one `BaseAgent` factory per `[agents.<name>]`.
fn build_mindmatrix(config_manager: Arc<ConfigManager>) -> MindMatrix {
    let config = config_manager.config();

    let api_key = config.llm_api_key().unwrap_or_else(|e| {
        tracing::warn!("{}; requests to the model will be unauthenticated", e);
        String::new()
    });
    let llm: Arc<dyn LLMClient> = Arc::new(
        OpenAIClient::new(api_key, config.llm.api_base.clone(), config.llm.model.clone())
            .with_temperature(config.llm.temperature),
    );

    let mut builder = MindMatrix::builder().llm(llm).config(config_manager.clone());
    if config.memory.enabled {
        builder = builder.memory(Arc::new(
            InMemoryMemoryStore::new().with_exclude_topics(config.memory.exclude_topics.clone()),
        ));
    }
    let mut mindmatrix = builder.build();

    for (name, agent) in &config.agents {
        mindmatrix.register_agent_factory(
            name.clone(),
            |mm, cfg| Ok(Arc::new(BaseAgent::from_mindmatrix(mm, cfg)?) as Arc<dyn Agent>),
            Some(agent.to_factory_config(name)),
        );
    }
    mindmatrix
}

async fn serve(cli: &Cli, output: &Output) -> anyhow::Result<()> {
    let config_manager = Arc::new(load_config(cli, output)?);
    let config = config_manager.config();
    init_tracing(&config);

    output.banner();
    for warning in config
        .validate_with_warnings()
        .context("invalid configuration")?
    {
        tracing::warn!("{}", warning);
    }

    if let Err(e) = config_manager.start_watching() {
        tracing::warn!("Config hot-reload disabled: {}", e);
    }

    let mindmatrix = Arc::new(build_mindmatrix(config_manager.clone()));
    tracing::info!(
        agents = ?mindmatrix.agent_names(),
        tasks = ?mindmatrix.task_names(),
        "MindMatrix ready"
    );

    let host = cli.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    mindmatrix.start_web_server(&host, port).await?;

    config_manager.stop_watching();
    Ok(())
}

fn show_config(cli: &Cli, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config_manager = load_config(cli, output)?;
    let config = config_manager.config();

    output.header("Configuration");
    output.kv("file", &config_manager.path().display().to_string());
    output.kv("server", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("model", &format!("{} @ {}", config.llm.model, config.llm.api_base));
    output.kv("auth", if config.auth.enabled { "enabled" } else { "disabled" });
    output.kv("memory", if config.memory.enabled { "enabled" } else { "disabled" });

    if validate {
        output.header("Validation");
        let warnings = config.validate_with_warnings()?;
        for warning in &warnings {
            output.warning(&warning.message);
        }
        output.success("Configuration is valid");
    }
    Ok(())
}

fn list_agents(cli: &Cli, output: &Output) -> anyhow::Result<()> {
    let config_manager = Arc::new(load_config(cli, output)?);
    let mindmatrix = build_mindmatrix(config_manager);

    output.header("Agents");
    for name in mindmatrix.agent_names() {
        output.list_item(name);
    }
    output.header("Workflows");
    let workflows = mindmatrix.workflow_names();
    if workflows.is_empty() {
        output.info("none registered; workflows are added by applications embedding the library");
    }
    for name in workflows {
        output.list_item(name);
    }
    output.header("Tasks");
    for name in mindmatrix.task_names() {
        output.list_item(name);
    }
    Ok(())
}
