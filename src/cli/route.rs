//! CLI route: single route table and run context.

use crate::cli::output::{format_config, format_results};
use crate::cli::parse::{Commands, ConfigCommands, RequestArgs};
use crate::config::{ConfigLoader, QuerybindConfig};
use crate::descriptor::{DescriptorBuilder, QueryRequest};
use crate::engine::QueryClient;
use crate::error::BindError;
use crate::host::{Element, LocalValue};
use crate::options::QueryOptionsPatch;
use crate::plugin::{install, HostApi};
use crate::result::QueryResult;
use crate::transport::{FetchOptions, HttpTransport, ResponseFormat, Transport};
use futures::channel::mpsc;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What a command printed and whether it succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: QuerybindConfig,
}

impl RunContext {
    /// Load configuration from `config_path`, or layered from `workspace_root`.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, BindError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            workspace_root,
            config: config.validated()?,
        })
    }

    pub fn with_config(workspace_root: PathBuf, config: QuerybindConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &QuerybindConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, BindError> {
        match command {
            Commands::Get { url, request } => {
                let builder = DescriptorBuilder::get(url.as_str());
                self.run_binding(builder, request)
            }
            Commands::Post { url, body, request } => {
                let body = body
                    .as_deref()
                    .map(serde_json::from_str::<serde_json::Value>)
                    .transpose()
                    .map_err(|e| {
                        BindError::InvalidDescriptor(format!("--body is not valid JSON: {}", e))
                    })?;
                let builder = DescriptorBuilder::post(url.as_str(), body);
                self.run_binding(builder, request)
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show { format } => {
                    format_config(&self.config, format).map(CommandOutput::ok)
                }
                ConfigCommands::Path => {
                    let global = ConfigLoader::global_config_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(no home directory)".to_string());
                    let workspace = self.workspace_root.join("config").join("config.toml");
                    Ok(CommandOutput::ok(format!(
                        "global:    {}\nworkspace: {}",
                        global,
                        workspace.display()
                    )))
                }
            },
        }
    }

    /// Mount a binding on an in-memory element and collect results until fetching stops.
    fn run_binding(
        &self,
        builder: DescriptorBuilder,
        args: &RequestArgs,
    ) -> Result<CommandOutput, BindError> {
        let builder = builder
            .fetch_options(fetch_options(args)?)
            .query_options(query_options(args));
        let request = QueryRequest::from(builder);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| BindError::EngineUnavailable(format!("Failed to start runtime: {}", e)))?;

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&self.config.transport)?);
        let client = QueryClient::with_tokio(self.config.client.defaults(), runtime.handle().clone());

        let root = Element::root("querybind");
        root.provide_engine(Arc::new(client));

        let (tx, mut rx) = mpsc::unbounded::<QueryResult>();
        let property = self.config.binding.default_property.clone();
        let watcher = root.state().on_change(move |name, value| {
            match value {
                LocalValue::Query(result) if name == property => {
                    let _ = tx.unbounded_send(result.clone());
                }
                _ => {}
            }
        });

        let plugin = install(HostApi::from_config(transport, &self.config.binding));
        let bound = plugin
            .directive(move |_| Ok(request.clone()))
            .bind(&root)?;
        if let Some(err) = root.errors().take().into_iter().next() {
            root.destroy();
            return Err(err);
        }
        debug!(state = ?bound.session_state(), "Binding mounted for CLI request");

        let results = runtime.block_on(async {
            let mut results = Vec::new();
            while let Some(result) = rx.next().await {
                // A disabled query reports pending without fetching; nothing else will arrive.
                let idle = !result.is_fetching;
                results.push(result);
                if idle {
                    break;
                }
            }
            results
        });

        bound.remove();
        watcher.dispose();
        root.destroy();
        runtime.shutdown_timeout(Duration::from_millis(100));

        let success = results.last().map(|r| r.is_success()).unwrap_or(false);
        info!(results = results.len(), success, "Binding settled");
        Ok(CommandOutput {
            text: format_results(&results, &args.format)?,
            success,
        })
    }
}

fn fetch_options(args: &RequestArgs) -> Result<FetchOptions, BindError> {
    let mut options = FetchOptions::new();
    for header in &args.headers {
        let (name, value) = header.split_once(':').ok_or_else(|| {
            BindError::InvalidDescriptor(format!("header '{}' must be NAME:VALUE", header))
        })?;
        options = options.header(name.trim(), value.trim());
    }
    for param in &args.query {
        let (name, value) = param.split_once('=').ok_or_else(|| {
            BindError::InvalidDescriptor(format!("query parameter '{}' must be NAME=VALUE", param))
        })?;
        options = options.query_param(name, value);
    }
    if args.text {
        options = options.format(ResponseFormat::Text);
    }
    Ok(options)
}

fn query_options(args: &RequestArgs) -> QueryOptionsPatch {
    match args.stale_ms {
        Some(ms) => QueryOptionsPatch::new().stale_time(Duration::from_millis(ms)),
        None => QueryOptionsPatch::new(),
    }
}
