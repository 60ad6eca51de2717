//! Aggregation entry point
//!
//! `aggregate` classifies the query, fans out to every tool that applies to
//! its type, and merges whatever came back. Tools run concurrently, each in a
//! fresh working directory under the artifacts work dir. A tool that is
//! missing, crashes, hangs or floods its output contributes nothing; the
//! lookup itself only fails on invalid input.
//!
//! Partials reach the merger in plan order, never completion order, so
//! first-write-wins merging is reproducible.

use crate::artifacts::ArtifactLifecycle;
use crate::merge::{merge, MergeContext};
use crate::parsers::{holehe, ParserRegistry, SideChannel};
use crate::tools::{RunLimits, ToolId, ToolOutput, ToolResolver, ToolRunner};
use futures::future::join_all;
use osint_common::config::{AppConfig, ToolsConfig};
use osint_common::storage::SearchId;
use osint_common::{AggregatedRecord, PartialRecord, Query, QueryType, Result, StorageGateway};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tools run for each query type, in merge order
pub fn tool_plan(query_type: QueryType) -> &'static [ToolId] {
    match query_type {
        QueryType::Email => &[ToolId::Holehe, ToolId::Ghunt],
        QueryType::Phone => &[ToolId::Phoneinfoga, ToolId::Sherlock, ToolId::Maigret],
        QueryType::Username => &[ToolId::Sherlock, ToolId::Maigret],
    }
}

/// File name a tool is told to write its results to
pub fn output_file_name(tool: ToolId) -> Option<&'static str> {
    match tool {
        ToolId::Ghunt => Some("ghunt.json"),
        _ => None,
    }
}

/// Command-line arguments for `tool` on `query`
pub fn tool_arguments(tool: ToolId, query: &Query, output_file: Option<&Path>) -> Vec<String> {
    let subject = match (tool, query.query_type) {
        (ToolId::Sherlock | ToolId::Maigret, QueryType::Phone) => query.username_form(),
        _ => query.raw_value.clone(),
    };

    let mut args: Vec<String> = match tool {
        ToolId::Sherlock => vec![subject, "--print-found".into(), "--no-color".into()],
        ToolId::Maigret => vec![subject, "--no-color".into()],
        ToolId::Holehe => vec![subject, "-C".into(), "--no-color".into()],
        ToolId::Ghunt => vec!["email".into(), subject, "--json".into()],
        ToolId::Phoneinfoga => vec!["scan".into(), "-n".into(), subject],
    };
    if tool == ToolId::Ghunt {
        if let Some(path) = output_file {
            args.push(path.to_string_lossy().into_owned());
        }
    }
    args
}

/// Runs tools for a query and merges their findings
pub struct Aggregator {
    resolver: ToolResolver,
    runner: ToolRunner,
    parsers: ParserRegistry,
    artifacts: ArtifactLifecycle,
    storage: StorageGateway,
    tools: ToolsConfig,
    work_dir: PathBuf,
    artifact_ttl: Duration,
}

impl Aggregator {
    pub fn new(config: &AppConfig, storage: StorageGateway, artifacts: ArtifactLifecycle) -> Self {
        Self {
            resolver: ToolResolver::from_config(config),
            runner: ToolRunner::new(),
            parsers: ParserRegistry::new(),
            artifacts,
            storage,
            tools: config.tools.clone(),
            work_dir: config.work_dir(),
            artifact_ttl: config.artifacts.ttl(),
        }
    }

    pub fn with_resolver(mut self, resolver: ToolResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    pub fn artifacts(&self) -> &ArtifactLifecycle {
        &self.artifacts
    }

    /// Validate, classify and look up raw user input
    pub async fn aggregate(&self, raw: &str) -> Result<AggregatedRecord> {
        let query = Query::parse(raw)?;
        Ok(self.aggregate_query(&query).await)
    }

    /// Look up an already-classified query; never fails
    pub async fn aggregate_query(&self, query: &Query) -> AggregatedRecord {
        let search_id = self.storage.log_query(&query.raw_value, query.query_type).await;
        let plan = tool_plan(query.query_type);

        info!(
            query_type = %query.query_type,
            tools = plan.len(),
            search_id = ?search_id,
            "Starting aggregation"
        );

        let runs = plan.iter().map(|tool| self.run_tool(*tool, query, search_id));
        // join_all keeps plan order regardless of which tool finishes first
        let partials: Vec<PartialRecord> = join_all(runs).await.into_iter().flatten().collect();

        let record = merge(MergeContext::from(query), &partials);

        info!(
            query_type = %query.query_type,
            sources = partials.len(),
            profiles = record.social_profiles.len(),
            leaks = record.leaks.len(),
            "Aggregation complete"
        );

        self.storage
            .finalize_result(search_id, &query.raw_value, query.query_type, &record)
            .await;
        record
    }

    async fn run_tool(
        &self,
        tool: ToolId,
        query: &Query,
        search_id: Option<SearchId>,
    ) -> Option<PartialRecord> {
        let invocation = self.resolver.resolve(tool).await;
        if !invocation.available {
            debug!(tool = %tool, "Skipping unavailable tool");
            return None;
        }

        let run_dir = self.work_dir.join(Uuid::new_v4().to_string());
        if let Err(e) = tokio::fs::create_dir_all(&run_dir).await {
            warn!(
                tool = %tool,
                path = %run_dir.display(),
                error = %e,
                "Failed to create run directory"
            );
            return None;
        }

        let output_file = output_file_name(tool).map(|name| run_dir.join(name));
        let args = tool_arguments(tool, query, output_file.as_deref());
        let limits = RunLimits {
            timeout: self.tools.timeout_for(tool.name()),
            max_output_bytes: self.tools.max_output_bytes,
        };

        let output = match self.runner.run(&invocation, &args, limits, Some(&run_dir)).await {
            Ok(output) => Some(output),
            Err(failure) => {
                let partial = failure.partial_output().cloned();
                warn!(
                    tool = %tool,
                    kind = ?failure.kind(),
                    error = %failure,
                    partial = partial.is_some(),
                    "Tool run failed"
                );
                partial
            }
        };

        let side = SideChannel {
            work_dir: Some(run_dir.clone()),
            output_file: output_file.clone(),
        };
        let record = match output {
            Some(output) => self.parse(tool, output, side).await,
            None => None,
        };
        if record.is_none() {
            debug!(tool = %tool, "Tool contributed nothing");
        }

        self.retain_artifacts(tool, &run_dir, output_file, search_id)
            .await;
        record
    }

    /// Parse off the async workers; parsers read files and run regexes
    async fn parse(
        &self,
        tool: ToolId,
        output: ToolOutput,
        side: SideChannel,
    ) -> Option<PartialRecord> {
        let parsers = self.parsers.clone();
        match tokio::task::spawn_blocking(move || parsers.parse(tool, &output, &side)).await {
            Ok(record) => record,
            Err(e) => {
                warn!(tool = %tool, error = %e, "Parser task failed");
                None
            }
        }
    }

    /// Hand side-channel files to the lifecycle; drop the run dir otherwise
    async fn retain_artifacts(
        &self,
        tool: ToolId,
        run_dir: &Path,
        output_file: Option<PathBuf>,
        search_id: Option<SearchId>,
    ) {
        let mut artifacts = Vec::new();
        if tool == ToolId::Holehe {
            artifacts.extend(holehe::newest_results_csv(run_dir));
        }
        if let Some(path) = output_file {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                artifacts.push(path);
            }
        }

        if artifacts.is_empty() {
            if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
                debug!(path = %run_dir.display(), error = %e, "Failed to remove run directory");
            }
            return;
        }

        for path in artifacts {
            self.artifacts.register(&path, self.artifact_ttl).await;
            self.storage
                .record_artifact(search_id, &path, self.artifact_ttl)
                .await;
        }
    }
}
