//! Command handlers

use std::sync::Arc;

use dataflag_core::{
    ClientInfo, ConsensusEngine, DataFlagConfig, DataRevision, FlagFilter, FlagStatus, FlagStore,
    FlagType, NewFlag, QueryService, SqliteStore, TimeRange, Vote,
};

use crate::input::{identity, CliError};
use crate::output::Output;
use crate::{Cli, Command, FlagCommand, RevisionCommand, TypeCommand};

type Engine = ConsensusEngine<SqliteStore>;

/// Recorded on every flag and vote this binary writes.
fn client() -> ClientInfo {
    ClientInfo::new("cdf", env!("CARGO_PKG_VERSION"))
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let config = DataFlagConfig::discover(cli.config.as_deref())?;
    let path = cli.db.unwrap_or_else(|| config.database.path.clone());
    let store = SqliteStore::open(&path, config.database.store_options())?;
    tracing::debug!(path = %path.display(), "Opened database");

    let engine = ConsensusEngine::new(Arc::new(store), config.consensus);
    let out = Output {
        json: cli.json,
        unix: cli.unix,
    };

    match cli.command {
        Command::Type(command) => run_type(&engine, command, out),
        Command::Flag(command) => run_flag(&engine, command, out),
        Command::Revision(command) => run_revision(&engine, command, out),
        Command::Vote {
            flag,
            decision,
            reviewer,
            notes,
            revision,
            no_evaluate,
        } => {
            let reviewer = identity(reviewer.as_deref(), "--reviewer")?;
            let mut vote = Vote::new(flag, reviewer, decision)
                .with_notes(notes)
                .with_client(client());
            vote.revision = revision;
            let vote = engine.record_vote(vote)?;
            let evaluation = if no_evaluate {
                None
            } else {
                Some(engine.evaluate(flag)?)
            };
            out.vote(&vote, evaluation.as_ref())
        }
        Command::Sweep => {
            let changed = engine.sweep(chrono::Utc::now())?;
            out.evaluations(&changed)
        }
        Command::Query {
            time,
            end,
            flag_type,
            scope,
        } => {
            let range = match end {
                Some(end) => TimeRange::span(time, end)?,
                None => TimeRange::instant(time)?,
            };
            let scope = scope.to_filter_scope();
            let query = QueryService::new(Arc::clone(engine.store()));
            let flags = query.flags_in_range(&range, scope.as_ref(), flag_type.as_deref())?;
            let max_severity = if flag_type.is_some() {
                flags
                    .iter()
                    .map(|flag| engine.store().flag_type(&flag.flag_type).map(|t| t.severity))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .max()
            } else {
                query.max_severity(&range, scope.as_ref())?
            };
            out.query(&flags, max_severity)
        }
    }
}

fn run_type(engine: &Engine, command: TypeCommand, out: Output) -> Result<(), CliError> {
    let store = engine.store();
    match command {
        TypeCommand::List => out.flag_types(&store.flag_types()?),
        TypeCommand::Create {
            code,
            severity,
            description,
            metadata,
        } => {
            let mut flag_type = FlagType::new(code, severity);
            flag_type.description = description;
            flag_type.metadata = metadata;
            out.flag_type(&store.register_type(flag_type)?)
        }
        TypeCommand::Show { code } => out.flag_type(&store.flag_type(&code)?),
    }
}

fn run_revision(engine: &Engine, command: RevisionCommand, out: Output) -> Result<(), CliError> {
    let store = engine.store();
    match command {
        RevisionCommand::List => out.revisions(&store.revisions()?),
        RevisionCommand::Create { name, description } => {
            let mut revision = DataRevision::new(name);
            revision.description = description;
            out.revisions(&[store.register_revision(revision)?])
        }
    }
}

fn run_flag(engine: &Engine, command: FlagCommand, out: Output) -> Result<(), CliError> {
    let store = engine.store();
    match command {
        FlagCommand::Create {
            flag_type,
            start,
            end,
            scope,
            notes,
            metadata,
            by,
            revision,
        } => {
            let mut new_flag = NewFlag::new(flag_type, start, end, identity(by.as_deref(), "--by")?)
                .with_scope(scope.to_scope())
                .with_client(client());
            new_flag.notes = notes;
            new_flag.metadata = metadata;
            new_flag.revision = revision;
            out.flag(&engine.propose(new_flag)?)
        }
        FlagCommand::List {
            flag_type,
            status,
            all,
            start,
            end,
            scope,
        } => {
            let range = match (start, end) {
                (None, None) => TimeRange::all(),
                (Some(start), None) => TimeRange::since(start)?,
                (Some(start), Some(end)) => TimeRange::span(start, end)?,
                (None, Some(end)) => TimeRange::until(end)?,
            };
            let mut filter = if all {
                FlagFilter::any_status()
            } else if status.is_empty() {
                FlagFilter::active()
            } else {
                FlagFilter::active().with_statuses(status)
            };
            if let Some(scope) = scope.to_filter_scope() {
                filter = filter.with_scope(scope);
            }
            if let Some(code) = flag_type {
                filter = filter.with_type(code);
            }
            out.flags(&store.query_overlapping(&range, &filter)?)
        }
        FlagCommand::Show { id } => out.flag(&store.get(id)?),
        FlagCommand::Edit {
            id,
            notes,
            clear_notes,
        } => {
            if notes.is_none() && !clear_notes {
                return Err(CliError::Input(
                    "give --notes TEXT or --clear-notes".into(),
                ));
            }
            out.flag(&store.update_notes(id, notes)?)
        }
        FlagCommand::History { id } => out.history(&store.status_history(id)?),
        FlagCommand::Evaluate { id } => out.evaluation(&engine.evaluate(id)?),
        FlagCommand::Votes { id } => {
            let flag = store.get(id)?;
            if flag.status != FlagStatus::Proposed {
                tracing::info!(flag = %id, status = %flag.status, "Flag is no longer under review");
            }
            out.votes(&engine.votes(id)?)
        }
    }
}
