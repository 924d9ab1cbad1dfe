//! Human-readable and JSON rendering

use chrono::{DateTime, SecondsFormat, Utc};
use dataflag_core::{DataRevision, Evaluation, Flag, FlagType, StatusRecord, Vote};
use serde::Serialize;
use serde_json::json;

use crate::input::CliError;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    /// Show times as unix seconds instead of UTC
    pub unix: bool,
}

impl Output {
    fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), CliError> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn time(&self, t: f64) -> String {
        if self.unix {
            return format!("{t}");
        }
        DateTime::<Utc>::from_timestamp_micros((t * 1e6).round() as i64)
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| format!("{t}"))
    }

    fn end(&self, end: Option<f64>) -> String {
        end.map_or_else(|| "ongoing".to_string(), |t| self.time(t))
    }

    pub fn flag_types(&self, types: &[FlagType]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(types);
        }
        println!("{:<20} {:>8}  DESCRIPTION", "TYPE", "SEVERITY");
        for flag_type in types {
            println!(
                "{:<20} {:>8}  {}",
                flag_type.code,
                flag_type.severity,
                flag_type.description.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    pub fn flag_type(&self, flag_type: &FlagType) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(flag_type);
        }
        println!("type: {}", flag_type.code);
        println!("severity: {}", flag_type.severity);
        println!(
            "description: {}",
            flag_type.description.as_deref().unwrap_or("")
        );
        print_metadata(flag_type.metadata.as_ref())?;
        Ok(())
    }

    pub fn flags(&self, flags: &[Flag]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(flags);
        }
        println!(
            "{:>6}  {:<16} {:<10} {:<20} {:<20} {:<16} CREATED BY",
            "ID", "TYPE", "STATUS", "START", "END", "SCOPE"
        );
        for flag in flags {
            println!(
                "{:>6}  {:<16} {:<10} {:<20} {:<20} {:<16} {}",
                flag.id.0,
                flag.flag_type,
                flag.status.as_str(),
                self.time(flag.start()),
                self.end(flag.end()),
                flag.scope.to_string(),
                flag.created_by
            );
        }
        Ok(())
    }

    pub fn flag(&self, flag: &Flag) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(flag);
        }
        println!("id: {}", flag.id);
        println!("type: {}", flag.flag_type);
        println!("status: {}", flag.status);
        println!("start: {}", self.time(flag.start()));
        println!("finish: {}", self.end(flag.end()));
        println!("scope: {}", flag.scope);
        if let Some(id) = flag.superseded_by {
            println!("superseded by: {id}");
        }
        println!(
            "created: {} by {}",
            flag.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            flag.created_by
        );
        println!("version: {}", flag.version);
        if let Some(revision) = &flag.revision {
            println!("revision: {revision}");
        }
        if let Some(client) = &flag.client {
            println!("client: {client}");
        }
        if let Some(notes) = &flag.notes {
            println!("notes: {notes}");
        }
        print_metadata(flag.metadata.as_ref())?;
        Ok(())
    }

    pub fn revisions(&self, revisions: &[DataRevision]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(revisions);
        }
        println!("{:<20} DESCRIPTION", "REVISION");
        for revision in revisions {
            println!(
                "{:<20} {}",
                revision.name,
                revision.description.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    pub fn votes(&self, votes: &[Vote]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(votes);
        }
        println!(
            "{:<20} {:<8} {:<20} {:<12} NOTES",
            "REVIEWER", "DECISION", "CAST AT", "REVISION"
        );
        for vote in votes {
            println!(
                "{:<20} {:<8} {:<20} {:<12} {}",
                vote.reviewer_id,
                vote.decision.as_str(),
                vote.cast_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                vote.revision.as_deref().unwrap_or("-"),
                vote.notes.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    pub fn history(&self, records: &[StatusRecord]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(records);
        }
        for record in records {
            println!(
                "{}  {} -> {}  (version {})",
                record.changed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                record.from,
                record.to,
                record.version
            );
        }
        Ok(())
    }

    pub fn evaluation(&self, evaluation: &Evaluation) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(evaluation);
        }
        self.print_evaluation(evaluation);
        Ok(())
    }

    pub fn evaluations(&self, evaluations: &[Evaluation]) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(evaluations);
        }
        if evaluations.is_empty() {
            println!("No flags changed.");
        }
        for evaluation in evaluations {
            self.print_evaluation(evaluation);
        }
        Ok(())
    }

    fn print_evaluation(&self, evaluation: &Evaluation) {
        let change = if evaluation.changed { "now" } else { "still" };
        println!(
            "flag {}: {}, {change} {}",
            evaluation.flag.id, evaluation.verdict, evaluation.flag.status
        );
        for id in &evaluation.superseded {
            println!("  superseded flag {id}");
        }
    }

    pub fn vote(&self, vote: &Vote, evaluation: Option<&Evaluation>) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(&json!({ "vote": vote, "evaluation": evaluation }));
        }
        println!(
            "{} voted {} on flag {}",
            vote.reviewer_id, vote.decision, vote.flag_id
        );
        if let Some(evaluation) = evaluation {
            self.print_evaluation(evaluation);
        }
        Ok(())
    }

    pub fn query(&self, flags: &[Flag], max_severity: Option<u32>) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(&json!({ "flags": flags, "max_severity": max_severity }));
        }
        match max_severity {
            Some(severity) => println!("Flagged (max severity {severity})"),
            None => println!("Not flagged"),
        }
        if !flags.is_empty() {
            self.flags(flags)?;
        }
        Ok(())
    }
}

fn print_metadata(metadata: Option<&serde_json::Value>) -> Result<(), CliError> {
    if let Some(metadata) = metadata {
        println!("metadata:");
        for line in serde_json::to_string_pretty(metadata)?.lines() {
            println!("    {line}");
        }
    }
    Ok(())
}
